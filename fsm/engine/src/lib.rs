#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # FSM Engine
//!
//! Nested hierarchical state machine engine. A machine holds one active
//! simple (leaf) state on top of a stack of compound states, one per nesting
//! level, outermost at level 0.
//!
//! - [`Fsm::handle_event`] dispatches an event to the leaf and bubbles it
//!   outwards through the compound states until one of them handles it.
//! - A handler requests a transition by staging states through its
//!   allocator facade; the engine then leaves and destroys everything from
//!   the leaf down to the handling level and enters the staged states.
//! - [`Fsm::feed`] runs one cooperative callback step on the leaf.
//!
//! States live on the heap ([`DynamicFsm`]) or inside a caller-owned
//! [`StateBuffer`] without any heap allocation ([`BufferedFsm`]).

use core::marker::PhantomData;

use fsm_core::{
    CallbackResult, FeedResult, FsmError, HandleEventResult, HandleEventReturn, SimpleState,
    StateAllocator,
};
use fsm_mem::{AllocatorStats, ArenaStore, DynamicStore, NestingStack, StateBuffer, StateStore};
use log::{debug, trace, warn};

pub mod config;
pub mod stats;
mod transition;

pub use config::{FsmConfig, FsmConfigBuilder};
pub use stats::FsmStats;

pub use fsm_core;
pub use fsm_mem;

#[cfg(test)]
mod tests;

/// Machine whose states are boxed on the heap
pub type DynamicFsm<E, R> = Fsm<E, R, DynamicStore<E, R>>;

/// Machine whose states live in a borrowed [`StateBuffer`]
pub type BufferedFsm<'b, E, R, const L: usize, const S: usize, const C: usize> =
    Fsm<E, R, ArenaStore<'b, E, R, L, S, C>>;

/// Nested hierarchical state machine
pub struct Fsm<E, R, S: StateStore<E, R>> {
    config: FsmConfig,
    store: S,
    current_state: Option<S::Simple>,
    compound_stack: S::Stack,
    last_error: Option<FsmError>,
    stats: FsmStats,
    _types: PhantomData<fn(E) -> R>,
}

impl<E, R> Fsm<E, R, DynamicStore<E, R>> {
    /// Create an empty heap-backed machine
    pub fn new() -> Self {
        Self::with_store(DynamicStore::new())
    }
}

impl<E, R> Default for Fsm<E, R, DynamicStore<E, R>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'b, E, R, const L: usize, const S: usize, const C: usize>
    Fsm<E, R, ArenaStore<'b, E, R, L, S, C>>
{
    /// Create an empty machine constructing its states inside `buffer`
    pub fn with_buffer(buffer: &'b mut StateBuffer<L, S, C>) -> Self {
        Self::with_store(ArenaStore::new(buffer))
    }
}

impl<E, R, S: StateStore<E, R>> Fsm<E, R, S> {
    /// Create an empty machine on top of `store`
    pub fn with_store(store: S) -> Self {
        let compound_stack = store.new_stack();
        Self {
            config: FsmConfig::default(),
            store,
            current_state: None,
            compound_stack,
            last_error: None,
            stats: FsmStats::new(),
            _types: PhantomData,
        }
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: FsmConfig) -> Self {
        self.config = config;
        self
    }

    /// Tear down all live states and install `state` as the only leaf
    ///
    /// Every live state is left before it is destroyed, innermost first.
    pub fn reset<T>(&mut self, state: T) -> Result<(), FsmError>
    where
        T: SimpleState<E, R, S::Allocator> + 'static,
    {
        self.store.release_staged_states();
        self.unwind(0);

        self.store.make_ready_for_nesting_level(0);
        let staged = self.store.allocator().create_simple(state);
        if let HandleEventReturn::AllocationError(err) = staged {
            self.store.finish_pass();
            return Err(self.record_error(err.into()));
        }

        let next_state = self.store.pull_simple_state();
        self.store.finish_pass();

        let Some(mut next_state) = next_state else {
            return Err(self.record_error(FsmError::MissingSimpleState));
        };
        next_state.enter();
        self.current_state = Some(next_state);
        debug!("[{}] reset to initial state", self.config.name);
        Ok(())
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    /// Number of live compound states
    pub fn current_nesting_level(&self) -> usize {
        self.compound_stack.len()
    }

    /// Whether a leaf state is installed
    pub fn is_initialized(&self) -> bool {
        self.current_state.is_some()
    }

    /// Compound capacity of the underlying store, `None` if unbounded
    pub fn max_nesting_level(&self) -> Option<usize> {
        self.store.max_nesting_level()
    }

    /// Cause of the most recent internal error
    pub fn last_error(&self) -> Option<FsmError> {
        self.last_error
    }

    pub fn stats(&self) -> FsmStats {
        self.stats
    }

    pub fn allocator_stats(&self) -> AllocatorStats {
        self.store.stats()
    }

    fn record_error(&mut self, err: FsmError) -> FsmError {
        warn!("[{}] {}", self.config.name, err);
        self.last_error = Some(err);
        self.stats.on_internal_error();
        err
    }

    fn internal_error(&mut self, err: FsmError) -> HandleEventResult {
        self.record_error(err);
        HandleEventResult::InternalError
    }
}

impl<E: Copy, R, S: StateStore<E, R>> Fsm<E, R, S> {
    /// Dispatch `event` through the nesting stack
    ///
    /// The leaf sees the event first; while the result is
    /// [`HandleEventReturn::PassOn`] the next outer compound state gets it.
    /// A transition replaces everything from the leaf down to, and
    /// including, the compound state at the handling level.
    pub fn handle_event(&mut self, event: E) -> HandleEventResult {
        let Some(current_state) = self.current_state.as_mut() else {
            return self.internal_error(FsmError::NotInitialized);
        };
        self.stats.on_event();

        let mut next_nesting_level_to_handle = self.compound_stack.len();
        self.store
            .make_ready_for_nesting_level(next_nesting_level_to_handle);

        let mut result = current_state.handle_event(self.store.allocator(), event);

        while result.is_pass_on() && next_nesting_level_to_handle != 0 {
            next_nesting_level_to_handle -= 1;
            trace!(
                "[{}] event passed on to level {}",
                self.config.name,
                next_nesting_level_to_handle
            );
            self.store
                .make_ready_for_nesting_level(next_nesting_level_to_handle);
            result = match self.compound_stack.get_mut(next_nesting_level_to_handle) {
                Some(compound_state) => compound_state.handle_event(self.store.allocator(), event),
                None => break,
            };
        }

        match result {
            HandleEventReturn::PassOn => {
                self.store.finish_pass();
                self.stats.on_unhandled();
                if self.config.log_unhandled {
                    debug!("[{}] event not handled by any level", self.config.name);
                }
                HandleEventResult::Unhandled
            }
            HandleEventReturn::HandledInternally => {
                self.store.finish_pass();
                trace!(
                    "[{}] event handled internally at level {}",
                    self.config.name,
                    next_nesting_level_to_handle
                );
                HandleEventResult::Success
            }
            HandleEventReturn::AllocationError(err) => {
                self.store.finish_pass();
                self.internal_error(err.into())
            }
            HandleEventReturn::NewState => self.transition(next_nesting_level_to_handle),
        }
    }

    /// Run one callback step on the leaf
    ///
    /// A synthesized event is dispatched once through
    /// [`handle_event`](Self::handle_event); this never blocks.
    pub fn feed(&mut self) -> FeedResult<R> {
        let Some(current_state) = self.current_state.as_mut() else {
            self.record_error(FsmError::NotInitialized);
            return FeedResult::InternalError;
        };

        match current_state.callback() {
            CallbackResult::Event(event) => {
                trace!("[{}] callback synthesized an event", self.config.name);
                self.handle_event(event).into()
            }
            CallbackResult::Value(value) => FeedResult::HasValue(value),
            CallbackResult::Pending => FeedResult::NoValue,
        }
    }
}

impl<E, R, S: StateStore<E, R>> Drop for Fsm<E, R, S> {
    fn drop(&mut self) {
        self.store.release_staged_states();
        self.unwind(0);
    }
}

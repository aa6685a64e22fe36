#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)] // The arena constructs and destroys states in caller-provided buffers
#![deny(unsafe_op_in_unsafe_fn)]

//! # FSM Memory Management
//!
//! State allocators for the nested state machine engine. Two flavors share
//! one engine-facing contract, [`StateStore`]:
//!
//! - [`DynamicStore`] boxes every state on the heap and supports unbounded
//!   nesting.
//! - [`ArenaStore`] constructs states inside a caller-owned [`StateBuffer`]
//!   with compile-time capacities. It performs no heap allocation and keeps
//!   two buffers per slot so a replacement never overlaps the state it
//!   replaces.
//!
//! Handlers never see the store itself, only its allocator facade, so they
//! can stage states but cannot pull or free them.

extern crate alloc;

use core::ops::DerefMut;

use fsm_core::{CompoundState, SimpleState, StateAllocator};

pub mod arena;
pub mod dynamic;

pub use arena::{
    ArenaBox, ArenaCompoundState, ArenaSimpleState, ArenaStateAllocator, ArenaStore, StateBuffer,
    SLOT_ALIGN,
};
pub use dynamic::{DynamicCompoundState, DynamicSimpleState, DynamicStateAllocator, DynamicStore};

#[cfg(test)]
mod tests;

/// Engine-side view of a state allocator
///
/// The engine readies the store for the nesting level it is about to
/// dispatch to, hands [`allocator`](Self::allocator) to the handler, and
/// afterwards either pulls the staged states or releases them.
pub trait StateStore<E, R> {
    /// Facade handed to state handlers
    type Allocator: StateAllocator<E, R>;
    /// Owning handle of a live simple state
    type Simple: DerefMut<Target = dyn SimpleState<E, R, Self::Allocator>>;
    /// Owning handle of a live compound state
    type Compound: DerefMut<Target = dyn CompoundState<E, R, Self::Allocator>>;
    /// Stack of live compound states, outermost first
    type Stack: NestingStack<Self::Compound>;

    /// Facade for the handler of the current pass
    fn allocator(&mut self) -> &mut Self::Allocator;

    /// Empty compound stack suited to this store
    fn new_stack(&self) -> Self::Stack;

    /// Reset per-pass bookkeeping before dispatching to `level`
    ///
    /// Anything staged by a handler that has since passed the event on is
    /// released here.
    fn make_ready_for_nesting_level(&mut self, level: usize);

    /// Close the current pass, releasing whatever is still staged
    fn finish_pass(&mut self);

    fn has_staged_states(&self) -> bool;

    fn has_staged_simple_state(&self) -> bool;

    /// Take ownership of the staged simple state, if any
    fn pull_simple_state(&mut self) -> Option<Self::Simple>;

    /// Take ownership of the staged compound state, if any
    fn pull_compound_state(&mut self) -> Option<Self::Compound>;

    /// Destroy staged states that were not pulled
    fn release_staged_states(&mut self);

    /// Number of compound levels the store can hold, `None` if unbounded
    fn max_nesting_level(&self) -> Option<usize>;

    fn stats(&self) -> AllocatorStats;
}

/// Stack of live compound states
pub trait NestingStack<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a state, handing it back if the stack is full
    fn push(&mut self, item: T) -> Result<(), T>;

    fn pop(&mut self) -> Option<T>;

    fn get_mut(&mut self, level: usize) -> Option<&mut T>;

    fn last_mut(&mut self) -> Option<&mut T>;
}

impl<T> NestingStack<T> for alloc::vec::Vec<T> {
    fn len(&self) -> usize {
        alloc::vec::Vec::len(self)
    }

    fn push(&mut self, item: T) -> Result<(), T> {
        alloc::vec::Vec::push(self, item);
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        alloc::vec::Vec::pop(self)
    }

    fn get_mut(&mut self, level: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(level)
    }

    fn last_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }
}

impl<T, const N: usize> NestingStack<T> for heapless::Vec<T, N> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn push(&mut self, item: T) -> Result<(), T> {
        heapless::Vec::push(self, item)
    }

    fn pop(&mut self) -> Option<T> {
        heapless::Vec::pop(self)
    }

    fn get_mut(&mut self, level: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(level)
    }

    fn last_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }
}

/// Allocator statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// States constructed and staged
    pub created: usize,
    /// Staged states taken over by the engine
    pub pulled: usize,
    /// Staged states destroyed without being pulled
    pub released: usize,
    /// Creation attempts that failed
    pub allocation_errors: usize,
}

impl AllocatorStats {
    pub const fn new() -> Self {
        Self {
            created: 0,
            pulled: 0,
            released: 0,
            allocation_errors: 0,
        }
    }

    pub fn on_create(&mut self) {
        self.created += 1;
    }

    pub fn on_pull(&mut self) {
        self.pulled += 1;
    }

    pub fn on_release(&mut self) {
        self.released += 1;
    }

    pub fn on_error(&mut self) {
        self.allocation_errors += 1;
    }

    /// States currently staged
    pub const fn staged(&self) -> usize {
        self.created - self.pulled - self.released
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AllocatorStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "AllocatorStats{{ created: {}, pulled: {}, released: {}, errors: {} }}",
            self.created,
            self.pulled,
            self.released,
            self.allocation_errors
        );
    }
}

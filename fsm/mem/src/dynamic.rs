//! Heap-backed state allocation

use alloc::boxed::Box;
use alloc::vec::Vec;

use fsm_core::{
    AllocError, CompoundState, HandleEventReturn, SimpleState, StateAllocator, StateKind,
};
use log::{trace, warn};

use crate::{AllocatorStats, StateStore};

/// Simple state as stored by the dynamic allocator
pub type DynamicSimpleState<E, R> = dyn SimpleState<E, R, DynamicStateAllocator<E, R>>;
/// Compound state as stored by the dynamic allocator
pub type DynamicCompoundState<E, R> = dyn CompoundState<E, R, DynamicStateAllocator<E, R>>;

/// Allocator facade that boxes staged states on the heap
pub struct DynamicStateAllocator<E, R> {
    simple: Option<Box<DynamicSimpleState<E, R>>>,
    compound: Option<Box<DynamicCompoundState<E, R>>>,
    ready: bool,
    level: usize,
    stats: AllocatorStats,
}

impl<E, R> DynamicStateAllocator<E, R> {
    fn new() -> Self {
        Self {
            simple: None,
            compound: None,
            ready: false,
            level: 0,
            stats: AllocatorStats::new(),
        }
    }

    /// Nesting level the current pass stages for
    pub fn nesting_level(&self) -> usize {
        self.level
    }

    fn reject(&mut self, err: AllocError) -> HandleEventReturn {
        warn!("dynamic allocator rejected state at level {}: {}", self.level, err);
        self.stats.on_error();
        HandleEventReturn::AllocationError(err)
    }

    fn release(&mut self) {
        if self.simple.take().is_some() {
            self.stats.on_release();
        }
        if self.compound.take().is_some() {
            self.stats.on_release();
        }
    }
}

impl<E, R> StateAllocator<E, R> for DynamicStateAllocator<E, R> {
    fn create_simple<S>(&mut self, state: S) -> HandleEventReturn
    where
        S: SimpleState<E, R, Self> + 'static,
    {
        if !self.ready {
            return self.reject(AllocError::NotReady);
        }
        if self.simple.is_some() {
            return self.reject(AllocError::AlreadyStaged(StateKind::Simple));
        }

        self.simple = Some(Box::new(state));
        self.stats.on_create();
        trace!("staged simple state ({} bytes) on the heap", core::mem::size_of::<S>());
        HandleEventReturn::NewState
    }

    fn create_compound<S>(&mut self, state: S) -> HandleEventReturn
    where
        S: CompoundState<E, R, Self> + 'static,
    {
        if !self.ready {
            return self.reject(AllocError::NotReady);
        }
        if self.compound.is_some() {
            return self.reject(AllocError::AlreadyStaged(StateKind::Compound));
        }

        self.compound = Some(Box::new(state));
        self.stats.on_create();
        trace!(
            "staged compound state ({} bytes) for level {} on the heap",
            core::mem::size_of::<S>(),
            self.level
        );
        HandleEventReturn::NewState
    }
}

/// Heap-backed [`StateStore`] with unbounded nesting
pub struct DynamicStore<E, R> {
    allocator: DynamicStateAllocator<E, R>,
}

impl<E, R> DynamicStore<E, R> {
    pub fn new() -> Self {
        Self {
            allocator: DynamicStateAllocator::new(),
        }
    }
}

impl<E, R> Default for DynamicStore<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> StateStore<E, R> for DynamicStore<E, R> {
    type Allocator = DynamicStateAllocator<E, R>;
    type Simple = Box<DynamicSimpleState<E, R>>;
    type Compound = Box<DynamicCompoundState<E, R>>;
    type Stack = Vec<Box<DynamicCompoundState<E, R>>>;

    fn allocator(&mut self) -> &mut Self::Allocator {
        &mut self.allocator
    }

    fn new_stack(&self) -> Self::Stack {
        Vec::new()
    }

    fn make_ready_for_nesting_level(&mut self, level: usize) {
        self.allocator.release();
        self.allocator.ready = true;
        self.allocator.level = level;
    }

    fn finish_pass(&mut self) {
        self.allocator.release();
        self.allocator.ready = false;
    }

    fn has_staged_states(&self) -> bool {
        self.allocator.simple.is_some() || self.allocator.compound.is_some()
    }

    fn has_staged_simple_state(&self) -> bool {
        self.allocator.simple.is_some()
    }

    fn pull_simple_state(&mut self) -> Option<Self::Simple> {
        let state = self.allocator.simple.take()?;
        self.allocator.stats.on_pull();
        Some(state)
    }

    fn pull_compound_state(&mut self) -> Option<Self::Compound> {
        let state = self.allocator.compound.take()?;
        self.allocator.stats.on_pull();
        Some(state)
    }

    fn release_staged_states(&mut self) {
        self.allocator.release();
    }

    fn max_nesting_level(&self) -> Option<usize> {
        None
    }

    fn stats(&self) -> AllocatorStats {
        self.allocator.stats
    }
}

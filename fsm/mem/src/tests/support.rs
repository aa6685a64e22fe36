//! States that count their drops, shared by the allocator tests

use std::cell::Cell;
use std::rc::Rc;

use fsm_core::{CompoundState, HandleEventReturn, SimpleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Poke,
}

#[derive(Clone, Default)]
pub struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    pub fn count(&self) -> usize {
        self.0.get()
    }
}

pub struct Leaf {
    pub drops: DropCounter,
}

impl Drop for Leaf {
    fn drop(&mut self) {
        self.drops.0.set(self.drops.0.get() + 1);
    }
}

impl<A> SimpleState<Event, u32, A> for Leaf {
    fn handle_event(&mut self, _sa: &mut A, _ev: Event) -> HandleEventReturn {
        HandleEventReturn::PassOn
    }
}

pub struct Container {
    pub drops: DropCounter,
}

impl Drop for Container {
    fn drop(&mut self) {
        self.drops.0.set(self.drops.0.get() + 1);
    }
}

impl<A> CompoundState<Event, u32, A> for Container {
    fn handle_event(&mut self, _sa: &mut A, _ev: Event) -> HandleEventReturn {
        HandleEventReturn::PassOn
    }
}

//! Probed states shared by the engine tests
//!
//! Every state records its lifecycle into a [`Probe`] so the tests can check
//! enter/leave pairing, dispatch order and leaks.

use std::cell::RefCell;
use std::rc::Rc;

use fsm_core::{CallbackResult, CompoundState, HandleEventReturn, SimpleState, StateAllocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ev {
    Start,
    Stop,
    Tick,
    Poke,
    Nest,
    Swap,
    Double,
    Orphan,
    Reenter,
    Collapse,
}

#[derive(Debug, Default)]
pub struct ProbeLog {
    pub journal: Vec<String>,
    pub addresses: Vec<usize>,
    pub created: usize,
    pub dropped: usize,
    pub enters: usize,
    pub leaves: usize,
    pub missed_leaves: usize,
    pub double_leaves: usize,
}

#[derive(Clone, Default)]
pub struct Probe(Rc<RefCell<ProbeLog>>);

impl Probe {
    pub fn log(&self) -> std::cell::Ref<'_, ProbeLog> {
        self.0.borrow()
    }

    pub fn journal(&self) -> Vec<String> {
        self.0.borrow().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.0.borrow_mut().journal.clear();
    }

    pub fn live(&self) -> usize {
        let log = self.0.borrow();
        log.created - log.dropped
    }

    fn note(&self, entry: String) {
        self.0.borrow_mut().journal.push(entry);
    }
}

/// Lifecycle bookkeeping embedded in every probed state
pub struct Life {
    probe: Probe,
    entered: bool,
    left: bool,
}

impl Life {
    fn new(probe: &Probe) -> Self {
        probe.0.borrow_mut().created += 1;
        Self {
            probe: probe.clone(),
            entered: false,
            left: false,
        }
    }

    fn enter(&mut self, label: String) {
        self.entered = true;
        self.probe.0.borrow_mut().enters += 1;
        self.probe.note(format!("enter {label}"));
    }

    fn leave(&mut self, label: String) {
        let mut log = self.probe.0.borrow_mut();
        if self.left {
            log.double_leaves += 1;
        }
        self.left = true;
        log.leaves += 1;
        log.journal.push(format!("leave {label}"));
    }

    fn handle(&self, label: String) {
        self.probe.note(format!("handle {label}"));
    }
}

impl Drop for Life {
    fn drop(&mut self) {
        let mut log = self.probe.0.borrow_mut();
        log.dropped += 1;
        if self.entered && !self.left {
            log.missed_leaves += 1;
        }
    }
}

/// Leaf that starts charging, opens nested sessions and misbehaves on demand
pub struct Idle {
    life: Life,
    depth: usize,
}

impl Idle {
    pub fn new(probe: &Probe, depth: usize) -> Self {
        Self {
            life: Life::new(probe),
            depth,
        }
    }

    fn label(&self) -> String {
        format!("idle@{}", self.depth)
    }
}

impl<A: StateAllocator<Ev, u32>> SimpleState<Ev, u32, A> for Idle {
    fn enter(&mut self) {
        let label = self.label();
        self.life.enter(label);
    }

    fn handle_event(&mut self, sa: &mut A, ev: Ev) -> HandleEventReturn {
        self.life.handle(self.label());
        let probe = &self.life.probe;
        match ev {
            Ev::Start => sa.create_simple(Charging::new(probe, self.depth)),
            Ev::Nest => {
                let staged = sa.create_compound(Session::new(probe, self.depth));
                if staged.is_allocation_error() {
                    return staged;
                }
                sa.create_simple(Idle::new(probe, self.depth + 1))
            }
            Ev::Double => {
                let _ = sa.create_simple(Charging::new(probe, self.depth));
                sa.create_simple(Charging::new(probe, self.depth))
            }
            Ev::Orphan => sa.create_compound(Session::new(probe, self.depth)),
            Ev::Reenter => sa.create_simple(Idle::new(probe, self.depth)),
            _ => A::PASS_ON,
        }
    }

    fn leave(&mut self) {
        let label = self.label();
        self.life.leave(label);
    }
}

/// Leaf reporting a fixed value through `feed`
pub struct Charging {
    life: Life,
    depth: usize,
}

impl Charging {
    pub const VALUE: u32 = 42;

    pub fn new(probe: &Probe, depth: usize) -> Self {
        Self {
            life: Life::new(probe),
            depth,
        }
    }

    fn label(&self) -> String {
        format!("charging@{}", self.depth)
    }
}

impl<A: StateAllocator<Ev, u32>> SimpleState<Ev, u32, A> for Charging {
    fn enter(&mut self) {
        let label = self.label();
        self.life.enter(label);
    }

    fn handle_event(&mut self, sa: &mut A, ev: Ev) -> HandleEventReturn {
        self.life.handle(self.label());
        match ev {
            Ev::Stop => sa.create_simple(Idle::new(&self.life.probe, self.depth)),
            _ => A::PASS_ON,
        }
    }

    fn callback(&mut self) -> CallbackResult<Ev, u32> {
        CallbackResult::Value(Self::VALUE)
    }

    fn leave(&mut self) {
        let label = self.label();
        self.life.leave(label);
    }
}

/// Leaf counting down through `feed` before emitting `then`
pub struct Countdown {
    life: Life,
    remaining: u32,
    then: Ev,
}

impl Countdown {
    pub fn new(probe: &Probe, remaining: u32, then: Ev) -> Self {
        Self {
            life: Life::new(probe),
            remaining,
            then,
        }
    }
}

impl<A: StateAllocator<Ev, u32>> SimpleState<Ev, u32, A> for Countdown {
    fn enter(&mut self) {
        self.life.enter("countdown".into());
    }

    fn handle_event(&mut self, sa: &mut A, ev: Ev) -> HandleEventReturn {
        self.life.handle("countdown".into());
        let probe = &self.life.probe;
        match ev {
            Ev::Start => sa.create_simple(Charging::new(probe, 0)),
            Ev::Double => {
                let _ = sa.create_simple(Charging::new(probe, 0));
                sa.create_simple(Charging::new(probe, 0))
            }
            _ => A::PASS_ON,
        }
    }

    fn callback(&mut self) -> CallbackResult<Ev, u32> {
        match self.remaining {
            0 => CallbackResult::Event(self.then),
            n => {
                self.remaining = n - 1;
                if n % 2 == 0 {
                    CallbackResult::Value(n)
                } else {
                    CallbackResult::Pending
                }
            }
        }
    }

    fn leave(&mut self) {
        self.life.leave("countdown".into());
    }
}

/// Compound state occupying nesting level `level`
pub struct Session {
    life: Life,
    level: usize,
}

impl Session {
    pub fn new(probe: &Probe, level: usize) -> Self {
        Self {
            life: Life::new(probe),
            level,
        }
    }

    fn label(&self) -> String {
        format!("session@{}", self.level)
    }
}

impl<A: StateAllocator<Ev, u32>> CompoundState<Ev, u32, A> for Session {
    fn enter(&mut self) {
        let address = self as *const Self as usize;
        self.life.probe.0.borrow_mut().addresses.push(address);
        let label = self.label();
        self.life.enter(label);
    }

    fn handle_event(&mut self, sa: &mut A, ev: Ev) -> HandleEventReturn {
        self.life.handle(self.label());
        let probe = &self.life.probe;
        match ev {
            Ev::Poke => A::HANDLED_INTERNALLY,
            // only the outermost session reacts
            Ev::Collapse if self.level == 0 => {
                let staged = sa.create_compound(Session::new(probe, 0));
                if staged.is_allocation_error() {
                    return staged;
                }
                sa.create_simple(Idle::new(probe, 1))
            }
            Ev::Swap => {
                let staged = sa.create_compound(Session::new(probe, self.level));
                if staged.is_allocation_error() {
                    return staged;
                }
                sa.create_simple(Idle::new(probe, self.level + 1))
            }
            _ => A::PASS_ON,
        }
    }

    fn leave(&mut self) {
        let label = self.label();
        self.life.leave(label);
    }
}

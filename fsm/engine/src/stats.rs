//! Dispatch statistics

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters kept by a state machine across its lifetime
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsmStats {
    /// Events dispatched through `handle_event`, including synthesized ones
    pub events: usize,
    /// Dispatches that ended in a transition
    pub transitions: usize,
    /// Dispatches no state accepted
    pub unhandled: usize,
    /// Dispatches that reported an internal error
    pub internal_errors: usize,
    /// Deepest nesting level reached
    pub peak_nesting_level: usize,
}

impl FsmStats {
    pub const fn new() -> Self {
        Self {
            events: 0,
            transitions: 0,
            unhandled: 0,
            internal_errors: 0,
            peak_nesting_level: 0,
        }
    }

    pub(crate) fn on_event(&mut self) {
        self.events += 1;
    }

    pub(crate) fn on_transition(&mut self, nesting_level: usize) {
        self.transitions += 1;
        if nesting_level > self.peak_nesting_level {
            self.peak_nesting_level = nesting_level;
        }
    }

    pub(crate) fn on_unhandled(&mut self) {
        self.unhandled += 1;
    }

    pub(crate) fn on_internal_error(&mut self) {
        self.internal_errors += 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FsmStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "FsmStats{{ events: {}, transitions: {}, unhandled: {}, errors: {}, peak: {} }}",
            self.events,
            self.transitions,
            self.unhandled,
            self.internal_errors,
            self.peak_nesting_level
        );
    }
}

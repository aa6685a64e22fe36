//! Error types shared by the allocators and the engine

use core::fmt;

use thiserror::Error;

/// Kind of state object an allocator slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateKind {
    /// Leaf state receiving events first
    Simple,
    /// Container state occupying one nesting level
    Compound,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Simple => write!(f, "simple"),
            StateKind::Compound => write!(f, "compound"),
        }
    }
}

/// Reasons a state handler failed to stage a new state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// Creation was attempted outside of a handling pass
    #[error("allocator is not ready for creation")]
    NotReady,
    /// A state of this kind has already been staged during the current pass
    #[error("a {0} state has already been staged during this pass")]
    AlreadyStaged(StateKind),
    /// The requested nesting level has no compound slot
    #[error("nesting level {level} exceeds the maximum of {max}")]
    NestingOverflow {
        /// Level the compound state would occupy
        level: usize,
        /// Number of configured nesting levels
        max: usize,
    },
    /// Both buffers of the slot are still occupied
    #[error("no free {kind} buffer left at nesting level {level}")]
    SlotsExhausted {
        /// Kind of the slot
        kind: StateKind,
        /// Nesting level of the slot
        level: usize,
    },
}

/// Engine-level failures, reported next to `HandleEventResult::InternalError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmError {
    /// No leaf state has been installed with `reset`
    #[error("state machine has not been reset to an initial state")]
    NotInitialized,
    /// A handler failed to stage a state
    #[error("state allocation failed: {0}")]
    Allocation(#[from] AllocError),
    /// A transition was requested but no simple state was staged
    #[error("transition requested without a staged simple state")]
    MissingSimpleState,
    /// The compound stack could not take another level
    #[error("compound stack is full at nesting level {level}")]
    NestingStackFull {
        /// Level the compound state would have occupied
        level: usize,
    },
}

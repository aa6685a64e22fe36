//! Tagged outcomes exchanged between states, allocators and the engine

use crate::error::AllocError;

/// Outcome of a state's `handle_event`
///
/// Handlers return [`PassOn`](Self::PassOn) or
/// [`HandledInternally`](Self::HandledInternally) themselves; the other two
/// variants are produced by the allocator facade when a state is staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandleEventReturn {
    /// Event was not handled here, try the next outer level
    PassOn,
    /// Event was handled without a transition
    HandledInternally,
    /// Event was handled and new state(s) were staged
    NewState,
    /// Staging a new state failed
    AllocationError(AllocError),
}

impl HandleEventReturn {
    /// Decline the event
    pub const PASS_ON: Self = Self::PassOn;
    /// Consume the event without changing state
    pub const HANDLED_INTERNALLY: Self = Self::HandledInternally;

    pub const fn is_pass_on(&self) -> bool {
        matches!(self, Self::PassOn)
    }

    pub const fn is_handled_internally(&self) -> bool {
        matches!(self, Self::HandledInternally)
    }

    pub const fn is_new_state(&self) -> bool {
        matches!(self, Self::NewState)
    }

    pub const fn is_allocation_error(&self) -> bool {
        matches!(self, Self::AllocationError(_))
    }
}

impl From<AllocError> for HandleEventReturn {
    fn from(err: AllocError) -> Self {
        Self::AllocationError(err)
    }
}

/// Value returned by a simple state's `callback`
///
/// A leaf either produces a value for the caller of `feed`, synthesizes an
/// event that is run through the machine, or has nothing to report yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult<E, R> {
    /// Value handed back to the caller of `feed`
    Value(R),
    /// Event dispatched through the machine
    Event(E),
    /// Nothing to report yet
    Pending,
}

impl<E, R> Default for CallbackResult<E, R> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<E, R> CallbackResult<E, R> {
    pub const fn value(value: R) -> Self {
        Self::Value(value)
    }

    pub const fn event(event: E) -> Self {
        Self::Event(event)
    }

    pub const fn pending() -> Self {
        Self::Pending
    }

    pub const fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }

    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Result of dispatching one event through the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandleEventResult {
    /// Event was handled, with or without a transition
    Success,
    /// No state in the nesting stack accepted the event
    Unhandled,
    /// Engine or allocator invariant was violated
    InternalError,
}

impl HandleEventResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled)
    }

    pub const fn is_internal_error(&self) -> bool {
        matches!(self, Self::InternalError)
    }
}

/// Result of one cooperative `feed` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedResult<R> {
    /// The leaf callback produced a value
    HasValue(R),
    /// The leaf callback had nothing to report
    NoValue,
    /// A synthesized event caused a successful dispatch
    Transition,
    /// A synthesized event was not handled by any level
    UnhandledEvent,
    /// The machine was not initialized or dispatch failed
    InternalError,
}

impl<R> FeedResult<R> {
    pub const fn has_value(&self) -> bool {
        matches!(self, Self::HasValue(_))
    }

    pub const fn transition(&self) -> bool {
        matches!(self, Self::Transition)
    }

    pub const fn unhandled_event(&self) -> bool {
        matches!(self, Self::UnhandledEvent)
    }

    pub const fn internal_error(&self) -> bool {
        matches!(self, Self::InternalError)
    }

    pub fn value(&self) -> Option<&R> {
        match self {
            Self::HasValue(value) => Some(value),
            _ => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut R> {
        match self {
            Self::HasValue(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<R> {
        match self {
            Self::HasValue(value) => Some(value),
            _ => None,
        }
    }
}

impl<R> From<HandleEventResult> for FeedResult<R> {
    fn from(result: HandleEventResult) -> Self {
        match result {
            HandleEventResult::Success => Self::Transition,
            HandleEventResult::Unhandled => Self::UnhandledEvent,
            HandleEventResult::InternalError => Self::InternalError,
        }
    }
}

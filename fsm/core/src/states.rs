//! State contracts and the allocator facade handed to state handlers

use crate::result::{CallbackResult, HandleEventReturn};

/// Leaf state of a nested state machine
///
/// `E` is the event type, `R` the value type produced through `feed`, and
/// `A` the allocator facade the state uses to stage its successors.
///
/// The engine calls `enter` once after the state has been installed and
/// `leave` once before it is destroyed.
pub trait SimpleState<E, R, A> {
    /// Entry action
    fn enter(&mut self) {}

    /// Handle an event, optionally staging successor states through `allocator`
    fn handle_event(&mut self, allocator: &mut A, event: E) -> HandleEventReturn;

    /// Cooperative poll step driven by `feed`
    fn callback(&mut self) -> CallbackResult<E, R> {
        CallbackResult::Pending
    }

    /// Exit action
    fn leave(&mut self) {}
}

/// Container state occupying one nesting level
///
/// A compound state only sees an event after every state nested beneath it
/// returned [`HandleEventReturn::PassOn`].
pub trait CompoundState<E, R, A> {
    /// Entry action
    fn enter(&mut self) {}

    /// Handle an event passed on by the nested states
    fn handle_event(&mut self, allocator: &mut A, event: E) -> HandleEventReturn;

    /// Exit action
    fn leave(&mut self) {}
}

/// Capability surface handed to a state handler during dispatch
///
/// At most one simple and one compound state may be staged per handling
/// pass. A staged compound state replaces the level whose handler staged it
/// (or opens a new level when the leaf staged it); the staged simple state
/// becomes the new leaf.
pub trait StateAllocator<E, R>: Sized {
    /// Decline the event
    const PASS_ON: HandleEventReturn = HandleEventReturn::PassOn;
    /// Consume the event without changing state
    const HANDLED_INTERNALLY: HandleEventReturn = HandleEventReturn::HandledInternally;

    /// Stage `state` as the next leaf
    ///
    /// Returns [`HandleEventReturn::NewState`] on success and
    /// [`HandleEventReturn::AllocationError`] otherwise; `state` is dropped
    /// when it cannot be staged.
    fn create_simple<S>(&mut self, state: S) -> HandleEventReturn
    where
        S: SimpleState<E, R, Self> + 'static;

    /// Stage `state` as the compound state of the level being handled
    fn create_compound<S>(&mut self, state: S) -> HandleEventReturn
    where
        S: CompoundState<E, R, Self> + 'static;
}

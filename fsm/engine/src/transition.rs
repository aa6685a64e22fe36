//! Transition execution and stack unwinding

use fsm_core::{FsmError, HandleEventResult};
use fsm_mem::{NestingStack, StateStore};
use log::debug;

use crate::Fsm;

impl<E, R, S: StateStore<E, R>> Fsm<E, R, S> {
    /// Leave and destroy the leaf and every compound state at or above
    /// `up_to_nesting_level`, innermost first
    pub(crate) fn unwind(&mut self, up_to_nesting_level: usize) {
        if let Some(mut state) = self.current_state.take() {
            state.leave();
        }

        while self.compound_stack.len() > up_to_nesting_level {
            match self.compound_stack.pop() {
                Some(mut state) => state.leave(),
                None => break,
            }
        }
    }

    /// Install the staged states after a handler at `handled_at` requested
    /// a transition
    pub(crate) fn transition(&mut self, handled_at: usize) -> HandleEventResult {
        // the live stack stays untouched unless a successor leaf exists
        if !self.store.has_staged_simple_state() {
            self.store.finish_pass();
            return self.internal_error(FsmError::MissingSimpleState);
        }

        let left_levels = self.compound_stack.len().saturating_sub(handled_at);
        self.unwind(handled_at);

        if let Some(compound_state) = self.store.pull_compound_state() {
            if self.compound_stack.push(compound_state).is_err() {
                self.store.finish_pass();
                return self.internal_error(FsmError::NestingStackFull { level: handled_at });
            }
            if let Some(compound_state) = self.compound_stack.last_mut() {
                compound_state.enter();
            }
        }

        let next_state = self.store.pull_simple_state();
        self.store.finish_pass();

        let Some(mut next_state) = next_state else {
            return self.internal_error(FsmError::MissingSimpleState);
        };
        next_state.enter();
        self.current_state = Some(next_state);

        let nesting_level = self.compound_stack.len();
        self.stats.on_transition(nesting_level);
        debug!(
            "[{}] transition at level {}: left leaf and {} compound state(s), now at nesting level {}",
            self.config.name, handled_at, left_levels, nesting_level
        );
        HandleEventResult::Success
    }
}

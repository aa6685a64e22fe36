//! Unit tests for fsm-engine

mod support;

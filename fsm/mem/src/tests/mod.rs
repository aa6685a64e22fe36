//! Unit tests for fsm-mem

mod support;

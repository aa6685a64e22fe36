//! Unit tests for fsm-core

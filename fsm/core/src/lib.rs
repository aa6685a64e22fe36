#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # FSM Core
//!
//! Core types and traits for the nested hierarchical state machine runtime.
//! This crate provides the contracts that concrete states implement and the
//! tagged values that travel between states, allocators and the engine:
//! - [`SimpleState`] and [`CompoundState`] lifecycle and handler contracts
//! - [`StateAllocator`], the facade a handler uses to stage new states
//! - [`HandleEventReturn`], [`CallbackResult`], [`HandleEventResult`] and
//!   [`FeedResult`] outcomes
//! - [`AllocError`] and [`FsmError`] failure descriptions
//!
//! No outcome in this crate is ever reported by panicking.

pub mod error;
pub mod result;
pub mod states;

pub use error::*;
pub use result::*;
pub use states::*;

#[cfg(test)]
mod tests;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

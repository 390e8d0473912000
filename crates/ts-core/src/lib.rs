//! Core types for TailStat.
//!
//! This crate hosts the error type and `Result` alias shared by the
//! TailStat workspace, so that library crates agree on failure semantics
//! without depending on each other.

pub mod error;

pub use error::{Error, Result};

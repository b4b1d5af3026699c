//! Domain models for notype.
//!
//! These are the core types shared across all crates.

pub mod account;
pub mod history;
pub mod session;

//! Shared types and core error definitions for Warden.
//!
//! This crate holds the foundational types used by both the engine crate and
//! the server binary, so that neither has to depend on the other for them.

pub mod error;
pub mod prelude;
pub mod types;

// vim: ts=4

//! # framesight-core
//!
//! Core types, traits, and abstractions for the framesight video
//! detection service.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other framesight crates depend on: the job record and
//! its three-state lifecycle, per-frame detection results, repository
//! traits for pluggable persistence, the shared error type, and token
//! generation for client polling.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod token;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use token::generate_token;
pub use traits::*;

//! Core domain + application logic for copying 7tv emote sets.
//!
//! This crate is intentionally transport-agnostic. The 7tv GraphQL API lives
//! behind ports (traits) implemented in the `emotecopy-seventv` adapter crate.

pub mod config;
pub mod copier;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod plan;
pub mod ports;
pub mod token;

pub use errors::{Error, Result};

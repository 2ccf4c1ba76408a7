//! Domain models for Bastion.
//!
//! These are the core types shared across all crates.

pub mod principal;
pub mod session;

//! Bastion Core: domain models, repository traits and the shared error
//! type used by every other crate in the workspace.

pub mod error;
pub mod models;
pub mod repository;

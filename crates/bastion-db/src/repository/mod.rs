//! SurrealDB repository implementations.

mod principal;
mod session;

pub use principal::SurrealPrincipalRepository;
pub use session::SurrealSessionRepository;

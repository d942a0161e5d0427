//! Request coordination and session refresh for the accountability API.
//!
//! [`AuthenticatedClient`] is the entry point. Identical concurrent calls
//! share one round trip through [`dedup::RequestCoordinator`], and a 401
//! triggers at most one refresh exchange through
//! [`session::SessionRefresher`] before the call is retried once.

mod client;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod request_context;
pub mod request_key;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use client::AuthenticatedClient;
pub use config::Config;
pub use errors::Error;
pub use request_context::RequestDispatchContext;
pub use request_key::RequestKey;
pub use session::{CredentialPair, CredentialStore, MemoryCredentialStore};
pub use types::{ApiResponse, HttpMethod};

#[cfg(test)]
mod tests;

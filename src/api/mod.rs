//! HTTP API.
//!
//! JSON routes live under `/api/`; the generative-model routes are mounted
//! at the root. Every request passes through the access log middleware.
//!
//! `api_router()` returns a plain `Router` so tests can drive it with
//! `oneshot` and the server can mount it on a listener.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;

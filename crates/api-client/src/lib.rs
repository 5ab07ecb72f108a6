//! Authenticated API client for the marketplace backend
//!
//! Attaches the stored bearer credential to every call, and on a 401
//! refreshes the credential once and replays the call once. When no refresh
//! is possible, or the refresh fails, the session is terminated: both
//! credentials cleared and the user sent to the login route.
//!
//! Modules:
//! - `request`: the replayable request snapshot and the buffered response
//! - `decorate`: attaching the access credential
//! - `machine`: the pure refresh-and-replay state machine
//! - `refresh`: the single refresh call, independent or coalesced
//! - `client`: `AuthClient`, which drives the machine over HTTP

pub mod client;
pub mod decorate;
pub mod error;
pub mod machine;
pub mod metrics;
pub mod refresh;
pub mod request;

#[cfg(test)]
mod mock_backend;

pub use client::{AuthClient, ClientConfig, DEFAULT_TIMEOUT};
pub use decorate::decorate;
pub use error::{Error, Result};
pub use machine::{
    AUTH_FAILURE_STATUS, RequestAction, RequestEvent, RequestState, Surface, handle_event,
    is_auth_failure,
};
pub use refresh::RefreshMode;
pub use request::{ApiResponse, PendingRequest};

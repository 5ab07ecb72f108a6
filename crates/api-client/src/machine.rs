//! Refresh-and-replay state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! `AuthClient` executes the I/O implied by each action and feeds the
//! outcome back as the next event.
//!
//! ```text
//! NORMAL --401--> REFRESHING --refreshed--> REPLAYING --any--> RESOLVED
//!    |                |
//!    +--other-->      +--unavailable / failed--> TERMINATED
//!     RESOLVED
//! ```
//!
//! A request enters REFRESHING at most once. Any 401 seen on a request that
//! is already marked retried, or seen while REPLAYING, resolves as a final
//! rejection.

use reqwest::StatusCode;

/// The distinguished "credential invalid or expired" status.
pub const AUTH_FAILURE_STATUS: StatusCode = StatusCode::UNAUTHORIZED;

/// Whether a response status signals a credential failure.
pub fn is_auth_failure(status: StatusCode) -> bool {
    status == AUTH_FAILURE_STATUS
}

/// Lifecycle of one original request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Sent with the stored credential, awaiting its response
    Normal,
    /// Failed authentication, refresh call in flight
    Refreshing,
    /// Refreshed, replay in flight
    Replaying,
    /// Outcome delivered to the caller
    Resolved,
    /// Session ended
    Terminated,
}

/// Outcomes fed back into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// The backend answered the original request or its replay
    Responded { status: StatusCode, retried: bool },
    /// No refresh credential in the store
    RefreshUnavailable,
    /// New credentials stored
    Refreshed,
    /// Refresh call rejected or failed on the network
    RefreshFailed,
}

/// Which error the caller sees when the session is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The original 401
    Original,
    /// The refresh call's error
    RefreshError,
}

/// I/O the driver performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Hand the response to the caller unchanged
    Deliver,
    /// Hand the 401 to the caller as a final error
    Reject,
    /// Mark the request retried and perform one refresh call
    Refresh,
    /// Rewrite the authorization header and send the request again
    Replay,
    /// Clear credentials, redirect to login, fail with the given error
    Terminate { surface: Surface },
    /// No-op
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: RequestState, event: RequestEvent) -> (RequestState, RequestAction) {
    match (state, event) {
        // --- Normal / Replaying: a response arrived ---
        (
            RequestState::Normal | RequestState::Replaying,
            RequestEvent::Responded { status, .. },
        ) if !is_auth_failure(status) => (RequestState::Resolved, RequestAction::Deliver),

        (RequestState::Normal, RequestEvent::Responded { retried: true, .. }) => {
            (RequestState::Resolved, RequestAction::Reject)
        }

        (RequestState::Normal, RequestEvent::Responded { retried: false, .. }) => {
            (RequestState::Refreshing, RequestAction::Refresh)
        }

        // The replay is the one retry this request gets
        (RequestState::Replaying, RequestEvent::Responded { .. }) => {
            (RequestState::Resolved, RequestAction::Reject)
        }

        // --- Refreshing ---
        (RequestState::Refreshing, RequestEvent::Refreshed) => {
            (RequestState::Replaying, RequestAction::Replay)
        }

        (RequestState::Refreshing, RequestEvent::RefreshUnavailable) => (
            RequestState::Terminated,
            RequestAction::Terminate {
                surface: Surface::Original,
            },
        ),

        (RequestState::Refreshing, RequestEvent::RefreshFailed) => (
            RequestState::Terminated,
            RequestAction::Terminate {
                surface: Surface::RefreshError,
            },
        ),

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, RequestAction::None),
    }
}

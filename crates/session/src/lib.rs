//! Marketplace session library
//!
//! Everything the authenticated client needs to know about a session,
//! without the client itself:
//!
//! 1. `store`: where the access and refresh credentials live
//! 2. `token`: the raw login and refresh calls, never intercepted
//! 3. `navigator`: the sink that sends the user back to the login route
//! 4. `terminate`: clearing the store and redirecting, as one step

pub mod endpoints;
pub mod error;
pub mod navigator;
pub mod store;
pub mod terminate;
pub mod token;

pub use endpoints::*;
pub use error::{Error, Result};
pub use navigator::{Navigator, RecordingNavigator};
pub use store::{CredentialKey, CredentialStore, FileStore, MemoryStore};
pub use terminate::SessionTerminator;
pub use token::{LoginResponse, Role, TokenPair, UserProfile, login, refresh};

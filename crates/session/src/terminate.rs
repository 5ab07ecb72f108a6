//! Session termination
//!
//! Clears both credentials and sends the user to the login route. This is
//! the terminal path of a session and is safe to run any number of times.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::navigator::Navigator;
use crate::store::CredentialStore;

/// Ends the current session: empty store, redirect to login.
#[derive(Clone)]
pub struct SessionTerminator {
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
}

impl SessionTerminator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_route: login_route.into(),
        }
    }

    /// Clear the credentials and redirect.
    ///
    /// The redirect happens even when clearing fails; the storage error is
    /// returned afterwards.
    pub fn terminate(&self, reason: &'static str) -> Result<()> {
        let cleared = self.store.clear();
        if let Err(e) = &cleared {
            warn!(error = %e, reason, "failed to clear credentials during session termination");
        }
        self.navigator.redirect(&self.login_route);
        info!(reason, route = %self.login_route, "session terminated");
        cleared
    }
}

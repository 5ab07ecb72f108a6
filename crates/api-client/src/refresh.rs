//! Credential refresh for failed requests
//!
//! Performs the single refresh call a failing request is allowed. The call
//! goes through `session::refresh` on the bare HTTP client, so a 401 from the
//! refresh endpoint can never start another refresh.
//!
//! Two modes:
//! - `Independent`: every failing request refreshes on its own. Concurrent
//!   failures produce one refresh call each.
//! - `Coalesced`: refreshes serialize on a gate. A request that acquires the
//!   gate after the credential it failed with was already rotated reuses the
//!   new credential instead of calling the backend again.

use std::sync::Arc;

use common::Secret;
use serde::Deserialize;
use session::{CredentialKey, CredentialStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics;

/// How concurrent refreshes are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    #[default]
    Independent,
    Coalesced,
}

/// Result of one refresh attempt.
#[derive(Debug)]
pub(crate) enum RefreshOutcome {
    /// Access credential to replay with
    Refreshed(Secret<String>),
    /// No refresh credential stored
    Unavailable,
    Failed(session::Error),
}

pub(crate) struct Refresher {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    gate: Option<Mutex<()>>,
}

impl Refresher {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        store: Arc<dyn CredentialStore>,
        mode: RefreshMode,
    ) -> Self {
        let gate = match mode {
            RefreshMode::Independent => None,
            RefreshMode::Coalesced => Some(Mutex::new(())),
        };
        Self {
            http,
            base_url,
            store,
            gate,
        }
    }

    pub(crate) fn mode(&self) -> RefreshMode {
        if self.gate.is_some() {
            RefreshMode::Coalesced
        } else {
            RefreshMode::Independent
        }
    }

    /// Obtain a fresh access credential for a request that failed with
    /// `stale` (the credential it was sent with, if any).
    pub(crate) async fn refresh(&self, stale: Option<&str>) -> RefreshOutcome {
        let permit = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        if permit.is_some()
            && let Some(current) = self.store.get(CredentialKey::Access)
            && stale.is_none_or(|s| !current.matches(s))
        {
            debug!("credential already rotated by a concurrent refresh");
            metrics::record_refresh("coalesced");
            return RefreshOutcome::Refreshed(current);
        }

        let Some(refresh) = self.store.get(CredentialKey::Refresh) else {
            info!("no refresh credential stored");
            metrics::record_refresh("unavailable");
            return RefreshOutcome::Unavailable;
        };

        match session::refresh(&self.http, &self.base_url, refresh.expose()).await {
            Ok(pair) => {
                if let Err(e) = self
                    .store
                    .store_pair(&pair.access_token, pair.refresh_token.as_deref())
                {
                    warn!(error = %e, "failed to persist refreshed credentials");
                }
                info!(
                    rotated_refresh = pair.refresh_token.is_some(),
                    "credential refresh succeeded"
                );
                metrics::record_refresh("success");
                RefreshOutcome::Refreshed(Secret::new(pair.access_token))
            }
            Err(e) => {
                warn!(error = %e, "credential refresh failed");
                let result = if e.status().is_some() {
                    "rejected"
                } else {
                    "network"
                };
                metrics::record_refresh(result);
                RefreshOutcome::Failed(e)
            }
        }
    }
}

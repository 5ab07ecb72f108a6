//! Request decoration: attach the stored access credential

use session::{CredentialKey, CredentialStore};
use tracing::{debug, warn};

use crate::request::PendingRequest;

/// Attach the current access credential as a bearer authorization header.
///
/// Without a stored credential the request goes out as the caller built it,
/// normally unauthenticated. A missing credential is not an error; the
/// backend answers 401 if the resource needs one.
pub fn decorate(request: &mut PendingRequest, store: &dyn CredentialStore) {
    match store.get(CredentialKey::Access) {
        Some(access) => {
            if let Err(e) = request.set_authorization(&access.bearer()) {
                warn!(request_id = %request.id(), error = %e, "skipping invalid access credential");
            }
        }
        None => {
            debug!(request_id = %request.id(), "no access credential, sending unauthenticated");
        }
    }
}

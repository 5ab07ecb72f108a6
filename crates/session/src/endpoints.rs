//! Backend auth routes and credential storage keys

/// Exchanges email and password for the initial credential pair.
pub const LOGIN_PATH: &str = "/auth/login";

/// Current user profile, sent with the access credential.
pub const ME_PATH: &str = "/auth/me";

/// Exchanges a refresh credential for a new access credential.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Where session termination sends the user.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Storage key of the access credential.
pub const ACCESS_KEY: &str = "accessToken";

/// Storage key of the refresh credential.
pub const REFRESH_KEY: &str = "refreshToken";

/// Join a backend base URL and an absolute or relative path.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

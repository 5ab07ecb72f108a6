//! In-process marketplace backend for client tests
//!
//! Serves the auth endpoints and a protected products resource on an ephemeral
//! port. Every hit is recorded with the authorization header it carried.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;

/// How `/auth/refresh` answers.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue `at_<n>` and `rt_<n>`; `expected` restricts the accepted
    /// refresh credential
    Rotate { expected: Option<String> },
    /// Issue a new access credential only
    AccessOnly,
    /// Answer with this status
    Reject(StatusCode),
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub authorization: Option<String>,
}

pub struct MockBackend {
    valid_access: Mutex<HashSet<String>>,
    refresh: Mutex<RefreshBehavior>,
    refresh_delay: Mutex<Duration>,
    reject_resources: AtomicBool,
    issued: AtomicUsize,
    hits: Mutex<Vec<Hit>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new(HashSet::new()),
            refresh: Mutex::new(RefreshBehavior::Rotate { expected: None }),
            refresh_delay: Mutex::new(Duration::ZERO),
            reject_resources: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
            hits: Mutex::new(Vec::new()),
        })
    }

    pub fn accept_access(&self, token: &str) {
        self.valid_access.lock().unwrap().insert(token.to_owned());
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.refresh.lock().unwrap() = behavior;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Answer 401 on every resource, whatever credential is sent.
    pub fn reject_all_resources(&self) {
        self.reject_resources.store(true, Ordering::SeqCst);
    }

    pub fn hits(&self, path: &str) -> Vec<Hit> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.hits(path).len()
    }

    fn record(&self, path: &str, headers: &HeaderMap) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.hits.lock().unwrap().push(Hit {
            path: path.to_owned(),
            authorization,
        });
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_resources.load(Ordering::SeqCst) {
            return false;
        }
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid_access.lock().unwrap().contains(token))
    }

    fn issue(&self, with_refresh: bool) -> serde_json::Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("at_{n}");
        self.accept_access(&access);
        if with_refresh {
            serde_json::json!({"accessToken": access, "refreshToken": format!("rt_{n}")})
        } else {
            serde_json::json!({"accessToken": access})
        }
    }
}

fn profile() -> serde_json::Value {
    serde_json::json!({
        "id": "u_vendor",
        "email": "shop@example.com",
        "name": "Corner Shop",
        "role": "vendor",
        "vendorId": "v_42"
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"message": "token expired"})),
    )
        .into_response()
}

async fn login(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    backend.record(session::LOGIN_PATH, &headers);
    if body["password"] != "correct-horse" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"message": "invalid email or password"})),
        )
            .into_response();
    }
    let mut pair = backend.issue(true);
    pair["user"] = profile();
    Json(pair).into_response()
}

async fn me(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    backend.record(session::ME_PATH, &headers);
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    Json(profile()).into_response()
}

async fn refresh(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    backend.record(session::REFRESH_PATH, &headers);
    let delay = *backend.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let behavior = backend.refresh.lock().unwrap().clone();
    match behavior {
        RefreshBehavior::Rotate { expected } => {
            let presented = body["refreshToken"].as_str().unwrap_or_default();
            if expected.is_some_and(|e| e != presented) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"message": "invalid refresh token"})),
                )
                    .into_response();
            }
            Json(backend.issue(true)).into_response()
        }
        RefreshBehavior::AccessOnly => Json(backend.issue(false)).into_response(),
        RefreshBehavior::Reject(status) => (
            status,
            Json(serde_json::json!({"message": "refresh rejected"})),
        )
            .into_response(),
    }
}

async fn product(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    backend.record(uri.path(), &headers);
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    Json(serde_json::json!({"id": id})).into_response()
}

async fn update_product(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(mut body): Json<serde_json::Value>,
) -> Response {
    backend.record(uri.path(), &headers);
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    body["id"] = serde_json::Value::String(id);
    Json(body).into_response()
}

async fn not_found(State(backend): State<Arc<MockBackend>>, uri: Uri, headers: HeaderMap) -> Response {
    backend.record(uri.path(), &headers);
    (StatusCode::NOT_FOUND, "no such route").into_response()
}

/// Serve the backend on 127.0.0.1 and return its base URL.
pub async fn start(backend: Arc<MockBackend>) -> String {
    let app = axum::Router::new()
        .route(session::LOGIN_PATH, post(login))
        .route(session::ME_PATH, get(me))
        .route(session::REFRESH_PATH, post(refresh))
        .route("/products/{id}", get(product).put(update_product))
        .fallback(not_found)
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

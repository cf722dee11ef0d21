//! Integration tests for the Threadline storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p threadline-integration-tests
//! ```
//!
//! Nothing external is needed: the remote stores are either the in-process
//! [`MemoryBackend`] or [`FakeRestBackend`], an axum server on an ephemeral
//! local port that speaks the same REST paths as the production backend.
//!
//! # Test Categories
//!
//! - `guest_to_account` - Guest cart, sign-in migration, sign-out
//! - `checkout_flow` - Pricing and the simulated checkout
//! - `scan_flow` - Body scan capture through the storefront
//! - `rest_backend` - The HTTP client against the fake backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use threadline_core::{Cart, CartLineItem, Identity, ProductId, ScanRecord};
use threadline_storefront::config::StorefrontConfig;
use threadline_storefront::notify::RecordingNotifier;
use threadline_storefront::remote::{MemoryBackend, RemoteCartStore, RemoteScanStore};
use threadline_storefront::scan::{Camera, SimulatedCamera};
use threadline_storefront::session::FixedIdentityProvider;
use threadline_storefront::storage::{KeyValueStore, MemoryStore};
use threadline_storefront::{Collaborators, Storefront, StorefrontError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

// ============================================================================
// Storefront harness
// ============================================================================

/// Short timings so paused-clock tests stay readable.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        scan_seconds: 3,
        checkout_delay: Duration::from_secs(2),
        remote_timeout: Duration::from_secs(5),
        fetch_retries: 1,
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".to_string(),
        ..StorefrontConfig::default()
    }
}

/// Identity provider for a shopper who is not signed in yet.
#[must_use]
pub fn shopper(id: &str) -> FixedIdentityProvider {
    FixedIdentityProvider::new(Identity::new(id).with_display_name("Test Shopper"))
}

/// A storefront wired to in-process fakes, with handles to inspect them.
pub struct Harness {
    pub storefront: Storefront,
    pub backend: Arc<MemoryBackend>,
    pub camera: Arc<SimulatedCamera>,
    pub notifier: RecordingNotifier,
    pub storage: Arc<dyn KeyValueStore>,
}

impl Harness {
    /// Build a storefront over fresh in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if client storage cannot be read.
    pub fn new(provider: FixedIdentityProvider) -> Result<Self, StorefrontError> {
        Self::with_storage(provider, Arc::new(MemoryStore::new()))
    }

    /// Build a storefront over existing client storage, as after a reload.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if client storage cannot be read.
    pub fn with_storage(
        provider: FixedIdentityProvider,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StorefrontError> {
        Self::with_backend(provider, storage, Arc::new(MemoryBackend::new()))
    }

    /// Build a storefront sharing a backend with another one, as a second
    /// device would.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if client storage cannot be read.
    pub fn with_backend(
        provider: FixedIdentityProvider,
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<MemoryBackend>,
    ) -> Result<Self, StorefrontError> {
        let camera = Arc::new(SimulatedCamera::new());
        let notifier = RecordingNotifier::new();
        let storefront = Storefront::new(
            test_config(),
            Collaborators {
                identity: Arc::new(provider),
                remote_cart: Arc::clone(&backend) as Arc<dyn RemoteCartStore>,
                remote_scans: Arc::clone(&backend) as Arc<dyn RemoteScanStore>,
                camera: Arc::clone(&camera) as Arc<dyn Camera>,
                storage: Arc::clone(&storage),
                notifier: Arc::new(notifier.clone()),
            },
        )?;
        Ok(Self {
            storefront,
            backend,
            camera,
            notifier,
            storage,
        })
    }
}

// ============================================================================
// Fake REST backend
// ============================================================================

#[derive(Debug, Default)]
struct BackendState {
    carts: HashMap<String, Cart>,
    scans: HashMap<String, Vec<ScanRecord>>,
    fail_writes: bool,
    authorizations: Vec<Option<String>>,
}

type SharedState = Arc<Mutex<BackendState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An axum server implementing the cart and scan REST endpoints in memory.
///
/// The server stops when this value is dropped.
pub struct FakeRestBackend {
    base_url: Url,
    state: SharedState,
    server: JoinHandle<()>,
}

impl FakeRestBackend {
    /// Bind an ephemeral local port and start serving under `/api/`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = SharedState::default();
        let app = Router::new().nest("/api", routes(Arc::clone(&state)));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake backend stopped");
            }
        });

        let base_url = Url::parse(&format!("http://{addr}/api/")).map_err(std::io::Error::other)?;
        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The cart document stored for a user, if any.
    #[must_use]
    pub fn cart(&self, user: &str) -> Option<Cart> {
        lock(&self.state).carts.get(user).cloned()
    }

    #[must_use]
    pub fn scans(&self, user: &str) -> Vec<ScanRecord> {
        lock(&self.state).scans.get(user).cloned().unwrap_or_default()
    }

    /// Answer every write with 503.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// `Authorization` header of every request received, in order.
    #[must_use]
    pub fn authorizations(&self) -> Vec<Option<String>> {
        lock(&self.state).authorizations.clone()
    }
}

impl Drop for FakeRestBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/users/{uid}/cart", get(get_cart))
        .route("/users/{uid}/cart/items", post(add_item))
        .route("/users/{uid}/cart/items/{pid}", patch(set_quantity).delete(remove_item))
        .route("/users/{uid}/scans", get(list_scans).post(save_scan))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SizeQuery {
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: u32,
}

fn record_auth(state: &mut BackendState, headers: &HeaderMap) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.authorizations.push(auth);
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "writes disabled").into_response()
}

async fn get_cart(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    match state.carts.get(&uid) {
        Some(cart) => Json(json!({ "items": cart })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_item(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(item): Json<CartLineItem>,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    if state.fail_writes {
        return unavailable();
    }
    state.carts.entry(uid).or_default().add(item);
    StatusCode::CREATED.into_response()
}

async fn set_quantity(
    State(state): State<SharedState>,
    Path((uid, pid)): Path<(String, String)>,
    Query(query): Query<SizeQuery>,
    headers: HeaderMap,
    Json(body): Json<QuantityBody>,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    if state.fail_writes {
        return unavailable();
    }
    let updated = state.carts.get_mut(&uid).is_some_and(|cart| {
        cart.update_quantity(&ProductId::new(pid), query.size.as_deref(), i64::from(body.quantity))
    });
    if updated {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn remove_item(
    State(state): State<SharedState>,
    Path((uid, pid)): Path<(String, String)>,
    Query(query): Query<SizeQuery>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    if state.fail_writes {
        return unavailable();
    }
    let removed = state
        .carts
        .get_mut(&uid)
        .is_some_and(|cart| cart.remove(&ProductId::new(pid), query.size.as_deref()));
    if removed {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn list_scans(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    match state.scans.get(&uid) {
        Some(scans) => Json(scans.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn save_scan(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
    headers: HeaderMap,
    Json(record): Json<ScanRecord>,
) -> Response {
    let mut state = lock(&state);
    record_auth(&mut state, &headers);
    if state.fail_writes {
        return unavailable();
    }
    state.scans.entry(uid).or_default().push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

//! Subcommand implementations and the storefront they run against.

pub mod cart;
pub mod prefs;
pub mod profile;
pub mod scan;
pub mod wishlist;

use std::sync::Arc;

use thiserror::Error;
use threadline_core::Identity;
use threadline_storefront::config::StorefrontConfig;
use threadline_storefront::notify::TracingNotifier;
use threadline_storefront::remote::{MemoryBackend, RemoteCartStore, RemoteError, RemoteScanStore, RestBackend};
use threadline_storefront::scan::SimulatedCamera;
use threadline_storefront::session::FixedIdentityProvider;
use threadline_storefront::storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
use threadline_storefront::{Collaborators, Storefront, StorefrontError};
use tracing::info;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),
    #[error("Remote backend: {0}")]
    Remote(#[from] RemoteError),
    #[error("Client storage: {0}")]
    Storage(#[from] StorageError),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("--user needs THREADLINE_API_URL; signed-in carts live on the backend")]
    RemoteRequired,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Where state for this invocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Client storage on disk, the configured backend for signed-in users.
    Persistent,
    /// Everything in memory and dropped on exit.
    Ephemeral,
}

/// Build a storefront and, when `user` is given, sign it in.
///
/// # Errors
///
/// Returns `RemoteRequired` for a persistent signed-in run without a backend,
/// otherwise whatever opening storage, the backend or the sign-in returns.
pub async fn open(
    config: StorefrontConfig,
    user: Option<&str>,
    scope: Scope,
) -> Result<Storefront, CliError> {
    let storage: Arc<dyn KeyValueStore> = match scope {
        Scope::Persistent => Arc::new(FileStore::open(&config.data_dir)?),
        Scope::Ephemeral => Arc::new(MemoryStore::new()),
    };

    let (remote_cart, remote_scans): (Arc<dyn RemoteCartStore>, Arc<dyn RemoteScanStore>) =
        match (&config.remote, scope) {
            (Some(remote), Scope::Persistent) => {
                let backend = Arc::new(RestBackend::new(remote, config.remote_timeout)?);
                (Arc::clone(&backend) as Arc<dyn RemoteCartStore>, backend as Arc<dyn RemoteScanStore>)
            }
            (None, Scope::Persistent) if user.is_some() => return Err(CliError::RemoteRequired),
            _ => {
                let backend = Arc::new(MemoryBackend::new());
                (Arc::clone(&backend) as Arc<dyn RemoteCartStore>, backend as Arc<dyn RemoteScanStore>)
            }
        };

    let identity = user.map_or_else(FixedIdentityProvider::unavailable, |id| {
        FixedIdentityProvider::new(Identity::new(id))
    });

    let storefront = Storefront::new(
        config,
        Collaborators {
            identity: Arc::new(identity),
            remote_cart,
            remote_scans,
            camera: Arc::new(SimulatedCamera::new()),
            storage,
            notifier: Arc::new(TracingNotifier),
        },
    )?;

    if let Some(id) = user {
        storefront.login().await?;
        info!(user_id = %id, ?scope, "Signed in");
    }
    Ok(storefront)
}

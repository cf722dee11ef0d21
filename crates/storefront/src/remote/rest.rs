//! REST client for the cart and scan document store.
//!
//! # Endpoints
//!
//! All paths are relative to the configured base URL:
//!
//! - `GET    users/{uid}/cart` - `{ "items": [line, ...] }`
//! - `POST   users/{uid}/cart/items` - body: line item (merged by id + size)
//! - `PATCH  users/{uid}/cart/items/{productId}?size=M` - body: `{ "quantity": n }`
//! - `DELETE users/{uid}/cart/items/{productId}?size=M`
//! - `GET    users/{uid}/scans` - `[record, ...]`
//! - `POST   users/{uid}/scans` - body: record, returns the stored record

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use threadline_core::{Cart, CartLineItem, ProductId, ScanRecord, UserId};
use tracing::{debug, instrument};
use url::Url;

use super::{RemoteCartStore, RemoteError, RemoteScanStore};
use crate::config::RemoteConfig;

/// Max characters of an error body kept for logs and errors.
const ERROR_BODY_PREVIEW: usize = 200;

/// Wire shape of a user's cart document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CartDocument {
    #[serde(default)]
    pub items: Cart,
}

/// Wire shape of a quantity update.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

/// HTTP implementation of [`RemoteCartStore`] and [`RemoteScanStore`].
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("threadline-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
            }),
        })
    }

    fn user_url(&self, user: &UserId, rest: &str) -> Result<Url, RemoteError> {
        let path = format!("users/{}/{rest}", urlencoding::encode(user.as_str()));
        self.inner
            .base_url
            .join(&path)
            .map_err(|e| RemoteError::Unavailable(format!("invalid request path {path}: {e}")))
    }

    fn line_url(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
    ) -> Result<Url, RemoteError> {
        let mut url = self.user_url(
            user,
            &format!("cart/items/{}", urlencoding::encode(product.as_str())),
        )?;
        if let Some(size) = size {
            url.query_pairs_mut().append_pair("size", size);
        }
        Ok(url)
    }

    /// Send a request and return the response body of a successful call.
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<String, RemoteError> {
        let mut request = self.inner.client.request(method.clone(), url.clone());
        if let Some(token) = &self.inner.api_token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(url.path().to_string()));
        }

        if !status.is_success() {
            let preview: String = response_text.chars().take(ERROR_BODY_PREVIEW).collect();
            tracing::error!(
                %method,
                path = %url.path(),
                status = %status,
                body = %preview,
                "Backend returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        debug!(%method, path = %url.path(), status = %status, "Backend call succeeded");
        Ok(response_text)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let text = self.send::<()>(Method::GET, url, None).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(ERROR_BODY_PREVIEW).collect::<String>(),
                "Failed to parse backend response"
            );
            RemoteError::Parse(e)
        })
    }
}

#[async_trait]
impl RemoteCartStore for RestBackend {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn fetch_cart(&self, user: &UserId) -> Result<Cart, RemoteError> {
        let url = self.user_url(user, "cart")?;
        match self.get_json::<CartDocument>(url).await {
            Ok(document) => Ok(document.items),
            // A user who never added anything has no cart document yet.
            Err(RemoteError::NotFound(_)) => Ok(Cart::new()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, item), fields(user_id = %user, product_id = %item.id))]
    async fn add_item(&self, user: &UserId, item: &CartLineItem) -> Result<(), RemoteError> {
        let url = self.user_url(user, "cart/items")?;
        self.send(Method::POST, url, Some(item)).await.map(drop)
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    async fn remove_item(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
    ) -> Result<(), RemoteError> {
        let url = self.line_url(user, product, size)?;
        match self.send::<()>(Method::DELETE, url, None).await {
            Ok(_) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    async fn set_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let url = self.line_url(user, product, size)?;
        self.send(Method::PATCH, url, Some(&QuantityUpdate { quantity }))
            .await
            .map(drop)
    }
}

#[async_trait]
impl RemoteScanStore for RestBackend {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_scans(&self, user: &UserId) -> Result<Vec<ScanRecord>, RemoteError> {
        let url = self.user_url(user, "scans")?;
        match self.get_json(url).await {
            Err(RemoteError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    #[instrument(skip(self, record), fields(user_id = %user, scan_id = %record.scan_id))]
    async fn save_scan(&self, user: &UserId, record: &ScanRecord) -> Result<ScanRecord, RemoteError> {
        let url = self.user_url(user, "scans")?;
        let text = self.send(Method::POST, url, Some(record)).await?;
        if text.trim().is_empty() {
            return Ok(record.clone());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

//! Obtaining and caching Data API session tokens.
//!
//! A cached token is trusted as-is; if it has gone stale the first data
//! request fails and the session forces a refresh through
//! [`Authenticator::force_refresh`].

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::AuthFault;
use crate::response::ApiMessage;
use crate::token::TokenStore;
use crate::transport::{HttpRequest, HttpTransport, TransportError};

/// Credentials handed to a cloud identity exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// External identity provider for cloud-hosted servers.
///
/// The exchange is opaque to this crate: given the connection credentials
/// it either yields a Data API token or fails.
#[async_trait]
pub trait CloudIdentityExchange: Send + Sync {
    /// Exchanges credentials for a Data API token.
    async fn fetch_token(&self, credentials: &CloudCredentials) -> Result<String, AuthFault>;
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    response: LoginResponse,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct LoginErrorEnvelope {
    messages: Vec<ApiMessage>,
}

/// Obtains tokens by login or cloud exchange and persists them.
pub struct Authenticator {
    base_address: String,
    host: String,
    database: String,
    user: String,
    password: String,
    cloud: bool,
    store: Arc<dyn TokenStore>,
    exchange: Option<Arc<dyn CloudIdentityExchange>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("base_address", &self.base_address)
            .field("user", &self.user)
            .field("cloud", &self.cloud)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Creates an authenticator for the given connection.
    pub fn new(
        base_address: impl Into<String>,
        config: &ConnectionConfig,
        store: Arc<dyn TokenStore>,
        exchange: Option<Arc<dyn CloudIdentityExchange>>,
    ) -> Self {
        Self {
            base_address: base_address.into(),
            host: config.host.clone().unwrap_or_default(),
            database: config.database.clone().unwrap_or_default(),
            user: config.user.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            cloud: config.cloud,
            store,
            exchange,
        }
    }

    /// Returns a token, from the cache when one is present.
    pub async fn authenticate(&self, transport: &dyn HttpTransport) -> Result<String, AuthFault> {
        match self.store.get() {
            Ok(Some(token)) => {
                debug!("Using cached Data API token");
                return Ok(token);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable token cache: {e}"),
        }

        self.fresh_token(transport).await
    }

    /// Invalidates the cached token and obtains a new one.
    ///
    /// The cache is never read here, so a token that could not be removed
    /// from the store is not handed out again.
    pub async fn force_refresh(&self, transport: &dyn HttpTransport) -> Result<String, AuthFault> {
        info!("Refreshing Data API token");
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear token cache: {e}");
        }
        self.fresh_token(transport).await
    }

    async fn fresh_token(&self, transport: &dyn HttpTransport) -> Result<String, AuthFault> {
        let token = if self.cloud {
            self.cloud_token().await?
        } else {
            self.login(transport).await?
        };

        if let Err(e) = self.store.put(&token) {
            warn!("Failed to cache Data API token: {e}");
        }

        Ok(token)
    }

    async fn cloud_token(&self) -> Result<String, AuthFault> {
        let exchange = self.exchange.as_ref().ok_or_else(|| AuthFault::Rejected {
            message: "A cloud identity exchange must be configured for cloud connections"
                .to_string(),
            code: -1,
        })?;

        let credentials = CloudCredentials {
            host: self.host.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        };
        exchange.fetch_token(&credentials).await
    }

    async fn login(&self, transport: &dyn HttpTransport) -> Result<String, AuthFault> {
        let credentials = format!("{}:{}", self.user, self.password);
        let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
        let mut request = HttpRequest::new(Method::POST, format!("{}sessions", self.base_address))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Basic {}", encoded));
        request.body = Some(serde_json::json!({}));

        info!("Logging in to {}", self.base_address);
        let response = transport.send(request).await.map_err(|e| match e {
            TransportError::Connect(msg) => AuthFault::Connect(msg),
            TransportError::Other(msg) => {
                warn!("Login transport failure: {msg}");
                AuthFault::Unknown
            }
        })?;

        if response.is_success() {
            return serde_json::from_str::<LoginEnvelope>(&response.body)
                .map(|envelope| envelope.response.token)
                .map_err(|e| AuthFault::Rejected {
                    message: format!("Login response did not contain a token: {e}"),
                    code: -1,
                });
        }

        if response.status == 404 {
            return Err(AuthFault::NotFound {
                reason: response.reason,
                status: response.status,
            });
        }

        match serde_json::from_str::<LoginErrorEnvelope>(&response.body) {
            Ok(envelope) => match envelope.messages.into_iter().next() {
                Some(first) => Err(AuthFault::Rejected {
                    message: first.message,
                    code: first.code,
                }),
                None => Err(AuthFault::Unknown),
            },
            Err(_) => Err(AuthFault::Unknown),
        }
    }
}

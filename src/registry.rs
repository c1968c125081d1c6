// 🌐 Registry API client
// Two backends: the paid gateway (POST, token) and the public lookup (GET).
// Neither ever raises to the caller: failures come back as an empty response.

use crate::config::RegistryConfig;
use crate::error::UpstreamError;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

/// What the batch sees from one lookup. Both fields `None` means the request
/// never produced an HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryResponse {
    pub status: Option<u16>,
    pub body: Option<Value>,
}

impl RegistryResponse {
    pub fn json(status: u16, body: Value) -> Self {
        RegistryResponse {
            status: Some(status),
            body: Some(body),
        }
    }

    pub fn unavailable() -> Self {
        RegistryResponse::default()
    }
}

/// Lookup seam used by the batch. Implementations must not panic or fail:
/// degrade to [`RegistryResponse::unavailable`] instead.
pub trait RegistryClient: Send + Sync {
    fn lookup(&self, cnpj: &str) -> RegistryResponse;
}

// ============================================================================
// HTTP BACKEND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Gateway { url: String, token: String },
    Public { base_url: String },
}

impl Backend {
    /// Gateway when a URL is configured, public lookup otherwise.
    pub fn select(config: &RegistryConfig) -> Self {
        match &config.gateway_url {
            Some(url) => Backend::Gateway {
                url: url.clone(),
                token: config.api_key.clone().unwrap_or_default(),
            },
            None => Backend::Public {
                base_url: config.public_url.clone(),
            },
        }
    }
}

pub struct HttpRegistryClient {
    http: Client,
    backend: Backend,
    upstream_timeout_secs: u64,
}

impl HttpRegistryClient {
    /// Build the blocking client. Must not be called from inside an async
    /// context (the server builds it on the blocking pool).
    pub fn new(config: &RegistryConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(config.client_timeout).build()?;

        Ok(HttpRegistryClient {
            http,
            backend: Backend::select(config),
            upstream_timeout_secs: config.upstream_timeout_secs,
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn fetch(&self, cnpj: &str) -> Result<RegistryResponse, UpstreamError> {
        let response = match &self.backend {
            Backend::Gateway { url, token } => {
                let timeout = self.upstream_timeout_secs.to_string();
                self.http
                    .post(url)
                    .form(&[
                        ("cnpj", cnpj),
                        ("token", token.as_str()),
                        ("timeout", timeout.as_str()),
                    ])
                    .send()?
            }
            Backend::Public { base_url } => self
                .http
                .get(format!("{}/{}", base_url, cnpj))
                .header("Accept", "application/json")
                .send()?,
        };

        let status = response.status().as_u16();
        let text = response.text()?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(RegistryResponse::json(status, body)),
            Err(err) => {
                // status is still worth keeping even without a body
                let err = UpstreamError::Decode {
                    status,
                    reason: err.to_string(),
                };
                warn!(cnpj, %err, "registry body ignored");
                Ok(RegistryResponse {
                    status: Some(status),
                    body: None,
                })
            }
        }
    }
}

impl RegistryClient for HttpRegistryClient {
    fn lookup(&self, cnpj: &str) -> RegistryResponse {
        match self.fetch(cnpj) {
            Ok(response) => {
                debug!(cnpj, status = ?response.status, "registry lookup done");
                response
            }
            Err(err) => {
                warn!(cnpj, %err, "registry lookup failed");
                RegistryResponse::unavailable()
            }
        }
    }
}

impl<C: RegistryClient + ?Sized> RegistryClient for Box<C> {
    fn lookup(&self, cnpj: &str) -> RegistryResponse {
        (**self).lookup(cnpj)
    }
}

//! Thin HTTP fetch abstraction shared by the registry/GitHub/HTTP(S)
//! resolvers. Grounded on `just-bash::network::fetch`'s allow-list +
//! redirect-following fetch: every resolver that talks HTTP goes through
//! one `HttpClient` so the allow-list policy lives in exactly one place.

use async_trait::async_trait;

use crate::errors::{MlldError, MlldResult};

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> MlldResult<String>;
}

/// Host allow-list, checked before every request — same shape as
/// `just-bash`'s network allow-list guarding shell-initiated fetches.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: Vec<String>,
}

impl AllowList {
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts }
    }

    pub fn allow_all() -> Self {
        Self { hosts: vec!["*".to_string()] }
    }

    pub fn permits(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == "*" || h == host)
    }
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
    allow_list: AllowList,
}

impl ReqwestHttpClient {
    pub fn new(allow_list: AllowList) -> Self {
        Self { client: reqwest::Client::new(), allow_list }
    }

    fn check_host(&self, url: &str) -> MlldResult<()> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| MlldError::TransportError { message: format!("invalid URL {url}: {e}") })?;
        let host = parsed.host_str().unwrap_or("");
        if !self.allow_list.permits(host) {
            return Err(MlldError::PermissionDenied { path: host.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> MlldResult<String> {
        self.check_host(url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MlldError::TransportError { message: e.to_string() })?;
        if !response.status().is_success() {
            return Err(MlldError::TransportError {
                message: format!("{url} returned {}", response.status()),
            });
        }
        response.text().await.map_err(|e| MlldError::TransportError { message: e.to_string() })
    }
}

//! Built-in `registry:` resolver: fetches modules from the mlld module
//! registry over HTTP (spec §4.9).

use async_trait::async_trait;

use crate::errors::{MlldError, MlldResult};

use super::super::manager::Resolver;
use super::http_client::HttpClient;

pub struct RegistryResolver {
    prefix: String,
    base_url: String,
    client: Box<dyn HttpClient>,
}

impl RegistryResolver {
    /// `prefix` defaults to `registry:`, but a lock file's
    /// `config.resolvers.registries[]` entry (spec §6.2) can bind a
    /// registry-shaped resolver under any prefix — an org-specific
    /// module namespace backed by its own base URL.
    pub fn new(base_url: impl Into<String>, client: Box<dyn HttpClient>) -> Self {
        Self { prefix: "registry:".to_string(), base_url: base_url.into(), client }
    }

    pub fn with_prefix(prefix: impl Into<String>, base_url: impl Into<String>, client: Box<dyn HttpClient>) -> Self {
        Self { prefix: prefix.into(), base_url: base_url.into(), client }
    }
}

#[async_trait]
impl Resolver for RegistryResolver {
    fn name(&self) -> &str {
        "registry"
    }

    fn can_resolve(&self, reference: &str) -> bool {
        reference.starts_with(&self.prefix)
    }

    async fn resolve(&self, reference: &str) -> MlldResult<String> {
        let module_path = reference.strip_prefix(&self.prefix).ok_or_else(|| MlldError::ModuleNotFound {
            reference: reference.to_string(),
        })?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), module_path);
        self.client.get(&url).await
    }
}

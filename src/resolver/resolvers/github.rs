//! Built-in `github:owner/repo/path` resolver, delegating to the raw
//! content CDN over the shared [`HttpClient`] (spec §4.9).

use async_trait::async_trait;

use crate::errors::{MlldError, MlldResult};

use super::super::manager::Resolver;
use super::http_client::HttpClient;

pub struct GithubResolver {
    client: Box<dyn HttpClient>,
    /// Defaults to `main`; callers can pin a ref via `github:owner/repo@ref/path`.
    default_ref: String,
}

impl GithubResolver {
    pub fn new(client: Box<dyn HttpClient>, default_ref: impl Into<String>) -> Self {
        Self { client, default_ref: default_ref.into() }
    }

    fn raw_url(&self, reference: &str) -> MlldResult<String> {
        let rest = reference
            .strip_prefix("github:")
            .ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;
        let mut parts = rest.splitn(3, '/');
        let owner = parts.next().ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;
        let repo_and_ref = parts.next().ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;
        let path = parts.next().ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;

        let (repo, git_ref) = match repo_and_ref.split_once('@') {
            Some((repo, r)) => (repo, r.to_string()),
            None => (repo_and_ref, self.default_ref.clone()),
        };

        Ok(format!("https://raw.githubusercontent.com/{owner}/{repo}/{git_ref}/{path}"))
    }
}

#[async_trait]
impl Resolver for GithubResolver {
    fn name(&self) -> &str {
        "github"
    }

    fn can_resolve(&self, reference: &str) -> bool {
        reference.starts_with("github:")
    }

    async fn resolve(&self, reference: &str) -> MlldResult<String> {
        let url = self.raw_url(reference)?;
        self.client.get(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopClient;
    #[async_trait]
    impl HttpClient for NoopClient {
        async fn get(&self, _url: &str) -> MlldResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn builds_raw_url_with_default_ref() {
        let resolver = GithubResolver::new(Box::new(NoopClient), "main");
        let url = resolver.raw_url("github:acme/tool/src/lib.mld").unwrap();
        assert_eq!(url, "https://raw.githubusercontent.com/acme/tool/main/src/lib.mld");
    }

    #[test]
    fn pinned_ref_overrides_default() {
        let resolver = GithubResolver::new(Box::new(NoopClient), "main");
        let url = resolver.raw_url("github:acme/tool@v2/src/lib.mld").unwrap();
        assert_eq!(url, "https://raw.githubusercontent.com/acme/tool/v2/src/lib.mld");
    }
}

//! Built-in `http:`/`https:` resolver: fetches a module by URL directly
//! (spec §4.9).

use async_trait::async_trait;

use crate::errors::MlldResult;

use super::super::manager::Resolver;
use super::http_client::HttpClient;

pub struct HttpResolver {
    client: Box<dyn HttpClient>,
}

impl HttpResolver {
    pub fn new(client: Box<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    fn name(&self) -> &str {
        "http"
    }

    fn can_resolve(&self, reference: &str) -> bool {
        reference.starts_with("http://") || reference.starts_with("https://")
    }

    async fn resolve(&self, reference: &str) -> MlldResult<String> {
        self.client.get(reference).await
    }
}

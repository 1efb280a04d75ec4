//! Built-in `dns:` resolver: looks up a module's location from a TXT
//! record, cached for one hour (spec §4.9).

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{MlldError, MlldResult};

use super::super::manager::Resolver;

const DNS_CACHE_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait DnsTxtLookup: Send + Sync {
    async fn lookup_txt(&self, domain: &str) -> MlldResult<Vec<String>>;
}

pub struct DnsResolver {
    lookup: Box<dyn DnsTxtLookup>,
}

impl DnsResolver {
    pub fn new(lookup: Box<dyn DnsTxtLookup>) -> Self {
        Self { lookup }
    }

    /// Parses the conventional `mlld=<url>` TXT record format.
    fn extract_url(records: &[String]) -> MlldResult<String> {
        records
            .iter()
            .find_map(|r| r.strip_prefix("mlld=").map(str::to_string))
            .ok_or_else(|| MlldError::ModuleNotFound { reference: "dns: no mlld= TXT record found".to_string() })
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    fn name(&self) -> &str {
        "dns"
    }

    fn can_resolve(&self, reference: &str) -> bool {
        reference.starts_with("dns:")
    }

    async fn resolve(&self, reference: &str) -> MlldResult<String> {
        let domain = reference
            .strip_prefix("dns:")
            .ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;
        let records = self.lookup.lookup_txt(domain).await?;
        Self::extract_url(&records)
    }

    fn cache_ttl(&self) -> Option<Duration> {
        Some(DNS_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_from_mlld_txt_record() {
        let records = vec!["v=spf1".to_string(), "mlld=https://example.com/mod".to_string()];
        assert_eq!(DnsResolver::extract_url(&records).unwrap(), "https://example.com/mod");
    }

    #[test]
    fn missing_record_is_module_not_found() {
        let records = vec!["v=spf1".to_string()];
        assert_eq!(DnsResolver::extract_url(&records).unwrap_err().code(), "MODULE_NOT_FOUND");
    }
}

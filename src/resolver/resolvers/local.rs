//! Built-in `local:` resolver: reads modules off disk through a
//! host-supplied, read-only file source (spec §4.9). The filesystem is
//! a collaborator out of scope for this crate, same as the
//! `interpolation::FileLoader` used for `<file>` references.

use async_trait::async_trait;

use crate::errors::{MlldError, MlldResult};

use super::super::manager::Resolver;

#[async_trait]
pub trait LocalFileSource: Send + Sync {
    async fn read(&self, path: &str) -> MlldResult<String>;
}

pub struct LocalResolver {
    source: Box<dyn LocalFileSource>,
}

impl LocalResolver {
    pub fn new(source: Box<dyn LocalFileSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Resolver for LocalResolver {
    fn name(&self) -> &str {
        "local"
    }

    fn can_resolve(&self, reference: &str) -> bool {
        reference.starts_with("local:")
    }

    async fn resolve(&self, reference: &str) -> MlldResult<String> {
        let path = reference
            .strip_prefix("local:")
            .ok_or_else(|| MlldError::ModuleNotFound { reference: reference.to_string() })?;
        self.source.read(path).await
    }

    /// `local:` is read-only by design (spec §4.9) — nothing to check
    /// beyond what the file source itself enforces.
    async fn check_access(&self, _reference: &str) -> MlldResult<()> {
        Ok(())
    }
}

//! Resolution of `<path # section>` file references (spec §4.4, §4.5
//! `/path`). The filesystem itself is a host-supplied collaborator, out
//! of scope for this crate — callers inject a [`FileLoader`], the same
//! pattern `just-bash` uses for its `FileSystem` trait.

use async_trait::async_trait;

use crate::errors::MlldResult;
use crate::value::{SecurityDescriptor, Value};

#[async_trait]
pub trait FileLoader: Send + Sync {
    async fn load(&self, path: &str, section: Option<&str>) -> MlldResult<String>;
}

/// A loader that always fails; useful as a default when a host hasn't
/// wired a real filesystem in (e.g. the demo driver).
pub struct NullFileLoader;

#[async_trait]
impl FileLoader for NullFileLoader {
    async fn load(&self, path: &str, _section: Option<&str>) -> MlldResult<String> {
        Err(crate::errors::MlldError::FileNotFound { path: path.to_string() })
    }
}

/// `/output ... to "<path>"` (spec §4.5, §6): the filesystem write side of
/// the same host seam `FileLoader` covers for reads.
#[async_trait]
pub trait FileWriter: Send + Sync {
    async fn write(&self, path: &str, content: &str, append: bool) -> MlldResult<()>;
}

/// A writer that always fails; the demo driver's default until a real
/// filesystem is wired in.
pub struct NullFileWriter;

#[async_trait]
impl FileWriter for NullFileWriter {
    async fn write(&self, path: &str, _content: &str, _append: bool) -> MlldResult<()> {
        Err(crate::errors::MlldError::FileNotFound { path: path.to_string() })
    }
}

pub async fn load_file_reference(
    loader: &dyn FileLoader,
    path: &str,
    section: Option<&str>,
) -> MlldResult<Value> {
    let content = loader.load(path, section).await?;
    let security = SecurityDescriptor::new().with_source(path.to_string());
    Ok(Value::with_security(crate::value::ValueData::Text(content), security))
}

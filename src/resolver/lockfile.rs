//! Lock file format (spec §6 "Lock file & resolver config"): pins each
//! resolved module reference to the fingerprint it resolved to, so
//! re-runs can detect upstream drift.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{MlldError, MlldResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    pub fingerprint: String,
    pub resolver: String,
    pub resolved_at: String,
}

impl LockEntry {
    /// Stamps `resolved_at` with the current time in RFC 3339 form.
    pub fn now(fingerprint: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            resolver: resolver.into(),
            resolved_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `config.resolvers.registries[]` (spec §6.2): an ordered prefix bound to
/// a `registry:`-style resolver's base URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RegistryBinding {
    pub prefix: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolversConfig {
    #[serde(default)]
    pub registries: Vec<RegistryBinding>,
    /// Nested `resolvers.prefixes` (spec §6.2) — maps an additional prefix
    /// to the `name()` of an already-bound resolver.
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockConfig {
    #[serde(default)]
    pub resolvers: ResolversConfig,
}

/// `security.allowedEnv` (spec §6.2, §4.2 `@input`): environment variable
/// names a document is allowed to read through `@input`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default, rename = "allowedEnv")]
    pub allowed_env: Vec<String>,
    /// `security.allowedRoots` (spec §4.5 `/path`): absolute path prefixes
    /// an absolute `/path` binding may resolve under. Empty means
    /// unrestricted.
    #[serde(default, rename = "allowedRoots")]
    pub allowed_roots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub config: LockConfig,
    #[serde(default)]
    pub modules: BTreeMap<String, LockEntry>,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Legacy flat form (spec §6.2): tolerated alongside the nested
    /// `config.resolvers.prefixes`, which wins on a key collision.
    #[serde(default, rename = "resolverPrefixes")]
    pub resolver_prefixes: BTreeMap<String, String>,
}

impl LockFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the legacy flat `resolverPrefixes` with the nested
    /// `config.resolvers.prefixes`, the latter winning on collision (spec
    /// §6.2: "reads `resolvers.prefixes` (nested) and tolerates a legacy
    /// flat `resolverPrefixes`").
    pub fn effective_prefixes(&self) -> BTreeMap<String, String> {
        let mut merged = self.resolver_prefixes.clone();
        merged.extend(self.config.resolvers.prefixes.clone());
        merged
    }

    pub fn parse(toml_text: &str) -> MlldResult<Self> {
        toml::from_str(toml_text).map_err(|e| MlldError::ValidationFailed {
            message: format!("invalid lock file: {e}"),
            location: None,
        })
    }

    pub fn to_toml_string(&self) -> MlldResult<String> {
        toml::to_string_pretty(self).map_err(|e| MlldError::ValidationFailed {
            message: format!("failed to serialize lock file: {e}"),
            location: None,
        })
    }

    pub fn get(&self, reference: &str) -> Option<&LockEntry> {
        self.modules.get(reference)
    }

    pub fn pin(&mut self, reference: impl Into<String>, entry: LockEntry) {
        self.modules.insert(reference.into(), entry);
    }

    /// `true` if `reference` is pinned to a different fingerprint than
    /// `fingerprint` — upstream content has drifted since the lock file
    /// was written.
    pub fn has_drifted(&self, reference: &str, fingerprint: &str) -> bool {
        self.modules
            .get(reference)
            .map(|entry| entry.fingerprint != fingerprint)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let mut lock = LockFile::new();
        lock.pin(
            "registry:acme/tool",
            LockEntry { fingerprint: "abc123".into(), resolver: "registry".into(), resolved_at: "2026-01-01".into() },
        );
        let text = lock.to_toml_string().unwrap();
        let parsed = LockFile::parse(&text).unwrap();
        assert_eq!(parsed.get("registry:acme/tool").unwrap().fingerprint, "abc123");
    }

    #[test]
    fn drift_detected_on_fingerprint_mismatch() {
        let mut lock = LockFile::new();
        lock.pin(
            "local:a",
            LockEntry { fingerprint: "old".into(), resolver: "local".into(), resolved_at: "t".into() },
        );
        assert!(lock.has_drifted("local:a", "new"));
        assert!(!lock.has_drifted("local:a", "old"));
        assert!(!lock.has_drifted("local:unknown", "anything"));
    }

    #[test]
    fn nested_prefixes_win_over_the_legacy_flat_form() {
        let mut lock = LockFile::new();
        lock.resolver_prefixes.insert("acme:".to_string(), "legacy-local".to_string());
        lock.config.resolvers.prefixes.insert("acme:".to_string(), "registry".to_string());
        lock.config.resolvers.prefixes.insert("only-nested:".to_string(), "github".to_string());

        let effective = lock.effective_prefixes();
        assert_eq!(effective.get("acme:").map(String::as_str), Some("registry"));
        assert_eq!(effective.get("only-nested:").map(String::as_str), Some("github"));
    }

    #[test]
    fn registries_and_allowed_env_round_trip_through_toml() {
        let mut lock = LockFile::new();
        lock.config.resolvers.registries.push(RegistryBinding {
            prefix: "acme:".to_string(),
            base_url: "https://modules.acme.example".to_string(),
        });
        lock.security.allowed_env.push("HOME".to_string());
        lock.security.allowed_roots.push("/home/project".to_string());

        let text = lock.to_toml_string().unwrap();
        let parsed = LockFile::parse(&text).unwrap();
        assert_eq!(parsed.config.resolvers.registries[0].prefix, "acme:");
        assert_eq!(parsed.security.allowed_env, vec!["HOME".to_string()]);
        assert_eq!(parsed.security.allowed_roots, vec!["/home/project".to_string()]);
    }
}

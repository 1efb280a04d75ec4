//! Security descriptor carried by every [`super::Value`] (spec §3.1).
//!
//! Labels and sources only ever grow as values flow through the
//! interpolation engine and directive evaluator — merging two descriptors
//! is a set union, never a replacement, so a value can't lose a label by
//! passing through an operation that forgot to propagate it.

use std::collections::BTreeSet;

use crate::errors::{MlldError, MlldResult};

/// Security/provenance metadata attached to a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityDescriptor {
    /// User- or policy-assigned labels (e.g. `secret`, `untrusted`).
    pub labels: BTreeSet<String>,
    /// Provenance trail: file paths, URLs, or directive names a value
    /// passed through.
    pub sources: Vec<String>,
    /// Set once a value has touched an untrusted source (network fetch,
    /// unvalidated exec output) and never cleared.
    pub tainted: bool,
}

impl SecurityDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn tainted(mut self) -> Self {
        self.tainted = true;
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Defensive-read assertion (spec §4.1, alongside `assertStructured`):
    /// fails with `SECURITY_LABEL_REQUIRED` when a caller demands a label
    /// a value does not carry, instead of silently treating it as absent.
    pub fn require_label(&self, label: &str) -> MlldResult<()> {
        if self.has_label(label) {
            Ok(())
        } else {
            Err(MlldError::SecurityLabelRequired { label: label.to_string() })
        }
    }

    /// Union-merge: the invariant every combinator (concat, interpolate,
    /// field access) must preserve.
    pub fn merge(&self, other: &SecurityDescriptor) -> SecurityDescriptor {
        let mut labels = self.labels.clone();
        labels.extend(other.labels.iter().cloned());

        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());

        SecurityDescriptor {
            labels,
            sources,
            tainted: self.tainted || other.tainted,
        }
    }

    pub fn merge_all<'a>(descriptors: impl IntoIterator<Item = &'a SecurityDescriptor>) -> SecurityDescriptor {
        descriptors
            .into_iter()
            .fold(SecurityDescriptor::default(), |acc, d| acc.merge(d))
    }
}

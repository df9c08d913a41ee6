use k8s_openapi::api::{apps::v1::Deployment, core::v1::Pod};
use std::collections::BTreeMap;
use thiserror::Error;

pub type Labels = BTreeMap<String, String>;

/// A decoded workload whose labels are subject to policy.
#[derive(Clone, Debug, PartialEq)]
pub enum Workload {
    Pod(Box<Pod>),
    Deployment(Box<Deployment>),
}

/// Decodes raw object bytes into a [`Workload`].
pub type DecodeFn = fn(&[u8]) -> serde_json::Result<Workload>;

/// The set of kinds the engine knows how to decode.
///
/// Built once at startup and never modified afterwards, so it may be shared
/// freely between concurrent reviews.
#[derive(Clone)]
pub struct Decoders {
    kinds: Vec<(&'static str, DecodeFn)>,
}

#[derive(Debug, Error)]
#[error("failed to decode {kind}: {source}")]
pub struct DecodeError {
    pub kind: String,
    #[source]
    pub source: serde_json::Error,
}

// === impl Workload ===

impl Workload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pod(_) => "Pod",
            Self::Deployment(_) => "Deployment",
        }
    }

    /// Returns the labels that policy applies to.
    ///
    /// Deployments are judged by the labels on their pod template, not their
    /// own metadata.
    pub fn labels(&self) -> Option<&Labels> {
        match self {
            Self::Pod(pod) => pod.metadata.labels.as_ref(),
            Self::Deployment(deploy) => deploy
                .spec
                .as_ref()?
                .template
                .metadata
                .as_ref()?
                .labels
                .as_ref(),
        }
    }
}

fn decode_pod(raw: &[u8]) -> serde_json::Result<Workload> {
    serde_json::from_slice(raw).map(|pod| Workload::Pod(Box::new(pod)))
}

fn decode_deployment(raw: &[u8]) -> serde_json::Result<Workload> {
    serde_json::from_slice(raw).map(|deploy| Workload::Deployment(Box::new(deploy)))
}

// === impl Decoders ===

impl Default for Decoders {
    fn default() -> Self {
        Self::empty()
            .with_kind("Pod", decode_pod)
            .with_kind("Deployment", decode_deployment)
    }
}

impl std::fmt::Debug for Decoders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.kinds.iter().map(|(kind, _)| kind))
            .finish()
    }
}

impl Decoders {
    pub fn empty() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Registers `decode` for `kind`, replacing any existing registration.
    pub fn with_kind(mut self, kind: &'static str, decode: DecodeFn) -> Self {
        self.kinds.retain(|(k, _)| *k != kind);
        self.kinds.push((kind, decode));
        self
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.kinds.iter().any(|(k, _)| *k == kind)
    }

    /// Decodes `raw` as `kind`.
    ///
    /// Returns `Ok(None)` when the kind is not registered. A registered kind
    /// whose bytes do not parse is always an error.
    pub fn decode(&self, kind: &str, raw: &[u8]) -> Result<Option<Workload>, DecodeError> {
        let Some((_, decode)) = self.kinds.iter().find(|(k, _)| *k == kind) else {
            return Ok(None);
        };
        decode(raw).map(Some).map_err(|source| DecodeError {
            kind: kind.to_string(),
            source,
        })
    }
}

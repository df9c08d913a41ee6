use crate::{policy::LabelPolicy, workload::Labels};
use json_patch::{jsonptr::Pointer, AddOperation, Patch, PatchOperation};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use tracing::debug;

/// Marks an object as already processed by the webhook.
pub const MUTATED_ANNOTATION: &str = "mutated";
pub const MUTATED_VALUE: &str = "true";

const LABELS: &str = "/metadata/labels";
const ANNOTATIONS: &str = "/metadata/annotations";

/// Controls which operations a mutation patch contains.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PatchMode {
    /// Only the `mutated` annotation is patched, for every kind.
    ///
    /// The label assignment computed for pods is discarded in favor of the
    /// annotation.
    #[default]
    Compatible,

    /// Pods have their labels replaced with the policy label as well as being
    /// annotated. Other kinds are only annotated.
    PodLabels,
}

/// Only the object's top-level metadata is read, regardless of its kind.
#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    metadata: ObjectMeta,
}

/// Returns true if the object is annotated as already mutated.
pub(crate) fn is_mutated(raw: &[u8]) -> serde_json::Result<bool> {
    let Metadata { metadata } = serde_json::from_slice(raw)?;
    let mutated = metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(MUTATED_ANNOTATION))
        .is_some_and(|v| v == MUTATED_VALUE);
    Ok(mutated)
}

// === impl PatchMode ===

impl PatchMode {
    pub(crate) fn patch(self, kind: &str, policy: &LabelPolicy) -> Patch {
        let annotate = add(
            ANNOTATIONS,
            [(MUTATED_ANNOTATION.to_string(), MUTATED_VALUE.to_string())]
                .into_iter()
                .collect(),
        );

        if kind != "Pod" {
            return Patch(vec![annotate]);
        }

        let label = add(
            LABELS,
            [(policy.key.clone(), policy.value.clone())]
                .into_iter()
                .collect(),
        );
        match self {
            Self::Compatible => {
                debug!(patch = ?label, "Pod label patch superseded by annotation patch");
                Patch(vec![annotate])
            }
            Self::PodLabels => Patch(vec![label, annotate]),
        }
    }
}

impl std::str::FromStr for PatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "compatible" => Ok(Self::Compatible),
            "pod-labels" => Ok(Self::PodLabels),
            s => Err(anyhow::anyhow!("invalid patch mode: {:?}", s)),
        }
    }
}

impl std::fmt::Display for PatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compatible => "compatible".fmt(f),
            Self::PodLabels => "pod-labels".fmt(f),
        }
    }
}

fn add(path: &'static str, value: Labels) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: Pointer::from_static(path).to_buf(),
        value: serde_json::json!(value),
    })
}

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Admission decisions for workloads subject to a label policy.
//!
//! A review is decided in two steps. The workload's labels are first checked
//! against the [`LabelPolicy`]; a violation or an undecodable object denies the
//! review. Otherwise a JSON patch is planned that marks the object as mutated,
//! unless it already is.

mod mutate;
mod policy;
mod request;
mod verdict;
mod workload;

#[cfg(test)]
mod tests;

pub use self::{
    mutate::{PatchMode, MUTATED_ANNOTATION, MUTATED_VALUE},
    policy::{LabelPolicy, Violation},
    request::ReviewRequest,
    verdict::{Response, Verdict},
    workload::{DecodeError, DecodeFn, Decoders, Labels, Workload},
};
pub use json_patch::Patch;

use std::sync::Arc;
use tracing::{debug, info};

/// Decides admission reviews.
///
/// Holds only immutable configuration, so clones share state and may be used
/// concurrently.
#[derive(Clone, Debug, Default)]
pub struct Engine(Arc<Inner>);

#[derive(Debug, Default)]
struct Inner {
    decoders: Decoders,
    policy: LabelPolicy,
    mode: PatchMode,
}

// === impl Engine ===

impl Engine {
    pub fn new(decoders: Decoders, policy: LabelPolicy, mode: PatchMode) -> Self {
        Self(Arc::new(Inner {
            decoders,
            policy,
            mode,
        }))
    }

    pub fn policy(&self) -> &LabelPolicy {
        &self.0.policy
    }

    pub fn patch_mode(&self) -> PatchMode {
        self.0.mode
    }

    /// Decides a review, echoing its UID on the response.
    pub fn review(&self, req: &ReviewRequest) -> Response {
        Response {
            uid: req.uid.clone(),
            verdict: self.evaluate(&req.kind, &req.object),
        }
    }

    /// Checks the object's labels against policy and, if they comply, plans
    /// its mutation.
    ///
    /// Kinds without a registered decoder have no labels to check and are
    /// passed directly to the planner.
    pub fn evaluate(&self, kind: &str, raw: &[u8]) -> Verdict {
        let workload = match self.0.decoders.decode(kind, raw) {
            Ok(workload) => workload,
            Err(error) => {
                info!(%error, %kind, "Could not decode object");
                return Verdict::deny(error);
            }
        };

        let labels = workload.as_ref().and_then(Workload::labels);
        if let Err(violation) = self.0.policy.check(kind, labels) {
            info!(%kind, key = %self.0.policy.key, "Denied");
            return Verdict::deny(violation);
        }

        self.plan(kind, raw)
    }

    /// Plans the patch that marks the object as mutated.
    ///
    /// Objects that are already annotated are allowed without a patch so that
    /// repeated reviews reach a fixed point.
    pub fn plan(&self, kind: &str, raw: &[u8]) -> Verdict {
        match mutate::is_mutated(raw) {
            Ok(true) => {
                debug!(%kind, "Already mutated");
                Verdict::allow()
            }
            Ok(false) => {
                let patch = self.0.mode.patch(kind, &self.0.policy);
                info!(%kind, ?patch, "Patching");
                Verdict::patch(patch)
            }
            Err(source) => {
                let error = DecodeError {
                    kind: kind.to_string(),
                    source,
                };
                info!(%error, %kind, "Could not decode object metadata");
                Verdict::deny(error)
            }
        }
    }
}

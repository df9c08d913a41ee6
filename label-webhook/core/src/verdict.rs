use json_patch::Patch;

/// The engine's decision for a single review.
///
/// A denial never carries a patch.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Allowed { patch: Option<Patch> },
    Denied { reason: String },
}

/// A verdict bound to the review it answers.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub uid: String,
    pub verdict: Verdict,
}

// === impl Verdict ===

impl Verdict {
    pub fn allow() -> Self {
        Self::Allowed { patch: None }
    }

    pub fn patch(patch: Patch) -> Self {
        Self::Allowed { patch: Some(patch) }
    }

    pub fn deny(reason: impl std::fmt::Display) -> Self {
        Self::Denied {
            reason: reason.to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn as_patch(&self) -> Option<&Patch> {
        match self {
            Self::Allowed { patch } => patch.as_ref(),
            Self::Denied { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed { .. } => None,
            Self::Denied { reason } => Some(reason),
        }
    }
}

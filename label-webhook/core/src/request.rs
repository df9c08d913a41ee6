use bytes::Bytes;

/// A single admission review as seen by the engine.
///
/// The object is kept as raw JSON so that decoding happens against the kind the
/// API server declared rather than whatever shape the transport guessed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Echoed back unchanged on the response.
    pub uid: String,

    /// The requested object's kind, e.g. `Pod` or `Deployment`.
    pub kind: String,

    /// The serialized desired state of the object. Empty when the review
    /// carried no object (e.g. deletions).
    pub object: Bytes,
}

// === impl ReviewRequest ===

impl ReviewRequest {
    pub fn new(uid: impl Into<String>, kind: impl Into<String>, object: impl Into<Bytes>) -> Self {
        Self {
            uid: uid.into(),
            kind: kind.into(),
            object: object.into(),
        }
    }
}

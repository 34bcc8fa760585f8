/// A configuration tree was rejected under [`UnknownTypePolicy::Reject`].
///
/// [`UnknownTypePolicy::Reject`]: crate::UnknownTypePolicy::Reject
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{path}: unknown object type {tag:?}")]
    UnknownType { path: String, tag: String },
    #[error("{path}: object has no `type`")]
    MissingType { path: String },
}

/// Loading a configuration from text failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("configuration was rejected")]
    Decode(#[from] DecodeError),
}

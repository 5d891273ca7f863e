#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid cluster id {id:?}: {reason}")]
    InvalidClusterId { id: String, reason: &'static str },

    #[error("malformed listing snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),

    #[error("listing snapshot must be a JSON object, got {0}")]
    UnexpectedSnapshotShape(&'static str),
}

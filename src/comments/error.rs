use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    /// The reply target is not in the sequence, e.g. it was filtered out
    /// upstream. Callers recover locally.
    #[error("Parent comment not found: {0}")]
    ParentNotFound(String),
}

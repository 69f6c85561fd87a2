//! IndexClient port - Interface to the searchable document store.

use async_trait::async_trait;

/// Errors returned by an index write.
///
/// All of them are non-fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The store could not be reached or timed out.
    #[error("Index store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but refused the document.
    #[error("Index store rejected document ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Port for persisting documents.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Store `document` in `collection`.
    async fn index(&self, collection: &str, document: serde_json::Value)
        -> Result<(), IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn IndexClient) {}

    #[test]
    fn rejected_includes_status() {
        let err = IndexError::Rejected {
            status: 400,
            body: "mapper_parsing_exception".to_string(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("mapper_parsing_exception"));
    }
}

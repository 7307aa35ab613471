// ABOUTME: Error taxonomy for list operations surfaced to callers.
// ABOUTME: Covers unknown lists, bad indices, popping empty lists, and ids the journal cannot encode.

use thiserror::Error;

/// Errors that can occur when operating on a named list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("list '{0}' not found")]
    ListNotFound(String),

    #[error("index {index} out of range for list '{list_id}' (size {size})")]
    IndexOutOfRange {
        list_id: String,
        index: i64,
        size: usize,
    },

    #[error("list '{0}' is empty")]
    EmptyList(String),

    #[error("invalid list id '{0}': must be non-empty and contain no whitespace")]
    InvalidListId(String),
}

impl ListError {
    /// Short machine-readable name of the variant, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ListError::ListNotFound(_) => "ListNotFound",
            ListError::IndexOutOfRange { .. } => "IndexOutOfRange",
            ListError::EmptyList(_) => "EmptyList",
            ListError::InvalidListId(_) => "InvalidListId",
        }
    }
}

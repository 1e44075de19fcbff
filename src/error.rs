//! Error types for the trie engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrieError>;

#[derive(Error, Debug)]
pub enum TrieError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Internal consistency failure (e.g. two sibling edges share a first label)
    #[error("Trie invariant violated: {0}")]
    Invariant(String),

    #[error("Operation not allowed in read-only mode")]
    ReadOnly,

    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        line: i32,
        column: i32,
        message: String,
    },
}

impl TrieError {
    pub fn format(msg: impl Into<String>) -> Self {
        TrieError::InvalidFormat(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        TrieError::Invariant(msg.into())
    }

    /// Whether the error only concerns one input file (skip it and continue)
    pub fn is_input_error(&self) -> bool {
        matches!(self, TrieError::Syntax { .. })
    }
}

//! Error types for declaration-file parsing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or parsing declaration files
#[derive(Debug, Error)]
pub enum Error {
    /// Declaration file not found at the specified path
    #[error("declaration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid syntax in a declaration file
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// Line number where the error occurred (1-indexed)
        line: usize,
        /// Description of the syntax error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a syntax error at the given line.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Result type for declaration-file operations
pub type Result<T> = std::result::Result<T, Error>;

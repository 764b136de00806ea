//! Theme engine error types

use thiserror::Error;

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Embedded template is not valid UTF-8
    #[error("Template is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// Template failed to parse or render
    #[error("Template error: {0}")]
    TemplateError(String),

    /// IO error while reading overrides
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

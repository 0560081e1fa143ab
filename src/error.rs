//! Error types for the highlighter

use thiserror::Error;

use crate::document::DocumentError;
use crate::path::PathError;
use crate::platform::PlatformError;
use crate::range::RangeError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighter error type
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Anchor element not found: #{0}")]
    AnchorNotFound(String),

    #[error("Anchor id is not unique: #{0}")]
    AnchorIdNotUnique(String),

    #[error("Malformed highlight data: {0}")]
    MalformedInput(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid {property} value: {value:?}")]
    InvalidStyle {
        property: &'static str,
        value: String,
    },

    #[error("No node at path: {0}")]
    UnresolvedPath(String),

    #[error("Nothing is selected")]
    EmptySelection,

    #[error("Selection is outside the highlight anchor")]
    OutsideAnchor,

    #[error("Highlighter has been destroyed")]
    Destroyed,

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

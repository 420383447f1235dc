use thiserror::Error;

use crate::models::DocumentStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    /// No response was obtained from the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response was obtained but signals failure or has an unexpected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Input rejected locally before any request was issued.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A response arrived for a request that is no longer the current one.
    #[error("Stale response discarded: {0}")]
    StaleResponse(String),

    #[error("Document already registered: {0}")]
    DuplicateDocument(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid status transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("A chat message is still awaiting its answer")]
    ChatBusy,

    #[error("No document selected")]
    NoDocumentSelected,

    #[error(
        "PDF unavailable: primary {primary} failed ({primary_error}); fallback {fallback} failed ({fallback_error})"
    )]
    PdfUnavailable {
        primary: String,
        primary_error: String,
        fallback: String,
        fallback_error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkspaceError {
    pub fn is_stale(&self) -> bool {
        matches!(self, WorkspaceError::StaleResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

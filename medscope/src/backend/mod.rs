//! The seam between the workspace and the remote retrieval/LLM service.
//!
//! The workspace only ever talks to a [`Backend`]; [`HttpBackend`] is the
//! production implementation. Every method reports failures as
//! [`WorkspaceError::Transport`](crate::WorkspaceError::Transport) when no
//! response was obtained and
//! [`WorkspaceError::Protocol`](crate::WorkspaceError::Protocol) when the
//! response signals failure or has the wrong shape.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    audience::Audience,
    error::Result,
    models::{
        DocumentInfo, Evidence, HealthStatus, RelatedDocument, SimilarityResults, SynthesisKind,
    },
    panel::{EvidenceRequest, ExplanationRequest},
};

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub mod wire;

#[cfg(feature = "http")]
pub use http::HttpBackend;

/// Raw bytes fetched from a document location plus the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPayload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An answer as the backend sent it. Citations keep their raw shape; the
/// chat session normalizes them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReply {
    pub text: String,
    pub citations: Vec<Value>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Uploads a PDF and returns the id the backend assigned to it.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;

    async fn delete(&self, filename: &str) -> Result<()>;

    async fn document_info(&self, filename: &str) -> Result<DocumentInfo>;

    /// Returns the summary text.
    async fn summarize(&self, filename: &str, audience: Audience) -> Result<String>;

    /// Returns the explanation text.
    async fn explain_text(&self, request: &ExplanationRequest) -> Result<String>;

    async fn source_evidence(&self, request: &EvidenceRequest) -> Result<Evidence>;

    async fn query_document(&self, question: &str, document_id: &str) -> Result<QueryReply>;

    async fn query_documents(&self, query: &str, filenames: &[String]) -> Result<QueryReply>;

    async fn related_documents(&self, filename: &str) -> Result<Vec<RelatedDocument>>;

    /// Returns the synthesis text for `filenames`.
    async fn synthesize_topic(&self, filenames: &[String], kind: SynthesisKind) -> Result<String>;

    async fn search_similar(&self, query: &str, limit: usize) -> Result<SimilarityResults>;

    async fn health(&self) -> Result<HealthStatus>;

    /// GETs an absolute document location.
    async fn fetch_binary(&self, location: &str) -> Result<BinaryPayload>;
}

//! Request and response bodies exchanged with the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{DocumentInfo, Evidence, RelatedDocument, SourceChunk};

#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub filename: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SummarizeRequest<'a> {
    pub filename: &'a str,
    pub audience_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ExplainTextRequest<'a> {
    pub filename: &'a str,
    pub selected_text: &'a str,
    pub context: &'a str,
    pub question: &'a str,
    pub audience_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SourceEvidenceRequest<'a> {
    pub filename: &'a str,
    pub sentence: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QueryDocRequest<'a> {
    pub question: &'a str,
    pub document_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    pub filenames: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct SynthesizeRequest<'a> {
    pub filenames: &'a [String],
    pub synthesis_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SimilaritySearchRequest<'a> {
    pub query: &'a str,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentInfoResponse {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl From<DocumentInfoResponse> for DocumentInfo {
    fn from(response: DocumentInfoResponse) -> Self {
        DocumentInfo {
            page_count: response.metadata.page_count.unwrap_or(0),
            sections: response.sections,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireChunk {
    pub content: String,
    pub similarity: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct SourceEvidenceResponse {
    pub source_chunks: Vec<WireChunk>,
    pub confidence: f64,
}

impl From<SourceEvidenceResponse> for Evidence {
    fn from(response: SourceEvidenceResponse) -> Self {
        let chunks = response
            .source_chunks
            .into_iter()
            .map(|chunk| SourceChunk {
                page: chunk
                    .metadata
                    .get("page")
                    .and_then(Value::as_u64)
                    .and_then(|page| u32::try_from(page).ok()),
                content: chunk.content,
                similarity: chunk.similarity,
            })
            .collect();

        Evidence {
            chunks,
            confidence: response.confidence,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryDocResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub message: String,
    #[serde(default)]
    pub sources: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedResponse {
    #[serde(default)]
    pub related: Vec<RelatedDocument>,
}

/// The synthesis text travels under one of a few keys depending on the
/// backend revision.
#[derive(Debug, Deserialize)]
pub struct SynthesizeResponse {
    #[serde(alias = "result", alias = "summary")]
    pub synthesis: String,
}

/// Error body of a non-success response. `detail` is usually a string but
/// validation failures carry a list of objects.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkspaceError;

use crate::registry::{UploadDate, display_name, upload_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Ready,
    Summarizing,
    Summarized,
    Failed,
}

impl DocumentStatus {
    /// Summarizing is only ever entered through an explicit request; the
    /// terminal states never move on their own.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Ready, Summarizing)
                | (Summarizing, Summarized)
                | (Summarizing, Failed)
                | (Summarized, Summarizing)
                | (Failed, Summarizing)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub status: DocumentStatus,
    pub summary: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DocumentStatus::Ready,
            summary: None,
        }
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.id)
    }

    pub fn upload_date(&self) -> UploadDate {
        upload_date(&self.id)
    }
}

/// A named section and the page it most likely starts on.
///
/// The page is spread evenly from the section's ordinal, it is not read from
/// the PDF and can be off by several pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub approximate_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub page_count: u32,
    pub sections: Vec<Section>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.page_count == 0 && self.sections.is_empty()
    }
}

/// A span of displayed text the user selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub selected_text: String,
    pub surrounding_context: String,
    pub question: Option<String>,
}

impl Highlight {
    pub fn new(selected_text: impl Into<String>, surrounding_context: impl Into<String>) -> Self {
        Self {
            selected_text: selected_text.into(),
            surrounding_context: surrounding_context.into(),
            question: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub content: String,
    pub similarity: f64,
    pub page: Option<u32>,
}

/// Source passages for a sentence plus the aggregate confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub chunks: Vec<SourceChunk>,
    pub confidence: f64,
}

/// Page count and raw section names as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub label: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            citations: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            citations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
    pub similarity_score: f64,
    #[serde(default)]
    pub common_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPaper {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub similarity_score: f64,
    pub rank: u32,
    pub arxiv_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResults {
    pub papers: Vec<SimilarPaper>,
    pub total_found: usize,
    pub search_time_ms: f64,
}

/// The angle a cross-paper synthesis is written from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisKind {
    #[default]
    Comparison,
    Evolution,
    Consensus,
    Methods,
}

impl SynthesisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisKind::Comparison => "comparison",
            SynthesisKind::Evolution => "evolution",
            SynthesisKind::Consensus => "consensus",
            SynthesisKind::Methods => "methods",
        }
    }
}

impl fmt::Display for SynthesisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SynthesisKind {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comparison" => Ok(SynthesisKind::Comparison),
            "evolution" => Ok(SynthesisKind::Evolution),
            "consensus" => Ok(SynthesisKind::Consensus),
            "methods" => Ok(SynthesisKind::Methods),
            other => Err(WorkspaceError::Validation(format!(
                "unknown synthesis type '{}', expected comparison, evolution, consensus or methods",
                other
            ))),
        }
    }
}

/// Findings synthesized across several documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub kind: SynthesisKind,
    pub filenames: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub faiss_ready: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok") || self.status.eq_ignore_ascii_case("healthy")
    }
}

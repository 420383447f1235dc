pub mod audience;
pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod panel;
pub mod pdf;
pub mod registry;
pub mod selection;
pub mod workspace;

// Re-export commonly used types
pub use audience::Audience;
pub use backend::{Backend, BinaryPayload, QueryReply};
#[cfg(feature = "http")]
pub use backend::HttpBackend;
pub use chat::{ChatSession, QueryRoute, normalize_citations, route_query};
pub use config::WorkspaceConfig;
pub use error::{Result, WorkspaceError};
pub use models::{
    ChatMessage, Citation, Document, DocumentInfo, DocumentStatus, Evidence, HealthStatus,
    Highlight, Outline, RelatedDocument, Section, Sender, SimilarPaper, SimilarityResults,
    SourceChunk, Synthesis, SynthesisKind,
};
pub use panel::{KnowledgePanel, PanelKind, PanelState, RequestKey};
pub use pdf::{LoadState, LocationKind, PdfLocations, PdfViewer, RenderEvent, ResolvedPdf};
pub use registry::{DocumentRegistry, UploadDate, display_name, upload_date};
pub use selection::{Selection, SelectionChange};
pub use workspace::{Workspace, WorkspaceState};

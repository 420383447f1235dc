#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use medscope::{
    Audience, Backend, BinaryPayload, DocumentInfo, Evidence, HealthStatus, QueryReply,
    RelatedDocument, Result, SimilarityResults, SynthesisKind, Workspace, WorkspaceConfig,
    WorkspaceError,
    panel::{EvidenceRequest, ExplanationRequest},
};

pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n";

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(String),
    Delete(String),
    DocumentInfo(String),
    Summarize(String, Audience),
    Explain(String, String, Audience),
    Evidence(String, String),
    QueryDocument(String, String),
    QueryDocuments(String, Vec<String>),
    Related(String),
    Synthesize(Vec<String>, SynthesisKind),
    Search(String, usize),
    Health,
    Fetch(String),
}

/// Scripted [`Backend`]: every answer is set up front and every call is
/// recorded in order.
pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    pub delete_result: Mutex<Result<()>>,
    pub info: Mutex<Result<DocumentInfo>>,
    pub summary: Mutex<Result<String>>,
    pub explanation: Mutex<Result<String>>,
    pub evidence: Mutex<Result<Evidence>>,
    pub reply: Mutex<Result<QueryReply>>,
    pub related: Mutex<Vec<RelatedDocument>>,
    pub binaries: Mutex<HashMap<String, Result<BinaryPayload>>>,
    pub synthesis: Mutex<Result<String>>,
    /// When set, `explain_text` blocks until a permit is added.
    pub explain_gate: Option<Arc<Semaphore>>,
    pub explain_started: Notify,
    /// Blocks `summarize`, `query_document` and `query_documents`.
    pub answer_gate: Option<Arc<Semaphore>>,
    /// Blocks `fetch_binary` and `document_info`.
    pub fetch_gate: Option<Arc<Semaphore>>,
    pub fetch_started: Notify,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delete_result: Mutex::new(Ok(())),
            info: Mutex::new(Ok(DocumentInfo::default())),
            summary: Mutex::new(Ok("A short summary.".to_string())),
            explanation: Mutex::new(Ok("An explanation.".to_string())),
            evidence: Mutex::new(Ok(Evidence {
                chunks: Vec::new(),
                confidence: 0.0,
            })),
            reply: Mutex::new(Ok(QueryReply {
                text: "An answer.".to_string(),
                citations: Vec::new(),
            })),
            related: Mutex::new(Vec::new()),
            binaries: Mutex::new(HashMap::new()),
            synthesis: Mutex::new(Ok("The papers agree on the primary outcome.".to_string())),
            explain_gate: None,
            explain_started: Notify::new(),
            answer_gate: None,
            fetch_gate: None,
            fetch_started: Notify::new(),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_explain_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            explain_gate: Some(gate),
            ..Self::default()
        }
    }

    /// Summaries and chat answers never arrive.
    pub fn with_stalled_answers() -> Self {
        Self {
            answer_gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn with_fetch_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            fetch_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Fetch(location) => Some(location),
                _ => None,
            })
            .collect()
    }

    pub fn serve(&self, location: &str, payload: Result<BinaryPayload>) {
        self.binaries
            .lock()
            .unwrap()
            .insert(location.to_string(), payload);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait(gate: &Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

pub fn pdf_payload() -> BinaryPayload {
    BinaryPayload {
        content_type: Some("application/pdf".to_string()),
        bytes: PDF_BYTES.to_vec(),
    }
}

pub fn html_payload() -> BinaryPayload {
    BinaryPayload {
        content_type: Some("text/html; charset=utf-8".to_string()),
        bytes: b"<!doctype html><html><body>app</body></html>".to_vec(),
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<String> {
        self.record(Call::Upload(file_name.to_string()));
        Ok(format!("20240131_120000_{}", file_name))
    }

    async fn delete(&self, filename: &str) -> Result<()> {
        self.record(Call::Delete(filename.to_string()));
        self.delete_result.lock().unwrap().clone()
    }

    async fn document_info(&self, filename: &str) -> Result<DocumentInfo> {
        self.record(Call::DocumentInfo(filename.to_string()));
        self.fetch_started.notify_one();
        Self::wait(&self.fetch_gate).await;
        self.info.lock().unwrap().clone()
    }

    async fn summarize(&self, filename: &str, audience: Audience) -> Result<String> {
        self.record(Call::Summarize(filename.to_string(), audience));
        Self::wait(&self.answer_gate).await;
        self.summary.lock().unwrap().clone()
    }

    async fn explain_text(&self, request: &ExplanationRequest) -> Result<String> {
        self.record(Call::Explain(
            request.selected_text.clone(),
            request.question.clone(),
            request.audience,
        ));
        self.explain_started.notify_one();
        Self::wait(&self.explain_gate).await;
        self.explanation.lock().unwrap().clone()
    }

    async fn source_evidence(&self, request: &EvidenceRequest) -> Result<Evidence> {
        self.record(Call::Evidence(
            request.filename.clone(),
            request.sentence.clone(),
        ));
        self.evidence.lock().unwrap().clone()
    }

    async fn query_document(&self, question: &str, document_id: &str) -> Result<QueryReply> {
        self.record(Call::QueryDocument(
            question.to_string(),
            document_id.to_string(),
        ));
        Self::wait(&self.answer_gate).await;
        self.reply.lock().unwrap().clone()
    }

    async fn query_documents(&self, query: &str, filenames: &[String]) -> Result<QueryReply> {
        self.record(Call::QueryDocuments(query.to_string(), filenames.to_vec()));
        Self::wait(&self.answer_gate).await;
        self.reply.lock().unwrap().clone()
    }

    async fn related_documents(&self, filename: &str) -> Result<Vec<RelatedDocument>> {
        self.record(Call::Related(filename.to_string()));
        Ok(self.related.lock().unwrap().clone())
    }

    async fn synthesize_topic(&self, filenames: &[String], kind: SynthesisKind) -> Result<String> {
        self.record(Call::Synthesize(filenames.to_vec(), kind));
        self.synthesis.lock().unwrap().clone()
    }

    async fn search_similar(&self, query: &str, limit: usize) -> Result<SimilarityResults> {
        self.record(Call::Search(query.to_string(), limit));
        Ok(SimilarityResults {
            papers: Vec::new(),
            total_found: 0,
            search_time_ms: 1.5,
        })
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.record(Call::Health);
        Ok(HealthStatus {
            status: "ok".to_string(),
            faiss_ready: Some(true),
            message: None,
        })
    }

    async fn fetch_binary(&self, location: &str) -> Result<BinaryPayload> {
        self.record(Call::Fetch(location.to_string()));
        self.fetch_started.notify_one();
        Self::wait(&self.fetch_gate).await;
        self.binaries
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .unwrap_or_else(|| Err(WorkspaceError::Protocol(format!("404 Not Found: {}", location))))
    }
}

pub fn config() -> WorkspaceConfig {
    WorkspaceConfig {
        api_base_url: "http://api.test".to_string(),
        ..WorkspaceConfig::default()
    }
}

pub fn workspace(backend: &Arc<MockBackend>) -> Workspace {
    Workspace::new(backend.clone(), config())
}

/// A workspace with `names` uploaded, returning their assigned ids.
pub async fn workspace_with(backend: &Arc<MockBackend>, names: &[&str]) -> (Workspace, Vec<String>) {
    let workspace = workspace(backend);
    let mut ids = Vec::new();
    for name in names {
        ids.push(workspace.upload(name, PDF_BYTES.to_vec()).await.unwrap());
    }
    (workspace, ids)
}

//! The controller that owns all session state.
//!
//! [`Workspace`] is the single writer of the registry, selection, viewer,
//! panel and chat. Every async operation follows the same shape: lock and
//! validate, unlock, await the backend, lock again and apply the result only
//! if the identity it was issued under (focus generation, panel key, chat
//! ticket, document id) is still current. The lock is never held across an
//! `.await`.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    audience::Audience,
    backend::Backend,
    chat::{ChatSession, PendingQuery, QueryRoute},
    config::WorkspaceConfig,
    error::{Result, WorkspaceError},
    models::{
        DocumentStatus, Highlight, HealthStatus, RelatedDocument, SimilarityResults, Synthesis,
        SynthesisKind,
    },
    panel::{KnowledgePanel, PanelKind},
    pdf::{self, PdfLocations, PdfViewer, RenderEvent, ResolvedPdf},
    registry::DocumentRegistry,
    selection::{Selection, SelectionChange},
};

/// Everything a front end renders. [`Workspace::snapshot`] hands out
/// consistent copies of it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceState {
    pub registry: DocumentRegistry,
    pub selection: Selection,
    pub viewer: PdfViewer,
    pub panel: KnowledgePanel,
    pub chat: ChatSession,
    pub audience: Audience,
    focus_generation: u64,
}

impl WorkspaceState {
    /// Bumped on every selection change.
    pub fn focus_generation(&self) -> u64 {
        self.focus_generation
    }

    fn focus_changed(&mut self, document_id: Option<String>) {
        self.focus_generation += 1;
        self.panel.reset();
        self.viewer.reset_for(document_id);
    }

    fn focused_document(&self) -> Result<String> {
        self.selection
            .current()
            .map(str::to_string)
            .ok_or(WorkspaceError::NoDocumentSelected)
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    config: WorkspaceConfig,
    state: Mutex<WorkspaceState>,
}

/// Cheaply cloneable handle to one workspace session.
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<Inner>,
}

/// Results that lost their identity are dropped quietly.
fn discard_stale(result: Result<()>) {
    if let Err(e) = result {
        debug!("{}", e);
    }
}

/// Closes a chat send whose future is dropped before its answer was applied.
struct ChatSendGuard<'a> {
    workspace: &'a Workspace,
    ticket: Uuid,
}

impl Drop for ChatSendGuard<'_> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.workspace.with_state(|state| {
            state.chat.abandon(ticket);
        });
    }
}

/// Marks the document Failed if a summarize future is dropped mid-request,
/// so an explicit retry stays possible.
struct SummaryGuard<'a> {
    workspace: &'a Workspace,
    id: &'a str,
}

impl Drop for SummaryGuard<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.workspace.with_state(|state| {
            let status = state.registry.get(id).map(|document| document.status);
            if status != Some(DocumentStatus::Summarizing) {
                return;
            }
            warn!("Summary request for {} abandoned", id);
            if let Err(e) = state.registry.set_status(id, DocumentStatus::Failed) {
                warn!("{}", e);
            }
        });
    }
}

impl Workspace {
    pub fn new(backend: Arc<dyn Backend>, config: WorkspaceConfig) -> Self {
        let state = WorkspaceState {
            audience: config.audience,
            ..WorkspaceState::default()
        };
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// A workspace talking to the HTTP backend at `config.api_base_url`.
    #[cfg(feature = "http")]
    pub fn connect(config: WorkspaceConfig) -> Result<Self> {
        let backend = crate::backend::HttpBackend::new(&config)?;
        info!("Workspace connected to {}", config.api_base_url);
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.inner.config
    }

    fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WorkspaceState) -> R) -> R {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn snapshot(&self) -> WorkspaceState {
        self.with_state(|state| state.clone())
    }

    // ---- documents ----

    /// Uploads a PDF and registers the id the backend assigned to it.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(WorkspaceError::Validation(format!(
                "{} is not a .pdf file",
                file_name
            )));
        }
        if bytes.is_empty() {
            return Err(WorkspaceError::Validation(format!("{} is empty", file_name)));
        }
        if !pdf::sniffs_as_pdf(&bytes) {
            return Err(WorkspaceError::Validation(format!(
                "{} does not look like a PDF",
                file_name
            )));
        }

        let id = self.backend().upload(file_name, bytes).await?;
        self.with_state(|state| match state.registry.register(id.as_str()) {
            Ok(()) => info!("Registered {}", id),
            // the backend overwrote an existing upload; keep its entry
            Err(WorkspaceError::DuplicateDocument(_)) => info!("Re-uploaded {}", id),
            Err(e) => warn!("Could not register {}: {}", id, e),
        });
        Ok(id)
    }

    /// Deletes remotely first. Local state changes only after the backend
    /// confirmed the deletion.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.with_state(|state| {
            if state.registry.contains(id) {
                Ok(())
            } else {
                Err(WorkspaceError::DocumentNotFound(id.to_string()))
            }
        })?;

        if let Err(e) = self.backend().delete(id).await {
            error!("Deleting {} failed: {}", id, e);
            return Err(e);
        }

        self.with_state(|state| {
            state.registry.remove(id)?;
            if state.selection.remove(id) {
                state.focus_changed(None);
            }
            info!("Deleted {}", id);
            Ok(())
        })
    }

    pub fn select(&self, id: &str) -> Result<SelectionChange> {
        self.with_state(|state| {
            if !state.registry.contains(id) {
                return Err(WorkspaceError::DocumentNotFound(id.to_string()));
            }
            let change = state.selection.select(id);
            match &change {
                SelectionChange::Focused(id) => state.focus_changed(Some(id.clone())),
                SelectionChange::Cleared => state.focus_changed(None),
            }
            Ok(change)
        })
    }

    // ---- viewer ----

    /// Resolves the focused document's PDF and fetches its outline
    /// concurrently. Each result is applied as soon as it arrives, unless the
    /// focus moved on in the meantime, in which case `Ok(None)` is returned.
    pub async fn open_selected(&self) -> Result<Option<ResolvedPdf>> {
        let (id, generation, attempt, locations) = self.with_state(|state| {
            let id = state.focused_document()?;
            let attempt = state.viewer.begin_resolving();
            let locations = PdfLocations::for_document(&self.inner.config, &id);
            Ok::<_, WorkspaceError>((id, state.focus_generation, attempt, locations))
        })?;

        let backend = self.backend();
        let (resolution, ()) = tokio::join!(
            async {
                let resolution = pdf::resolve_pdf(backend, &locations).await;
                self.apply_resolution(generation, attempt, resolution)
            },
            async {
                let outline = pdf::fetch_outline(backend, &id).await;
                self.with_state(|state| {
                    if state.focus_generation == generation {
                        state.viewer.set_outline(outline);
                    } else {
                        debug!("Dropping outline for {} after focus change", id);
                    }
                });
            },
        );
        resolution
    }

    /// A resolution from an earlier focus or a superseded open is dropped
    /// and reported as `Ok(None)`.
    fn apply_resolution(
        &self,
        generation: u64,
        attempt: u64,
        resolution: Result<ResolvedPdf>,
    ) -> Result<Option<ResolvedPdf>> {
        self.with_state(|state| {
            if state.focus_generation != generation {
                debug!("Dropping PDF resolution from focus generation {}", generation);
                return Ok(None);
            }
            match resolution {
                Ok(resolved) => match state.viewer.mark_resolved(attempt, resolved.clone()) {
                    Ok(()) => Ok(Some(resolved)),
                    Err(stale) => {
                        debug!("{}", stale);
                        Ok(None)
                    }
                },
                Err(e) => match state.viewer.mark_unavailable(attempt, e.to_string()) {
                    Ok(()) => Err(e),
                    Err(stale) => {
                        debug!("{}", stale);
                        Ok(None)
                    }
                },
            }
        })
    }

    pub fn render_event(&self, event: RenderEvent) {
        self.with_state(|state| state.viewer.apply_render_event(event));
    }

    pub fn next_page(&self) -> u32 {
        self.with_state(|state| state.viewer.next_page())
    }

    pub fn previous_page(&self) -> u32 {
        self.with_state(|state| state.viewer.previous_page())
    }

    pub fn go_to_page(&self, page: u32) -> u32 {
        self.with_state(|state| state.viewer.go_to_page(page))
    }

    pub fn zoom_in(&self) -> f64 {
        self.with_state(|state| state.viewer.zoom_in())
    }

    pub fn zoom_out(&self) -> f64 {
        self.with_state(|state| state.viewer.zoom_out())
    }

    // ---- summaries ----

    /// Summarizes `id` for the audience current at call time.
    ///
    /// A failure is recorded as [`DocumentStatus::Failed`] and returned. A
    /// result for a document deleted meanwhile is dropped.
    pub async fn summarize(&self, id: &str) -> Result<()> {
        let audience = self.with_state(|state| {
            state.registry.set_status(id, DocumentStatus::Summarizing)?;
            Ok::<_, WorkspaceError>(state.audience)
        })?;
        info!("Summarizing {} for {}", id, audience);

        let _abandoned = SummaryGuard { workspace: self, id };
        let result = self.backend().summarize(id, audience).await;

        self.with_state(|state| {
            if !state.registry.contains(id) {
                debug!("Dropping summary for removed document {}", id);
                return Ok(());
            }
            match result {
                Ok(summary) => state.registry.record_summary(id, summary),
                Err(e) => {
                    error!("Summarizing {} failed: {}", id, e);
                    state.registry.set_status(id, DocumentStatus::Failed)?;
                    Err(e)
                }
            }
        })
    }

    // ---- knowledge panel ----

    /// Explains a highlighted span of the focused document. Backend failures
    /// land in the panel, not in the returned result.
    pub async fn explain(&self, highlight: Highlight, question: &str) -> Result<()> {
        let question = question.trim();
        if highlight.selected_text.trim().is_empty() {
            return Err(WorkspaceError::Validation("no text highlighted".to_string()));
        }
        if question.is_empty() {
            return Err(WorkspaceError::Validation("question is empty".to_string()));
        }

        let request = self.with_state(|state| {
            let id = state.focused_document()?;
            let audience = state.audience;
            Ok::<_, WorkspaceError>(state.panel.open_explanation(&id, highlight, question, audience))
        })?;
        debug!("Explanation request {} for {}", request.key, request.filename);

        let result = self.backend().explain_text(&request).await;

        self.with_state(|state| {
            discard_stale(match result {
                Ok(answer) => state.panel.apply_explanation(&request, answer),
                Err(e) => {
                    warn!("Explanation request {} failed: {}", request.key, e);
                    state
                        .panel
                        .apply_failure(PanelKind::Explanation, request.key, e.to_string())
                }
            })
        });
        Ok(())
    }

    /// Looks up the source passages behind a highlighted sentence.
    pub async fn source_evidence(&self, highlight: Highlight) -> Result<()> {
        if highlight.selected_text.trim().is_empty() {
            return Err(WorkspaceError::Validation("no text highlighted".to_string()));
        }

        let request = self.with_state(|state| {
            let id = state.focused_document()?;
            Ok::<_, WorkspaceError>(state.panel.open_evidence(&id, highlight))
        })?;
        debug!("Evidence request {} for {}", request.key, request.filename);

        let result = self.backend().source_evidence(&request).await;

        self.with_state(|state| {
            discard_stale(match result {
                Ok(evidence) => state.panel.apply_evidence(request.key, evidence),
                Err(e) => {
                    warn!("Evidence request {} failed: {}", request.key, e);
                    state
                        .panel
                        .apply_failure(PanelKind::Evidence, request.key, e.to_string())
                }
            })
        });
        Ok(())
    }

    pub fn close_panel(&self) {
        self.with_state(|state| state.panel.reset());
    }

    // ---- chat ----

    /// Asks about the focused document.
    pub async fn send_chat(&self, text: &str) -> Result<()> {
        let pending = self.with_state(|state| {
            let scope = state.selection.selection().to_vec();
            state.chat.begin_send(text, &scope)
        })?;
        self.finish_chat(pending).await;
        Ok(())
    }

    /// Asks across an explicit set of documents. Every id must be registered.
    pub async fn send_chat_across(&self, ids: &[String], text: &str) -> Result<()> {
        let pending = self.with_state(|state| {
            let mut scope: Vec<String> = Vec::with_capacity(ids.len());
            for id in ids {
                if !state.registry.contains(id) {
                    return Err(WorkspaceError::DocumentNotFound(id.clone()));
                }
                if !scope.contains(id) {
                    scope.push(id.clone());
                }
            }
            state.chat.begin_send(text, &scope)
        })?;
        self.finish_chat(pending).await;
        Ok(())
    }

    async fn finish_chat(&self, pending: PendingQuery) {
        let _abandoned = ChatSendGuard {
            workspace: self,
            ticket: pending.ticket,
        };
        let reply = match &pending.route {
            QueryRoute::SingleDocument {
                question,
                document_id,
            } => self.backend().query_document(question, document_id).await,
            QueryRoute::MultiDocument { query, filenames } => {
                self.backend().query_documents(query, filenames).await
            }
        };
        self.with_state(|state| discard_stale(state.chat.complete(pending.ticket, reply)));
    }

    // ---- discovery ----

    pub async fn related_documents(&self, id: &str) -> Result<Vec<RelatedDocument>> {
        self.with_state(|state| {
            if state.registry.contains(id) {
                Ok(())
            } else {
                Err(WorkspaceError::DocumentNotFound(id.to_string()))
            }
        })?;
        self.backend().related_documents(id).await
    }

    /// Synthesizes findings across `ids`. Every id must be registered;
    /// duplicates are sent once.
    pub async fn synthesize(&self, ids: &[String], kind: SynthesisKind) -> Result<Synthesis> {
        let filenames = self.with_state(|state| {
            let mut filenames: Vec<String> = Vec::with_capacity(ids.len());
            for id in ids {
                if !state.registry.contains(id) {
                    return Err(WorkspaceError::Validation(format!(
                        "{} is not a registered document",
                        id
                    )));
                }
                if !filenames.contains(id) {
                    filenames.push(id.clone());
                }
            }
            if filenames.is_empty() {
                return Err(WorkspaceError::Validation(
                    "no documents to synthesize".to_string(),
                ));
            }
            Ok(filenames)
        })?;
        info!("Synthesizing {} documents as {}", filenames.len(), kind);

        let text = self.backend().synthesize_topic(&filenames, kind).await?;
        Ok(Synthesis {
            kind,
            filenames,
            text,
        })
    }

    /// Similarity search over the external paper corpus. `limit` defaults to
    /// the configured search limit.
    pub async fn search_similar(&self, query: &str, limit: Option<usize>) -> Result<SimilarityResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkspaceError::Validation("search query is empty".to_string()));
        }
        let limit = limit.unwrap_or(self.inner.config.search_limit).max(1);
        let results = self.backend().search_similar(query, limit).await?;
        info!(
            "Found {} similar papers in {:.0}ms",
            results.total_found, results.search_time_ms
        );
        Ok(results)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.backend().health().await
    }

    // ---- audience ----

    /// Applies to requests issued from now on.
    pub fn set_audience(&self, audience: Audience) {
        self.with_state(|state| state.audience = audience);
    }

    pub fn audience(&self) -> Audience {
        self.with_state(|state| state.audience)
    }
}

//! Turning a document id into something the external renderer can display.
//!
//! Resolution probes at most two locations: the primary `/files/...` route
//! and, only if that fails, the static `/uploads/...` mount. The outline is
//! fetched separately and is best effort. [`PdfViewer`] holds the navigation
//! state the renderer is driven with and absorbs its load events.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::{
    backend::{Backend, BinaryPayload},
    config::WorkspaceConfig,
    error::{Result, WorkspaceError},
    models::{DocumentInfo, Outline, Section},
};

pub const PDF_MIME: &str = "application/pdf";
pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;
pub const ZOOM_STEP: f64 = 0.2;
pub const DEFAULT_ZOOM: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfLocations {
    pub primary: String,
    pub fallback: String,
}

impl PdfLocations {
    pub fn for_document(config: &WorkspaceConfig, id: &str) -> Self {
        let filename = urlencoding::encode(id);
        let location = |prefix: &str| {
            config.api_url(&format!("{}/{}", prefix.trim_end_matches('/'), filename))
        };
        Self {
            primary: location(&config.primary_pdf_prefix),
            fallback: location(&config.fallback_pdf_prefix),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationKind {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeAttempt {
    pub kind: LocationKind,
    pub location: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPdf {
    pub location: String,
    pub kind: LocationKind,
    pub attempts: Vec<ProbeAttempt>,
}

/// True if the payload is a PDF by declared media type or by magic bytes.
pub fn is_pdf_payload(payload: &BinaryPayload) -> bool {
    if payload.bytes.is_empty() {
        return false;
    }
    let declared = payload
        .content_type
        .as_deref()
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(PDF_MIME));

    declared || sniffs_as_pdf(&payload.bytes)
}

pub fn sniffs_as_pdf(bytes: &[u8]) -> bool {
    infer::get(bytes).is_some_and(|kind| kind.mime_type() == PDF_MIME)
}

async fn probe(backend: &dyn Backend, location: &str) -> Result<()> {
    let payload = backend.fetch_binary(location).await?;
    if is_pdf_payload(&payload) {
        Ok(())
    } else {
        Err(WorkspaceError::Protocol(format!(
            "expected {}, got {}",
            PDF_MIME,
            payload.content_type.as_deref().unwrap_or("an unknown media type")
        )))
    }
}

/// Bounded two-attempt probing: primary, then fallback once, then give up.
pub async fn resolve_pdf(backend: &dyn Backend, locations: &PdfLocations) -> Result<ResolvedPdf> {
    let mut attempts = Vec::with_capacity(2);

    let primary_error = match probe(backend, &locations.primary).await {
        Ok(()) => {
            info!("PDF resolved at primary location {}", locations.primary);
            attempts.push(ProbeAttempt {
                kind: LocationKind::Primary,
                location: locations.primary.clone(),
                error: None,
            });
            return Ok(ResolvedPdf {
                location: locations.primary.clone(),
                kind: LocationKind::Primary,
                attempts,
            });
        }
        Err(e) => e.to_string(),
    };

    warn!(
        "Primary PDF location {} failed ({}), trying {}",
        locations.primary, primary_error, locations.fallback
    );
    attempts.push(ProbeAttempt {
        kind: LocationKind::Primary,
        location: locations.primary.clone(),
        error: Some(primary_error.clone()),
    });

    match probe(backend, &locations.fallback).await {
        Ok(()) => {
            info!("PDF resolved at fallback location {}", locations.fallback);
            attempts.push(ProbeAttempt {
                kind: LocationKind::Fallback,
                location: locations.fallback.clone(),
                error: None,
            });
            Ok(ResolvedPdf {
                location: locations.fallback.clone(),
                kind: LocationKind::Fallback,
                attempts,
            })
        }
        Err(e) => {
            error!("Fallback PDF location {} failed: {}", locations.fallback, e);
            Err(WorkspaceError::PdfUnavailable {
                primary: locations.primary.clone(),
                primary_error,
                fallback: locations.fallback.clone(),
                fallback_error: e.to_string(),
            })
        }
    }
}

/// `floor(ordinal / total * page_count) + 1`.
///
/// Sections are assumed to be spread evenly through the document. This is a
/// navigation hint only; it is never an authoritative page anchor.
pub fn approximate_page(ordinal: usize, total: usize, page_count: u32) -> u32 {
    if total == 0 {
        return 1;
    }
    let page = (ordinal as u64 * page_count as u64) / total as u64;
    page as u32 + 1
}

pub fn build_outline(info: DocumentInfo) -> Outline {
    let total = info.sections.len();
    let sections = info
        .sections
        .into_iter()
        .enumerate()
        .map(|(ordinal, name)| Section {
            approximate_page: approximate_page(ordinal, total, info.page_count),
            name,
        })
        .collect();

    Outline {
        page_count: info.page_count,
        sections,
    }
}

/// Fetches the outline, degrading to an empty one on any failure.
pub async fn fetch_outline(backend: &dyn Backend, id: &str) -> Outline {
    match backend.document_info(id).await {
        Ok(info) => build_outline(info),
        Err(e) => {
            warn!("Outline unavailable for {}: {}", id, e);
            Outline::default()
        }
    }
}

/// Events reported back by the external renderer once it owns the PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    DocumentLoaded { num_pages: u32 },
    DocumentFailed { message: String },
    PageLoaded { page: u32 },
    PageFailed { page: u32, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum LoadState {
    #[default]
    Idle,
    Resolving,
    Rendering,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfViewer {
    document_id: Option<String>,
    resolved: Option<ResolvedPdf>,
    outline: Outline,
    load_state: LoadState,
    page_errors: BTreeMap<u32, String>,
    current_page: u32,
    total_pages: u32,
    zoom: f64,
    #[serde(skip)]
    open_attempt: u64,
}

impl Default for PdfViewer {
    fn default() -> Self {
        Self {
            document_id: None,
            resolved: None,
            outline: Outline::default(),
            load_state: LoadState::Idle,
            page_errors: BTreeMap::new(),
            current_page: 1,
            total_pages: 0,
            zoom: DEFAULT_ZOOM,
            open_attempt: 0,
        }
    }
}

impl PdfViewer {
    /// A fresh viewer for `document_id` (or none).
    pub fn reset_for(&mut self, document_id: Option<String>) {
        *self = Self {
            document_id,
            open_attempt: self.open_attempt,
            ..Self::default()
        };
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn resolved(&self) -> Option<&ResolvedPdf> {
        self.resolved.as_ref()
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn page_errors(&self) -> &BTreeMap<u32, String> {
        &self.page_errors
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Starts a new open and returns its attempt number. Results of any
    /// earlier attempt are refused from now on.
    pub fn begin_resolving(&mut self) -> u64 {
        self.open_attempt += 1;
        self.resolved = None;
        self.load_state = LoadState::Resolving;
        self.open_attempt
    }

    fn check_attempt(&self, attempt: u64) -> Result<()> {
        if attempt != self.open_attempt || self.load_state != LoadState::Resolving {
            return Err(WorkspaceError::StaleResponse(format!("PDF open attempt {}", attempt)));
        }
        Ok(())
    }

    /// Hands the location over to the renderer.
    pub fn mark_resolved(&mut self, attempt: u64, resolved: ResolvedPdf) -> Result<()> {
        self.check_attempt(attempt)?;
        self.resolved = Some(resolved);
        self.load_state = LoadState::Rendering;
        Ok(())
    }

    pub fn mark_unavailable(&mut self, attempt: u64, message: impl Into<String>) -> Result<()> {
        self.check_attempt(attempt)?;
        self.resolved = None;
        self.load_state = LoadState::Failed(message.into());
        Ok(())
    }

    /// The renderer's own page count wins once it reports one.
    pub fn set_outline(&mut self, outline: Outline) {
        if self.total_pages == 0 && outline.page_count > 0 {
            self.set_total_pages(outline.page_count);
        }
        self.outline = outline;
    }

    pub fn apply_render_event(&mut self, event: RenderEvent) {
        match event {
            RenderEvent::DocumentLoaded { num_pages } => {
                self.set_total_pages(num_pages);
                self.load_state = LoadState::Loaded;
            }
            RenderEvent::DocumentFailed { message } => {
                self.load_state = LoadState::Failed(message);
            }
            RenderEvent::PageLoaded { page } => {
                self.page_errors.remove(&page);
            }
            RenderEvent::PageFailed { page, message } => {
                self.page_errors.insert(page, message);
            }
        }
    }

    fn set_total_pages(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.current_page = self.clamp_page(self.current_page);
    }

    fn clamp_page(&self, page: u32) -> u32 {
        page.clamp(1, self.total_pages.max(1))
    }

    pub fn go_to_page(&mut self, page: u32) -> u32 {
        self.current_page = self.clamp_page(page);
        self.current_page
    }

    pub fn next_page(&mut self) -> u32 {
        self.go_to_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            // one decimal keeps repeated steps from drifting
            self.zoom = (zoom.clamp(MIN_ZOOM, MAX_ZOOM) * 10.0).round() / 10.0;
        }
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom - ZOOM_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_pages_for_four_sections() {
        let outline = build_outline(DocumentInfo {
            page_count: 20,
            sections: ["Intro", "Methods", "Results", "Discussion"]
                .into_iter()
                .map(String::from)
                .collect(),
        });

        let pages: Vec<u32> = outline.sections.iter().map(|s| s.approximate_page).collect();
        assert_eq!(pages, vec![1, 6, 11, 16]);
        assert_eq!(outline.sections[2].name, "Results");
    }

    #[test]
    fn test_approximate_page_is_monotonic_and_bounded() {
        for total in 1..=12usize {
            for page_count in 1..=40u32 {
                let pages: Vec<u32> = (0..total)
                    .map(|i| approximate_page(i, total, page_count))
                    .collect();
                assert!(pages.windows(2).all(|w| w[0] <= w[1]));
                assert!(pages[0] >= 1);
                assert!(pages[total - 1] <= page_count);
            }
        }
    }

    #[test]
    fn test_locations_use_both_prefixes() {
        let config = WorkspaceConfig {
            api_base_url: "http://api.local/".to_string(),
            ..Default::default()
        };
        let locations = PdfLocations::for_document(&config, "20240131_120000_my report.pdf");

        assert_eq!(
            locations.primary,
            "http://api.local/files/20240131_120000_my%20report.pdf"
        );
        assert_eq!(
            locations.fallback,
            "http://api.local/uploads/20240131_120000_my%20report.pdf"
        );
    }

    #[test]
    fn test_pdf_payload_detection() {
        let pdf_bytes = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let html = b"<!doctype html><html></html>".to_vec();

        let sniffed = BinaryPayload { content_type: Some("application/octet-stream".into()), bytes: pdf_bytes };
        let declared = BinaryPayload { content_type: Some("application/pdf; charset=binary".into()), bytes: b"x".to_vec() };
        let spa_page = BinaryPayload { content_type: Some("text/html".into()), bytes: html };
        let empty = BinaryPayload { content_type: Some(PDF_MIME.into()), bytes: Vec::new() };

        assert!(is_pdf_payload(&sniffed));
        assert!(is_pdf_payload(&declared));
        assert!(!is_pdf_payload(&spa_page));
        assert!(!is_pdf_payload(&empty));
    }

    #[test]
    fn test_zoom_and_page_stay_clamped() {
        let mut viewer = PdfViewer::default();
        for _ in 0..20 {
            viewer.zoom_in();
        }
        assert_eq!(viewer.zoom(), MAX_ZOOM);
        for _ in 0..20 {
            viewer.zoom_out();
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&viewer.zoom()));
        }
        assert_eq!(viewer.zoom(), MIN_ZOOM);
        assert_eq!(viewer.zoom_in(), 0.7);

        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 5 });
        assert_eq!(viewer.previous_page(), 1);
        assert_eq!(viewer.go_to_page(99), 5);
        assert_eq!(viewer.next_page(), 5);
        assert_eq!(viewer.go_to_page(0), 1);
    }

    #[test]
    fn test_smaller_reload_clamps_current_page() {
        let mut viewer = PdfViewer::default();
        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 30 });
        viewer.go_to_page(25);

        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 10 });
        assert_eq!(viewer.current_page(), 10);
        assert_eq!(viewer.load_state(), &LoadState::Loaded);
    }

    #[test]
    fn test_outline_page_count_only_fills_unknown_total() {
        let mut viewer = PdfViewer::default();
        viewer.set_outline(Outline { page_count: 12, sections: Vec::new() });
        assert_eq!(viewer.total_pages(), 12);

        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 14 });
        viewer.set_outline(Outline { page_count: 12, sections: Vec::new() });
        assert_eq!(viewer.total_pages(), 14);
    }

    fn resolved_at(location: &str) -> ResolvedPdf {
        ResolvedPdf {
            location: location.to_string(),
            kind: LocationKind::Primary,
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_superseded_open_cannot_undo_loaded_document() {
        let mut viewer = PdfViewer::default();
        let first = viewer.begin_resolving();
        let second = viewer.begin_resolving();

        viewer.mark_resolved(second, resolved_at("http://api/files/b.pdf")).unwrap();
        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 3 });

        let late = viewer.mark_resolved(first, resolved_at("http://api/files/a.pdf"));
        assert!(late.unwrap_err().is_stale());
        assert!(viewer.mark_unavailable(first, "timed out").unwrap_err().is_stale());
        assert_eq!(viewer.load_state(), &LoadState::Loaded);
        assert_eq!(viewer.resolved().map(|r| r.location.as_str()), Some("http://api/files/b.pdf"));
    }

    #[test]
    fn test_resolution_is_applied_once_per_attempt() {
        let mut viewer = PdfViewer::default();
        let attempt = viewer.begin_resolving();
        viewer.mark_resolved(attempt, resolved_at("http://api/files/a.pdf")).unwrap();
        viewer.apply_render_event(RenderEvent::DocumentLoaded { num_pages: 2 });

        assert!(viewer.mark_resolved(attempt, resolved_at("http://api/files/a.pdf")).is_err());
        assert_eq!(viewer.load_state(), &LoadState::Loaded);
    }

    #[test]
    fn test_page_errors_clear_on_reload() {
        let mut viewer = PdfViewer::default();
        viewer.apply_render_event(RenderEvent::PageFailed { page: 3, message: "bad xref".into() });
        assert_eq!(viewer.page_errors().get(&3).map(String::as_str), Some("bad xref"));

        viewer.apply_render_event(RenderEvent::PageLoaded { page: 3 });
        assert!(viewer.page_errors().is_empty());
    }
}

use medscope::{
    ChatMessage, DocumentStatus, LoadState, PanelState, PdfViewer, RelatedDocument, Sender,
    SimilarityResults, Synthesis, WorkspaceState, display_name,
};
use std::fmt::Write;

pub fn documents(state: &WorkspaceState) -> String {
    if state.registry.is_empty() {
        return "No documents yet. Use `upload <path>`.".to_string();
    }

    let mut out = String::new();
    for (number, document) in state.registry.documents().iter().enumerate() {
        let marker = if state.selection.is_selected(&document.id) { '*' } else { ' ' };
        let status = match document.status {
            DocumentStatus::Ready => "ready",
            DocumentStatus::Summarizing => "summarizing",
            DocumentStatus::Summarized => "summarized",
            DocumentStatus::Failed => "summary failed",
        };
        let _ = writeln!(
            out,
            "{} {:>2}. {}  ({}, {})",
            marker,
            number + 1,
            document.display_name(),
            document.upload_date(),
            status
        );
        if let Some(summary) = &document.summary {
            let _ = writeln!(out, "       {}", summary.replace('\n', "\n       "));
        }
    }
    out.trim_end().to_string()
}

pub fn viewer(viewer: &PdfViewer) -> String {
    let Some(id) = viewer.document_id() else {
        return "No document open.".to_string();
    };

    let mut out = String::new();
    let status = match viewer.load_state() {
        LoadState::Idle => "not opened".to_string(),
        LoadState::Resolving => "resolving".to_string(),
        LoadState::Rendering => "rendering".to_string(),
        LoadState::Loaded => "loaded".to_string(),
        LoadState::Failed(message) => format!("failed: {}", message),
    };
    let _ = writeln!(out, "{} [{}]", id, status);
    if let Some(resolved) = viewer.resolved() {
        let _ = writeln!(out, "  source: {} ({:?})", resolved.location, resolved.kind);
    }
    let total = if viewer.total_pages() == 0 {
        "?".to_string()
    } else {
        viewer.total_pages().to_string()
    };
    let _ = writeln!(
        out,
        "  page {}/{}  zoom {:.0}%",
        viewer.current_page(),
        total,
        viewer.zoom() * 100.0
    );
    for section in &viewer.outline().sections {
        let _ = writeln!(out, "  ~p.{:<4} {}", section.approximate_page, section.name);
    }
    for (page, message) in viewer.page_errors() {
        let _ = writeln!(out, "  page {} failed: {}", page, message);
    }
    out.trim_end().to_string()
}

pub fn panel(state: &PanelState) -> String {
    match state {
        PanelState::Idle => "Panel closed.".to_string(),
        PanelState::ExplanationLoading(key) => format!("Explaining... (request {})", key),
        PanelState::EvidenceLoading(key) => format!("Finding sources... (request {})", key),
        PanelState::ExplanationResult { question, answer } => format!("Q: {}\n{}", question, answer),
        PanelState::EvidenceResult { chunks, confidence } => {
            let mut out = format!("Confidence {:.0}%", confidence * 100.0);
            for chunk in chunks {
                let page = chunk
                    .page
                    .map(|page| format!("p.{}", page))
                    .unwrap_or_else(|| "p.?".to_string());
                let _ = write!(
                    out,
                    "\n  [{} {:.2}] {}",
                    page, chunk.similarity, chunk.content
                );
            }
            out
        }
        PanelState::Failed { kind, message } => format!("{:?} failed: {}", kind, message),
    }
}

pub fn message(message: &ChatMessage) -> String {
    let speaker = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    let mut out = format!("{}> {}", speaker, message.text);
    for citation in &message.citations {
        let _ = write!(
            out,
            "\n    [{}] {}: {}",
            citation.index, citation.label, citation.snippet
        );
    }
    out
}

pub fn related(related: &[RelatedDocument]) -> String {
    if related.is_empty() {
        return "No related documents.".to_string();
    }
    related
        .iter()
        .map(|doc| {
            format!(
                "{:.2}  {}  [{}]",
                doc.similarity_score,
                doc.title.as_deref().unwrap_or(&doc.filename),
                doc.common_topics.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn synthesis(synthesis: &Synthesis) -> String {
    let names: Vec<&str> = synthesis.filenames.iter().map(String::as_str).map(display_name).collect();
    format!("{} of {}\n{}", synthesis.kind, names.join(", "), synthesis.text)
}

pub fn papers(results: &SimilarityResults) -> String {
    let mut out = format!(
        "{} papers in {:.0}ms",
        results.total_found, results.search_time_ms
    );
    for paper in &results.papers {
        let _ = write!(
            out,
            "\n{:>2}. {} ({:.2})\n    {}",
            paper.rank, paper.title, paper.similarity_score, paper.arxiv_url
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use medscope::{Citation, SourceChunk, SynthesisKind};

    #[test]
    fn test_documents_marks_focus_and_strips_prefix() {
        let mut state = WorkspaceState::default();
        state.registry.register("20240131_120000_report.pdf").unwrap();
        state.registry.register("notes.pdf").unwrap();
        state.selection.select("notes.pdf");

        let listing = documents(&state);
        assert_eq!(
            listing,
            "   1. report.pdf  (1/31/2024, ready)\n*  2. notes.pdf  (Unknown date, ready)"
        );
    }

    #[test]
    fn test_panel_evidence() {
        let state = PanelState::EvidenceResult {
            chunks: vec![SourceChunk {
                content: "Mortality fell.".to_string(),
                similarity: 0.8134,
                page: Some(4),
            }],
            confidence: 0.8,
        };
        assert_eq!(panel(&state), "Confidence 80%\n  [p.4 0.81] Mortality fell.");
    }

    #[test]
    fn test_message_with_citation() {
        let reply = ChatMessage::assistant(
            "21%.",
            vec![Citation {
                index: 1,
                label: "Results".to_string(),
                snippet: "28-day mortality".to_string(),
            }],
        );
        assert_eq!(message(&reply), "assistant> 21%.\n    [1] Results: 28-day mortality");
    }

    #[test]
    fn test_synthesis_lists_display_names() {
        let result = Synthesis {
            kind: SynthesisKind::Comparison,
            filenames: vec!["20240131_120000_a.pdf".to_string(), "b.pdf".to_string()],
            text: "Both report lower mortality.".to_string(),
        };
        assert_eq!(
            synthesis(&result),
            "comparison of a.pdf, b.pdf\nBoth report lower mortality."
        );
    }
}

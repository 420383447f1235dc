use serde::Serialize;

use crate::{
    audience::Audience,
    error::{Result, WorkspaceError},
    models::{Evidence, Highlight, SourceChunk},
};

/// Identity of one panel request. Keys only ever increase, so a key that
/// has been superseded can never become current again.
pub type RequestKey = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PanelKind {
    Explanation,
    Evidence,
}

/// What the knowledge panel shows. At most one variant is active, so opening
/// one kind of panel always drops whatever the other kind was holding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum PanelState {
    #[default]
    Idle,
    ExplanationLoading(RequestKey),
    ExplanationResult {
        question: String,
        answer: String,
    },
    EvidenceLoading(RequestKey),
    EvidenceResult {
        chunks: Vec<SourceChunk>,
        confidence: f64,
    },
    Failed {
        kind: PanelKind,
        message: String,
    },
}

impl PanelState {
    /// The key a response must carry to be applied.
    pub fn active_key(&self) -> Option<RequestKey> {
        match self {
            PanelState::ExplanationLoading(key) | PanelState::EvidenceLoading(key) => Some(*key),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<PanelKind> {
        match self {
            PanelState::Idle => None,
            PanelState::ExplanationLoading(_) | PanelState::ExplanationResult { .. } => {
                Some(PanelKind::Explanation)
            }
            PanelState::EvidenceLoading(_) | PanelState::EvidenceResult { .. } => {
                Some(PanelKind::Evidence)
            }
            PanelState::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.active_key().is_some()
    }

    fn awaits(&self, kind: PanelKind, key: RequestKey) -> bool {
        self.active_key() == Some(key) && self.kind() == Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationRequest {
    pub key: RequestKey,
    pub filename: String,
    pub selected_text: String,
    pub context: String,
    pub question: String,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRequest {
    pub key: RequestKey,
    pub filename: String,
    pub sentence: String,
}

/// Coordinates the explanation and source-evidence panels for the current
/// highlight.
///
/// There is no cancellation: opening a panel issues a fresh key and a
/// response is applied only while its key is still the loading one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgePanel {
    state: PanelState,
    highlight: Option<Highlight>,
    last_key: RequestKey,
}

impl KnowledgePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    fn next_key(&mut self) -> RequestKey {
        self.last_key += 1;
        self.last_key
    }

    pub fn open_explanation(
        &mut self,
        filename: &str,
        mut highlight: Highlight,
        question: &str,
        audience: Audience,
    ) -> ExplanationRequest {
        let key = self.next_key();
        highlight.question = Some(question.to_string());

        let request = ExplanationRequest {
            key,
            filename: filename.to_string(),
            selected_text: highlight.selected_text.clone(),
            context: highlight.surrounding_context.clone(),
            question: question.to_string(),
            audience,
        };
        self.highlight = Some(highlight);
        self.state = PanelState::ExplanationLoading(key);
        request
    }

    pub fn open_evidence(&mut self, filename: &str, highlight: Highlight) -> EvidenceRequest {
        let key = self.next_key();
        let request = EvidenceRequest {
            key,
            filename: filename.to_string(),
            sentence: highlight.selected_text.clone(),
        };
        self.highlight = Some(highlight);
        self.state = PanelState::EvidenceLoading(key);
        request
    }

    fn ensure_current(&self, kind: PanelKind, key: RequestKey) -> Result<()> {
        if self.state.awaits(kind, key) {
            Ok(())
        } else {
            Err(WorkspaceError::StaleResponse(format!(
                "{:?} request {} (panel is {:?})",
                kind, key, self.state
            )))
        }
    }

    pub fn apply_explanation(&mut self, request: &ExplanationRequest, answer: String) -> Result<()> {
        self.ensure_current(PanelKind::Explanation, request.key)?;
        self.state = PanelState::ExplanationResult {
            question: request.question.clone(),
            answer,
        };
        Ok(())
    }

    pub fn apply_evidence(&mut self, key: RequestKey, evidence: Evidence) -> Result<()> {
        self.ensure_current(PanelKind::Evidence, key)?;
        self.state = PanelState::EvidenceResult {
            chunks: evidence.chunks,
            confidence: evidence.confidence,
        };
        Ok(())
    }

    pub fn apply_failure(&mut self, kind: PanelKind, key: RequestKey, message: String) -> Result<()> {
        self.ensure_current(kind, key)?;
        self.state = PanelState::Failed { kind, message };
        Ok(())
    }

    /// Closes the panel. Any outstanding request becomes stale.
    pub fn reset(&mut self) {
        self.state = PanelState::Idle;
        self.highlight = None;
    }
}

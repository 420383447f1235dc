use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Result, WorkspaceError};
use crate::models::{Document, DocumentStatus};

/// `YYYYMMDD_HHMMSS_` as prepended by the upload endpoint.
static TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}_").expect("timestamp prefix pattern"));

/// The id without its upload timestamp prefix, or the id unchanged.
pub fn display_name(id: &str) -> &str {
    match TIMESTAMP_PREFIX.find(id) {
        Some(prefix) => &id[prefix.end()..],
        None => id,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadDate {
    Known(NaiveDate),
    Unknown,
}

impl fmt::Display for UploadDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadDate::Known(date) => write!(f, "{}/{}/{}", date.month(), date.day(), date.year()),
            UploadDate::Unknown => f.write_str("Unknown date"),
        }
    }
}

/// Reads the first `_`-delimited token as `YYYYMMDD`.
pub fn upload_date(id: &str) -> UploadDate {
    let token = id.split('_').next().unwrap_or_default();
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return UploadDate::Unknown;
    }

    let (year, month, day) = (&token[0..4], &token[4..6], &token[6..8]);
    match (year.parse(), month.parse(), day.parse()) {
        (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day)
            .map(UploadDate::Known)
            .unwrap_or(UploadDate::Unknown),
        _ => UploadDate::Unknown,
    }
}

/// Owned store of every document the backend has acknowledged.
///
/// Each method validates before it mutates, so a failed call leaves the
/// registry exactly as it was. No method performs I/O: callers obtain remote
/// confirmation first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentRegistry {
    documents: Vec<Document>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.contains(&id) {
            return Err(WorkspaceError::DuplicateDocument(id));
        }
        debug!("Registering document {}", id);
        self.documents.push(Document::new(id));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Documents in registration order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn ids(&self) -> Vec<String> {
        self.documents.iter().map(|doc| doc.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn set_status(&mut self, id: &str, status: DocumentStatus) -> Result<()> {
        let document = self.entry_mut(id)?;
        if !document.status.can_transition_to(status) {
            return Err(WorkspaceError::InvalidTransition {
                id: id.to_string(),
                from: document.status,
                to: status,
            });
        }
        document.status = status;
        Ok(())
    }

    pub fn set_summary(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        self.entry_mut(id)?.summary = Some(text.into());
        Ok(())
    }

    /// Stores the summary and marks the document Summarized in one step.
    pub fn record_summary(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        self.set_status(id, DocumentStatus::Summarized)?;
        self.set_summary(id, text)
    }

    pub fn remove(&mut self, id: &str) -> Result<Document> {
        let position = self
            .documents
            .iter()
            .position(|doc| doc.id == id)
            .ok_or_else(|| WorkspaceError::DocumentNotFound(id.to_string()))?;
        Ok(self.documents.remove(position))
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| WorkspaceError::DocumentNotFound(id.to_string()))
    }
}

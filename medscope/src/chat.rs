use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    backend::QueryReply,
    error::{Result, WorkspaceError},
    models::{ChatMessage, Citation},
    registry::display_name,
};

/// Characters of content used as a label when a citation names no file.
const LABEL_PREFIX_CHARS: usize = 50;

/// Which endpoint a question goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryRoute {
    /// `/query-doc` with `{question, document_id}`.
    SingleDocument { question: String, document_id: String },
    /// `/query` with `{query, filenames}`.
    MultiDocument { query: String, filenames: Vec<String> },
}

pub fn route_query(text: &str, scope: &[String]) -> Result<QueryRoute> {
    match scope {
        [] => Err(WorkspaceError::NoDocumentSelected),
        [document_id] => Ok(QueryRoute::SingleDocument {
            question: text.to_string(),
            document_id: document_id.clone(),
        }),
        filenames => Ok(QueryRoute::MultiDocument {
            query: text.to_string(),
            filenames: filenames.to_vec(),
        }),
    }
}

/// The two citation shapes the backend produces.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCitation {
    Nested {
        chunk: RawChunk,
        #[serde(default)]
        index: Option<usize>,
    },
    Flat {
        #[serde(alias = "text")]
        content: String,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        index: Option<usize>,
    },
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn metadata_str<'a>(metadata: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn content_prefix(content: &str) -> String {
    let content = content.trim();
    let mut prefix: String = content.chars().take(LABEL_PREFIX_CHARS).collect();
    if content.chars().count() > LABEL_PREFIX_CHARS {
        prefix.push('…');
    }
    prefix
}

impl RawCitation {
    fn normalize(self, ordinal: usize) -> Citation {
        match self {
            RawCitation::Nested { chunk, index } => {
                let index = index.unwrap_or(ordinal);
                Citation {
                    index,
                    label: metadata_str(&chunk.metadata, "section")
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Source {}", index)),
                    snippet: chunk.content,
                }
            }
            RawCitation::Flat {
                content,
                metadata,
                index,
            } => Citation {
                index: index.unwrap_or(ordinal),
                label: metadata_str(&metadata, "filename")
                    .map(|filename| display_name(filename).to_string())
                    .unwrap_or_else(|| content_prefix(&content)),
                snippet: content,
            },
        }
    }
}

/// Normalizes heterogeneous citation payloads into `{index, label, snippet}`.
///
/// Entries that match neither shape are skipped; indices default to the
/// 1-based position among the entries that were kept.
pub fn normalize_citations(raw: &[Value]) -> Vec<Citation> {
    raw.iter()
        .filter_map(|value| match RawCitation::deserialize(value) {
            Ok(citation) => Some(citation),
            Err(e) => {
                warn!("Skipping malformed citation {}: {}", value, e);
                None
            }
        })
        .enumerate()
        .map(|(position, citation)| citation.normalize(position + 1))
        .collect()
}

/// A send that passed validation and now waits for its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub ticket: Uuid,
    pub route: QueryRoute,
}

/// Append-only message log with at most one question in flight.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    in_flight: Option<Uuid>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Validates, appends the user's message and marks the send in flight.
    /// A refused send leaves the log untouched.
    pub fn begin_send(&mut self, text: &str, scope: &[String]) -> Result<PendingQuery> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkspaceError::Validation("message is empty".to_string()));
        }
        if self.in_flight.is_some() {
            return Err(WorkspaceError::ChatBusy);
        }
        let route = route_query(text, scope)?;

        let ticket = Uuid::new_v4();
        self.messages.push(ChatMessage::user(text));
        self.in_flight = Some(ticket);
        debug!("Chat send {} routed as {:?}", ticket, route);

        Ok(PendingQuery { ticket, route })
    }

    /// Appends the assistant's turn. Failures become an assistant message
    /// carrying the error text so the turn is never dropped.
    pub fn complete(&mut self, ticket: Uuid, reply: Result<QueryReply>) -> Result<()> {
        if self.in_flight != Some(ticket) {
            return Err(WorkspaceError::StaleResponse(format!("chat send {}", ticket)));
        }
        self.in_flight = None;

        let message = match reply {
            Ok(reply) => ChatMessage::assistant(reply.text, normalize_citations(&reply.citations)),
            Err(e) => {
                warn!("Chat send {} failed: {}", ticket, e);
                ChatMessage::assistant(format!("Error: {}", e), Vec::new())
            }
        };
        self.messages.push(message);
        Ok(())
    }

    /// Closes a send whose answer will never be applied, e.g. because the
    /// caller dropped it. No-op once the ticket is no longer in flight.
    pub fn abandon(&mut self, ticket: Uuid) -> bool {
        if self.in_flight != Some(ticket) {
            return false;
        }
        self.in_flight = None;
        warn!("Chat send {} abandoned before its answer arrived", ticket);
        self.messages.push(ChatMessage::assistant("Error: request abandoned", Vec::new()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_route_by_scope_size() {
        assert_eq!(
            route_query("What are the findings?", &ids(&["docX"])).unwrap(),
            QueryRoute::SingleDocument {
                question: "What are the findings?".to_string(),
                document_id: "docX".to_string()
            }
        );
        assert_eq!(
            route_query("Compare", &ids(&["a.pdf", "b.pdf"])).unwrap(),
            QueryRoute::MultiDocument {
                query: "Compare".to_string(),
                filenames: ids(&["a.pdf", "b.pdf"])
            }
        );
        assert_eq!(route_query("Hi", &[]), Err(WorkspaceError::NoDocumentSelected));
    }

    #[test]
    fn test_nested_and_flat_citations_normalize_to_one_shape() {
        let raw = vec![
            json!({"chunk": {"content": "Sepsis mortality was 21%.", "metadata": {"section": "Results", "page": 6}}}),
            json!({"content": "Cohort of 4,200 adults.", "metadata": {"filename": "20240131_120000_trial.pdf"}}),
            json!({"content": "A rather long passage that has no filename attached to it at all, really."}),
        ];

        let citations = normalize_citations(&raw);
        assert_eq!(citations.len(), 3);
        assert_eq!(
            citations[0],
            Citation {
                index: 1,
                label: "Results".to_string(),
                snippet: "Sepsis mortality was 21%.".to_string()
            }
        );
        assert_eq!(citations[1].label, "trial.pdf");
        assert_eq!(citations[1].snippet, "Cohort of 4,200 adults.");
        assert_eq!(citations[2].index, 3);
        assert!(citations[2].label.ends_with('…'));
        assert_eq!(citations[2].label.chars().count(), LABEL_PREFIX_CHARS + 1);
    }

    #[test]
    fn test_malformed_citations_are_skipped() {
        let raw = vec![
            json!("just a string"),
            json!({"metadata": {"filename": "a.pdf"}}),
            json!({"chunk": {"content": "kept"}, "index": 7}),
        ];
        let citations = normalize_citations(&raw);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].index, 7);
        assert_eq!(citations[0].label, "Source 7");
    }

    #[test]
    fn test_send_is_serialized() {
        let mut chat = ChatSession::new();
        let scope = ids(&["docX"]);
        let pending = chat.begin_send("first", &scope).unwrap();

        assert_eq!(chat.begin_send("second", &scope), Err(WorkspaceError::ChatBusy));
        assert_eq!(chat.messages().len(), 1);

        chat.complete(
            pending.ticket,
            Ok(QueryReply { text: "answer".to_string(), citations: Vec::new() }),
        )
        .unwrap();
        assert!(!chat.is_awaiting_answer());
        assert!(chat.begin_send("second", &scope).is_ok());
    }

    #[test]
    fn test_refused_sends_do_not_touch_the_log() {
        let mut chat = ChatSession::new();
        assert_eq!(chat.begin_send("hello", &[]), Err(WorkspaceError::NoDocumentSelected));
        assert!(matches!(chat.begin_send("   ", &ids(&["a"])), Err(WorkspaceError::Validation(_))));
        assert!(chat.messages().is_empty());
        assert!(!chat.is_awaiting_answer());
    }

    #[test]
    fn test_failure_becomes_assistant_message() {
        let mut chat = ChatSession::new();
        let pending = chat.begin_send("hello", &ids(&["a"])).unwrap();
        chat.complete(pending.ticket, Err(WorkspaceError::Transport("connection refused".to_string())))
            .unwrap();

        let last = chat.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, "Error: Transport error: connection refused");
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_unknown_ticket_is_stale() {
        let mut chat = ChatSession::new();
        let _pending = chat.begin_send("hello", &ids(&["a"])).unwrap();

        let err = chat
            .complete(Uuid::new_v4(), Ok(QueryReply { text: "x".to_string(), citations: Vec::new() }))
            .unwrap_err();
        assert!(err.is_stale());
        assert!(chat.is_awaiting_answer());
    }

    #[test]
    fn test_abandon_frees_the_session_once() {
        let mut chat = ChatSession::new();
        let pending = chat.begin_send("hello", &ids(&["a"])).unwrap();

        assert!(chat.abandon(pending.ticket));
        assert!(!chat.abandon(pending.ticket));
        assert!(!chat.is_awaiting_answer());
        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.messages()[1].text, "Error: request abandoned");

        let late = chat.complete(pending.ticket, Ok(QueryReply { text: "late".to_string(), citations: Vec::new() }));
        assert!(late.unwrap_err().is_stale());
        assert_eq!(chat.messages().len(), 2);
    }
}

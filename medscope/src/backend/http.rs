use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::{Backend, BinaryPayload, QueryReply, wire};
use crate::{
    audience::Audience,
    config::WorkspaceConfig,
    error::{Result, WorkspaceError},
    models::{
        DocumentInfo, Evidence, HealthStatus, RelatedDocument, SimilarityResults, SynthesisKind,
    },
    panel::{EvidenceRequest, ExplanationRequest},
    pdf::PDF_MIME,
};

/// [`Backend`] over HTTP + JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: WorkspaceConfig,
}

impl HttpBackend {
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| WorkspaceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        self.config.api_url(path)
    }

    fn filename_url(&self, prefix: &str, filename: &str) -> String {
        self.url(&format!("{}/{}", prefix, urlencoding::encode(filename)))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| WorkspaceError::Transport(format!("POST {}: {}", path, e)))?;
        decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, path: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkspaceError::Transport(format!("GET {}: {}", path, e)))?;
        decode(path, response).await
    }
}

/// Maps a non-success status to a protocol error, preferring the `detail`
/// of the error body over the raw text.
async fn check_status(path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<wire::ErrorBody>(&body)
        .map(|error| error.message())
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
    warn!("{} returned {}: {}", path, status, detail);

    Err(WorkspaceError::Protocol(if detail.is_empty() {
        format!("{} returned {}", path, status)
    } else {
        format!("{}: {}", status, detail)
    }))
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let response = check_status(path, response).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| WorkspaceError::Transport(format!("reading {} response: {}", path, e)))?;

    serde_json::from_slice(&body)
        .map_err(|e| WorkspaceError::Protocol(format!("unexpected {} response: {}", path, e)))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(PDF_MIME)
            .map_err(|e| WorkspaceError::Validation(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkspaceError::Transport(format!("POST /upload: {}", e)))?;
        let uploaded: wire::UploadResponse = decode("/upload", response).await?;

        if let Some(warning) = &uploaded.warning {
            warn!("Upload of {} completed with a warning: {}", uploaded.filename, warning);
        }
        info!("Uploaded {} as {}", file_name, uploaded.filename);
        Ok(uploaded.filename)
    }

    async fn delete(&self, filename: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json("/delete_file", &wire::DeleteRequest { filename })
            .await?;
        Ok(())
    }

    async fn document_info(&self, filename: &str) -> Result<DocumentInfo> {
        let url = self.filename_url("/document-info", filename);
        let response: wire::DocumentInfoResponse = self.get_json(&url, "/document-info").await?;
        Ok(response.into())
    }

    async fn summarize(&self, filename: &str, audience: Audience) -> Result<String> {
        let request = wire::SummarizeRequest {
            filename,
            audience_type: audience.as_str(),
        };
        let response: wire::SummarizeResponse = self.post_json("/summarize", &request).await?;
        Ok(response.message)
    }

    async fn explain_text(&self, request: &ExplanationRequest) -> Result<String> {
        let body = wire::ExplainTextRequest {
            filename: &request.filename,
            selected_text: &request.selected_text,
            context: &request.context,
            question: &request.question,
            audience_type: request.audience.as_str(),
        };
        let response: wire::ExplainResponse = self.post_json("/explain-text", &body).await?;
        Ok(response.explanation)
    }

    async fn source_evidence(&self, request: &EvidenceRequest) -> Result<Evidence> {
        let body = wire::SourceEvidenceRequest {
            filename: &request.filename,
            sentence: &request.sentence,
        };
        let response: wire::SourceEvidenceResponse = self.post_json("/explanation", &body).await?;
        Ok(response.into())
    }

    async fn query_document(&self, question: &str, document_id: &str) -> Result<QueryReply> {
        let body = wire::QueryDocRequest {
            question,
            document_id,
        };
        let response: wire::QueryDocResponse = self.post_json("/query-doc", &body).await?;
        Ok(QueryReply {
            text: response.answer,
            citations: response.citations.unwrap_or_default(),
        })
    }

    async fn query_documents(&self, query: &str, filenames: &[String]) -> Result<QueryReply> {
        let body = wire::QueryRequest { query, filenames };
        let response: wire::QueryResponse = self.post_json("/query", &body).await?;
        Ok(QueryReply {
            text: response.message,
            citations: response.sources.unwrap_or_default(),
        })
    }

    async fn related_documents(&self, filename: &str) -> Result<Vec<RelatedDocument>> {
        let url = self.filename_url("/related-documents", filename);
        let response: wire::RelatedResponse = self.get_json(&url, "/related-documents").await?;
        Ok(response.related)
    }

    async fn synthesize_topic(&self, filenames: &[String], kind: SynthesisKind) -> Result<String> {
        let body = wire::SynthesizeRequest {
            filenames,
            synthesis_type: kind.as_str(),
        };
        let response: wire::SynthesizeResponse = self.post_json("/synthesize-topic", &body).await?;
        Ok(response.synthesis)
    }

    async fn search_similar(&self, query: &str, limit: usize) -> Result<SimilarityResults> {
        self.post_json("/arxiv/search", &wire::SimilaritySearchRequest { query, limit })
            .await
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.get_json(&self.url("/healthz"), "/healthz").await
    }

    async fn fetch_binary(&self, location: &str) -> Result<BinaryPayload> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| WorkspaceError::Transport(format!("GET {}: {}", location, e)))?;
        let response = check_status(location, response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkspaceError::Transport(format!("reading {}: {}", location, e)))?;

        Ok(BinaryPayload {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

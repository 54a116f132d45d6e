use std::future::Future;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

/// Content types the chat endpoint uses for incrementally readable bodies.
const STREAMING_CONTENT_TYPES: &[&str] = &["text/plain", "text/event-stream"];

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub document_ids: Vec<String>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, document_ids: Vec<String>) -> Self {
        Self {
            message: message.into(),
            document_ids,
            stream: true,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Server-side reference to one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub filename: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
        }
    }
}

/// One file queued for `POST /upload-documents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// Single JSON object returned by non-streaming backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JsonReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type BodyStream = BoxStream<'static, ClientResult<Bytes>>;
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("network request failed: {source}"))]
    Network {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("server responded with status {status}"))]
    HttpStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to parse backend response: {source}"))]
    DecodeJson {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("invalid content type for upload '{filename}': {source}"))]
    InvalidUpload {
        stage: &'static str,
        filename: String,
        source: reqwest::Error,
    },
    #[snafu(display("response body read failed: {message}"))]
    BodyRead {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("invalid endpoint url '{url}': {message}"))]
    InvalidUrl {
        stage: &'static str,
        url: String,
        message: String,
    },
}

impl ClientError {
    /// Returns the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::BuildClient { stage, .. }
            | Self::Network { stage, .. }
            | Self::HttpStatus { stage, .. }
            | Self::DecodeJson { stage, .. }
            | Self::InvalidUpload { stage, .. }
            | Self::BodyRead { stage, .. }
            | Self::InvalidUrl { stage, .. } => stage,
        }
    }
}

/// Successful response to a chat request, body not yet consumed.
pub struct ChatReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl ChatReply {
    pub fn new(status: u16, content_type: Option<String>, body: BodyStream) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    fn content_type_lowercase(&self) -> String {
        self.content_type
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// True when the body should be read incrementally instead of parsed as JSON.
    pub fn is_streaming(&self) -> bool {
        let content_type = self.content_type_lowercase();
        STREAMING_CONTENT_TYPES
            .iter()
            .any(|candidate| content_type.contains(candidate))
    }

    pub fn is_event_stream(&self) -> bool {
        self.content_type_lowercase().contains("text/event-stream")
    }

    /// Drains the body and parses it as the JSON compatibility object.
    pub async fn into_json(self) -> ClientResult<JsonReply> {
        let mut body = self.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        serde_json::from_slice(&buffer).context(DecodeJsonSnafu {
            stage: "parse-json-reply",
        })
    }
}

impl std::fmt::Debug for ChatReply {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChatReply")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Black-box chat backend: chat, upload and delete endpoints.
pub trait ChatBackend: Send + Sync {
    fn send_chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ClientResult<ChatReply>>;
    fn upload_documents<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, ClientResult<Vec<DocumentRef>>>;
    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, ClientResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn reply(content_type: Option<&str>, chunks: Vec<&'static str>) -> ChatReply {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes()))),
        )
        .boxed();
        ChatReply::new(200, content_type.map(str::to_string), body)
    }

    #[test]
    fn chat_request_serializes_camel_case_fields() {
        let request = ChatRequest::new("hi", vec!["doc-1".to_string()]);
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"message": "hi", "documentIds": ["doc-1"], "stream": true})
        );
    }

    #[test]
    fn streaming_detection_follows_content_type() {
        assert!(reply(Some("text/plain; charset=utf-8"), vec![]).is_streaming());
        assert!(reply(Some("Text/Event-Stream"), vec![]).is_event_stream());
        assert!(!reply(Some("application/json"), vec![]).is_streaming());
        assert!(!reply(None, vec![]).is_streaming());
    }

    #[tokio::test]
    async fn json_reply_is_assembled_across_chunks() {
        let reply = reply(
            Some("application/json"),
            vec!["{\"resp", "onse\": \"y\"}"],
        );
        let json = reply.into_json().await.expect("json");
        assert_eq!(json.response.as_deref(), Some("y"));
        assert_eq!(json.error, None);
    }

    #[tokio::test]
    async fn malformed_json_reports_decode_stage() {
        let error = reply(Some("application/json"), vec!["not json"])
            .into_json()
            .await
            .expect_err("malformed");
        assert_eq!(error.stage(), "parse-json-reply");
    }
}

use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use snafu::ResultExt;

use super::backend::{
    BodyReadSnafu, BoxFuture, BuildClientSnafu, ChatBackend, ChatReply, ChatRequest, ClientError,
    ClientResult, DecodeJsonSnafu, DocumentRef, HttpStatusSnafu, InvalidUploadSnafu,
    InvalidUrlSnafu, NetworkSnafu, UploadFile, UploadResponse,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_CHAT_PATH: &str = "/chat";
pub const DEFAULT_UPLOAD_PATH: &str = "/upload-documents";
pub const DEFAULT_DELETE_PATH: &str = "/delete-document";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Multipart field name repeated once per uploaded file.
const UPLOAD_FIELD_NAME: &str = "documents";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub chat_path: String,
    pub upload_path: String,
    pub delete_path: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout. `None` leaves a hung stream hanging.
    pub request_timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            delete_path: DEFAULT_DELETE_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
        }
    }

    pub fn with_paths(
        mut self,
        chat_path: impl Into<String>,
        upload_path: impl Into<String>,
        delete_path: impl Into<String>,
    ) -> Self {
        self.chat_path = chat_path.into();
        self.upload_path = upload_path.into();
        self.delete_path = delete_path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Delete endpoint with the id appended as one percent-encoded path
    /// segment.
    fn document_endpoint(&self, document_id: &str) -> ClientResult<Url> {
        let endpoint = self.endpoint(&self.delete_path);
        let mut url = match Url::parse(&endpoint) {
            Ok(url) => url,
            Err(error) => {
                return InvalidUrlSnafu {
                    stage: "build-delete-url",
                    url: endpoint,
                    message: error.to_string(),
                }
                .fail();
            }
        };

        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(document_id);
            }
            Err(()) => {
                return InvalidUrlSnafu {
                    stage: "build-delete-url",
                    url: endpoint,
                    message: "url cannot have path segments",
                }
                .fail();
            }
        }
        Ok(url)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// `reqwest` implementation of the chat backend contract.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(BuildClientSnafu {
            stage: "build-http-client",
        })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn ensure_success(
        response: reqwest::Response,
        stage: &'static str,
    ) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = status.as_u16(),
            stage,
            body_len = body.len(),
            "backend returned a non-success status"
        );
        HttpStatusSnafu {
            stage,
            status: status.as_u16(),
            body,
        }
        .fail()
    }

    fn body_read_error(error: reqwest::Error) -> ClientError {
        tracing::warn!(error = %error, "chat body read failed");
        BodyReadSnafu {
            stage: "read-chat-chunk",
            message: error.to_string(),
        }
        .build()
    }

    fn build_upload_form(files: Vec<UploadFile>) -> ClientResult<Form> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
            if let Some(content_type) = file.content_type.as_deref() {
                part = part.mime_str(content_type).context(InvalidUploadSnafu {
                    stage: "build-upload-part",
                    filename: file.filename.clone(),
                })?;
            }
            form = form.part(UPLOAD_FIELD_NAME, part);
        }
        Ok(form)
    }
}

impl ChatBackend for HttpBackend {
    fn send_chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ClientResult<ChatReply>> {
        Box::pin(async move {
            let url = self.config.endpoint(&self.config.chat_path);
            tracing::debug!(
                url = %url,
                document_count = request.document_ids.len(),
                stream = request.stream,
                "sending chat request"
            );

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .context(NetworkSnafu {
                    stage: "send-chat-request",
                })?;
            let response = Self::ensure_success(response, "chat-http-status").await?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(Self::body_read_error))
                .boxed();

            Ok(ChatReply::new(status, content_type, body))
        })
    }

    fn upload_documents<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, ClientResult<Vec<DocumentRef>>> {
        Box::pin(async move {
            let url = self.config.endpoint(&self.config.upload_path);
            let file_count = files.len();
            let form = Self::build_upload_form(files)?;

            let response = self
                .client
                .post(url)
                .multipart(form)
                .send()
                .await
                .context(NetworkSnafu {
                    stage: "send-upload-request",
                })?;
            let response = Self::ensure_success(response, "upload-http-status").await?;
            let payload = response.bytes().await.context(NetworkSnafu {
                stage: "read-upload-response",
            })?;
            let parsed: UploadResponse =
                serde_json::from_slice(&payload).context(DecodeJsonSnafu {
                    stage: "parse-upload-response",
                })?;

            tracing::info!(
                file_count,
                document_count = parsed.documents.len(),
                "uploaded documents"
            );
            Ok(parsed.documents)
        })
    }

    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            let url = self.config.document_endpoint(document_id)?;
            let response = self
                .client
                .delete(url)
                .send()
                .await
                .context(NetworkSnafu {
                    stage: "send-delete-request",
                })?;
            Self::ensure_success(response, "delete-http-status").await?;

            tracing::info!(document_id, "deleted document");
            Ok(())
        })
    }
}

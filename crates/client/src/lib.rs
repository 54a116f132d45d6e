use std::sync::Arc;

mod backend;
mod http;

pub use backend::{
    BodyStream, BoxFuture, ChatBackend, ChatReply, ChatRequest, ClientError, ClientResult,
    DocumentRef, JsonReply, UploadFile,
};
pub use http::{
    BackendConfig, DEFAULT_BASE_URL, DEFAULT_CHAT_PATH, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_DELETE_PATH, DEFAULT_UPLOAD_PATH, HttpBackend,
};

pub fn create_backend(config: BackendConfig) -> ClientResult<Arc<dyn ChatBackend>> {
    tracing::debug!(base_url = %config.base_url, "creating http chat backend");
    Ok(Arc::new(HttpBackend::new(config)?))
}

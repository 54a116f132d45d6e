//! Scripted backend shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;
use chatpane_client::{
    BodyStream, BoxFuture, ChatBackend, ChatReply, ChatRequest, ClientError, ClientResult,
    DocumentRef, UploadFile,
};
use futures::StreamExt;

pub(crate) enum ScriptedChat {
    Reply {
        content_type: &'static str,
        chunks: Vec<ClientResult<Bytes>>,
    },
    Fail(ClientError),
}

impl ScriptedChat {
    /// Plain-text body. The consumer detects framed or raw mode from the
    /// bytes.
    pub(crate) fn text_plain(chunks: &[&[u8]]) -> Self {
        Self::body("text/plain; charset=utf-8", chunks)
    }

    pub(crate) fn json(body: &str) -> Self {
        Self::body("application/json", &[body.as_bytes()])
    }

    pub(crate) fn body(content_type: &'static str, chunks: &[&[u8]]) -> Self {
        Self::Reply {
            content_type,
            chunks: chunks
                .iter()
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect(),
        }
    }
}

/// Chat backend replaying canned replies. Each body chunk is delivered after
/// a yield so concurrent consumers interleave.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    chats: Mutex<VecDeque<ScriptedChat>>,
    uploads: Mutex<VecDeque<ClientResult<Vec<DocumentRef>>>>,
    deletes: Mutex<VecDeque<ClientResult<()>>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    upload_batches: Mutex<Vec<Vec<String>>>,
    delete_requests: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_chat(self, chat: ScriptedChat) -> Self {
        lock(&self.chats).push_back(chat);
        self
    }

    pub(crate) fn with_upload(self, result: ClientResult<Vec<DocumentRef>>) -> Self {
        lock(&self.uploads).push_back(result);
        self
    }

    pub(crate) fn with_delete(self, result: ClientResult<()>) -> Self {
        lock(&self.deletes).push_back(result);
        self
    }

    pub(crate) fn chat_requests(&self) -> Vec<ChatRequest> {
        lock(&self.chat_requests).clone()
    }

    pub(crate) fn upload_batches(&self) -> Vec<Vec<String>> {
        lock(&self.upload_batches).clone()
    }

    pub(crate) fn delete_requests(&self) -> Vec<String> {
        lock(&self.delete_requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn http_status(status: u16) -> ClientError {
    ClientError::HttpStatus {
        stage: "scripted",
        status,
        body: String::new(),
    }
}

impl ChatBackend for ScriptedBackend {
    fn send_chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ClientResult<ChatReply>> {
        Box::pin(async move {
            lock(&self.chat_requests).push(request);
            let scripted = lock(&self.chats)
                .pop_front()
                .unwrap_or_else(|| ScriptedChat::Fail(http_status(500)));

            match scripted {
                ScriptedChat::Fail(error) => Err(error),
                ScriptedChat::Reply {
                    content_type,
                    chunks,
                } => {
                    let body: BodyStream = futures::stream::iter(chunks)
                        .then(|chunk| async move {
                            tokio::task::yield_now().await;
                            chunk
                        })
                        .boxed();
                    Ok(ChatReply::new(200, Some(content_type.to_string()), body))
                }
            }
        })
    }

    fn upload_documents<'a>(
        &'a self,
        files: Vec<UploadFile>,
    ) -> BoxFuture<'a, ClientResult<Vec<DocumentRef>>> {
        Box::pin(async move {
            lock(&self.upload_batches).push(files.into_iter().map(|file| file.filename).collect());
            lock(&self.uploads)
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            lock(&self.delete_requests).push(document_id.to_string());
            lock(&self.deletes).pop_front().unwrap_or(Ok(()))
        })
    }
}

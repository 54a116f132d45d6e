use std::rc::Rc;
use std::sync::Arc;

use chatpane_client::{ChatBackend, DocumentRef, UploadFile};
use snafu::ResultExt;

use crate::error::{ClientSnafu, WidgetResult};
use crate::session::SessionState;
use crate::surface::SharedSurface;

/// Uploads and deletes documents, keeping the session list and the chip
/// list in step.
pub struct AttachmentManager {
    backend: Arc<dyn ChatBackend>,
    session: Rc<SessionState>,
    surface: SharedSurface,
}

impl AttachmentManager {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        session: Rc<SessionState>,
        surface: SharedSurface,
    ) -> Self {
        Self {
            backend,
            session,
            surface,
        }
    }

    pub fn documents(&self) -> Vec<DocumentRef> {
        self.session.documents()
    }

    /// Sends all files in one request. Returned documents are appended to
    /// the session and shown as chips in server order.
    ///
    /// On failure an alert is raised and the session is left unchanged.
    pub async fn upload(&self, files: Vec<UploadFile>) -> WidgetResult<Vec<DocumentRef>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let file_count = files.len();
        tracing::info!(file_count, "uploading documents");

        let documents = match self.backend.upload_documents(files).await {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!(error = %error, stage = error.stage(), "document upload failed");
                self.surface
                    .borrow_mut()
                    .alert(&format!("Error uploading documents: {error}"));
                return Err(error).context(ClientSnafu { stage: "upload" });
            }
        };

        let added = self.session.add_documents(&documents);
        {
            let mut surface = self.surface.borrow_mut();
            for document in &added {
                surface.append_chip(document);
            }
        }

        tracing::info!(
            file_count,
            attached = added.len(),
            total = self.session.len(),
            "documents attached"
        );
        Ok(added)
    }

    /// Deletes one attached document. Returns `Ok(false)` without a request
    /// when the id is not attached.
    pub async fn delete(&self, document_id: &str) -> WidgetResult<bool> {
        if !self.session.contains(document_id) {
            tracing::debug!(document_id, "ignoring delete of unattached document");
            return Ok(false);
        }

        if let Err(error) = self.backend.delete_document(document_id).await {
            tracing::warn!(document_id, error = %error, "document delete failed");
            self.surface
                .borrow_mut()
                .alert(&format!("Error deleting document: {error}"));
            return Err(error).context(ClientSnafu { stage: "delete" });
        }

        self.session.remove_document(document_id);
        self.surface.borrow_mut().remove_chip(document_id);

        tracing::info!(document_id, remaining = self.session.len(), "document removed");
        Ok(true)
    }
}

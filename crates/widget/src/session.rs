use std::cell::RefCell;

use chatpane_client::DocumentRef;

/// Documents attached to the current conversation.
///
/// Readable by anyone holding the session; only the attachment manager
/// mutates it.
#[derive(Debug, Default)]
pub struct SessionState {
    documents: RefCell<Vec<DocumentRef>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<DocumentRef> {
        self.documents.borrow().clone()
    }

    /// Ids in attachment order, as sent with every chat request.
    pub fn document_ids(&self) -> Vec<String> {
        self.documents
            .borrow()
            .iter()
            .map(|document| document.id.clone())
            .collect()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.documents
            .borrow()
            .iter()
            .any(|document| document.id == document_id)
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    /// Appends documents not already present and returns the ones added.
    pub(crate) fn add_documents(&self, documents: &[DocumentRef]) -> Vec<DocumentRef> {
        let mut current = self.documents.borrow_mut();
        let mut added = Vec::with_capacity(documents.len());
        for document in documents {
            if current.iter().any(|existing| existing.id == document.id) {
                tracing::debug!(document_id = %document.id, "document already attached");
                continue;
            }
            current.push(document.clone());
            added.push(document.clone());
        }
        added
    }

    pub(crate) fn remove_document(&self, document_id: &str) -> bool {
        let mut current = self.documents.borrow_mut();
        let before = current.len();
        current.retain(|document| document.id != document_id);
        current.len() != before
    }
}

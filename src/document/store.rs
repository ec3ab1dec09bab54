//! Collection of open documents keyed by URI

use indexmap::IndexMap;
use lsp_types::{TextDocumentContentChangeEvent, TextDocumentItem, Url, VersionedTextDocumentIdentifier};
use tracing::debug;

use crate::document::buffer::Document;
use crate::document::error::DocumentError;

/// Receives every successful mutation of the store
pub trait DocumentListener {
    fn document_changed(&mut self, uri: &Url, document: &Document);

    fn document_closed(&mut self, uri: &Url);
}

/// Authoritative text of every document the client has opened
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: IndexMap<Url, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &mut self,
        item: TextDocumentItem,
        listener: &mut dyn DocumentListener,
    ) -> Result<(), DocumentError> {
        if self.documents.contains_key(&item.uri) {
            return Err(DocumentError::AlreadyOpen(item.uri));
        }

        debug!(
            "Opening {} ({}) at version {}",
            item.uri, item.language_id, item.version
        );
        let document = Document::new(item.text, item.version);
        let document = self.documents.entry(item.uri.clone()).or_insert(document);
        listener.document_changed(&item.uri, document);
        Ok(())
    }

    /// Applies `changes` in order. The version must increase; on any error
    /// the stored document is left as it was.
    pub fn change(
        &mut self,
        identifier: &VersionedTextDocumentIdentifier,
        changes: &[TextDocumentContentChangeEvent],
        listener: &mut dyn DocumentListener,
    ) -> Result<(), DocumentError> {
        let uri = &identifier.uri;
        let document = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::NotFound(uri.clone()))?;

        if identifier.version <= document.version() {
            return Err(DocumentError::StaleVersion {
                uri: uri.clone(),
                current: document.version(),
                received: identifier.version,
            });
        }

        document.apply_changes(identifier.version, changes)?;
        debug!(
            "Applied {} change(s) to {}, now at version {}",
            changes.len(),
            uri,
            identifier.version
        );
        listener.document_changed(uri, document);
        Ok(())
    }

    pub fn close(
        &mut self,
        uri: &Url,
        listener: &mut dyn DocumentListener,
    ) -> Result<(), DocumentError> {
        self.documents
            .shift_remove(uri)
            .ok_or_else(|| DocumentError::NotFound(uri.clone()))?;
        debug!("Closed {}", uri);
        listener.document_closed(uri);
        Ok(())
    }

    pub fn get(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// URIs in the order they were opened
    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

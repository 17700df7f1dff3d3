//! Generated content per remote document.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use declara_core::models::{DocumentKind, ProcessedDocument, RemoteDocumentId};
use declara_core::extract_applicant_name;

use crate::error::EngineError;

#[derive(Debug, Clone, Default)]
pub struct ProcessedDocuments {
    inner: Arc<Mutex<HashMap<RemoteDocumentId, ProcessedDocument>>>,
}

impl ProcessedDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document_id: &RemoteDocumentId) -> Option<ProcessedDocument> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
    }

    pub fn contains(&self, document_id: &RemoteDocumentId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(document_id)
    }

    /// Record a completed declaration and return the applicant name derived from it.
    ///
    /// A regenerated declaration overwrites the declaration fields and keeps any cover letter.
    pub fn store_declaration(
        &self,
        document_id: &RemoteDocumentId,
        file_name: &str,
        text: String,
        filename: Option<String>,
    ) -> String {
        let applicant_name = extract_applicant_name(&text);

        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(document_id) {
            Some(doc) => {
                doc.applicant_name = applicant_name.clone();
                doc.declaration_filename = filename;
                doc.set_content(DocumentKind::Declaration, text);
            }
            None => {
                map.insert(
                    document_id.clone(),
                    ProcessedDocument::new(file_name, applicant_name.clone(), text, filename),
                );
            }
        }

        applicant_name
    }

    /// Record a completed cover letter. Returns false if the document is gone.
    pub fn store_cover(
        &self,
        document_id: &RemoteDocumentId,
        text: String,
        filename: Option<String>,
    ) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(document_id) {
            Some(doc) => {
                doc.cover_letter_filename = filename;
                doc.set_content(DocumentKind::Cover, text);
                true
            }
            None => false,
        }
    }

    /// Overwrite one artifact with user-edited text.
    pub fn apply_edit(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        text: String,
    ) -> Result<(), EngineError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let doc = map
            .get_mut(document_id)
            .ok_or_else(|| EngineError::DocumentNotFound(document_id.clone()))?;

        if kind == DocumentKind::Cover && doc.cover_letter_content.is_none() {
            return Err(EngineError::ContentMissing {
                document_id: document_id.clone(),
                kind,
            });
        }

        doc.set_content(kind, text);
        Ok(())
    }

    pub fn remove(&self, document_id: &RemoteDocumentId) -> Option<ProcessedDocument> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_declaration_extracts_name() {
        let docs = ProcessedDocuments::new();
        let id = RemoteDocumentId::new("1");

        let name = docs.store_declaration(
            &id,
            "intake.pdf",
            "I, Maria Lopez, declare the following".to_string(),
            Some("declaration_1.docx".to_string()),
        );

        assert_eq!(name, "Maria Lopez");
        let doc = docs.get(&id).unwrap();
        assert_eq!(doc.file_name, "intake.pdf");
        assert_eq!(doc.cover_letter_content, None);
    }

    #[test]
    fn test_regenerated_declaration_keeps_cover() {
        let docs = ProcessedDocuments::new();
        let id = RemoteDocumentId::new("1");
        docs.store_declaration(&id, "a.pdf", "first".to_string(), None);
        assert!(docs.store_cover(&id, "cover".to_string(), None));

        docs.store_declaration(&id, "a.pdf", "second".to_string(), None);

        let doc = docs.get(&id).unwrap();
        assert_eq!(doc.declaration_content, "second");
        assert_eq!(doc.cover_letter_content.as_deref(), Some("cover"));
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_cover_without_declaration_is_dropped() {
        let docs = ProcessedDocuments::new();
        assert!(!docs.store_cover(&RemoteDocumentId::new("2"), "cover".to_string(), None));
        assert!(docs.is_empty());
    }

    #[test]
    fn test_apply_edit() {
        let docs = ProcessedDocuments::new();
        let id = RemoteDocumentId::new("1");
        docs.store_declaration(&id, "a.pdf", "draft".to_string(), None);

        docs.apply_edit(&id, DocumentKind::Declaration, "edited".to_string())
            .unwrap();
        assert_eq!(docs.get(&id).unwrap().declaration_content, "edited");

        assert!(matches!(
            docs.apply_edit(&id, DocumentKind::Cover, "x".to_string()),
            Err(EngineError::ContentMissing { .. })
        ));
        assert!(matches!(
            docs.apply_edit(&RemoteDocumentId::new("9"), DocumentKind::Declaration, "x".to_string()),
            Err(EngineError::DocumentNotFound(_))
        ));
    }
}

//! Document listing, updates and deletion.

use std::path::Path;
use tracing::info;

use crate::db::{Document, DocumentChanges};
use crate::error::{ServiceError, ServiceResult};
use crate::service::DocumentService;

impl DocumentService {
    /// Documents of a project visible to the user. Empty when the user has no access.
    pub fn get_documents_by_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> ServiceResult<Vec<Document>> {
        self.db.list_project_documents(project_id, user_id)
    }

    /// Apply a partial update and return the resulting document
    pub fn update_document(
        &self,
        document_id: i64,
        mut changes: DocumentChanges,
    ) -> ServiceResult<Document> {
        if let Some(name) = changes.name.take() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::validation("Document name cannot be empty"));
            }
            changes.name = Some(name.to_string());
        }

        if !self.db.update_document(document_id, &changes)? {
            return Err(ServiceError::DocumentNotFound { document_id });
        }

        if !changes.is_empty() {
            info!(document_id, "Document updated");
        }

        self.db
            .get_document(document_id)?
            .ok_or(ServiceError::DocumentNotFound { document_id })
    }

    /// Delete a document row and its stored file
    pub async fn delete_document(&self, document_id: i64) -> ServiceResult<()> {
        let document = self
            .db
            .get_document(document_id)?
            .ok_or(ServiceError::DocumentNotFound { document_id })?;

        if !self.db.delete_document(document_id)? {
            return Err(ServiceError::DocumentNotFound { document_id });
        }

        if let Some(file_path) = &document.file_path {
            self.files.remove(Path::new(file_path)).await;
        }

        metrics::counter!("thematic_documents_deleted_total").increment(1);
        info!(
            document_id,
            project_id = document.project_id,
            "Document deleted"
        );

        Ok(())
    }
}

//! Project and document access checks.

use std::sync::Arc;

use crate::db::{Database, Document, Project};
use crate::error::{ServiceError, ServiceResult};

/// Resolves whether a user may see or change project documents
pub struct PermissionChecker {
    db: Arc<Database>,
}

impl PermissionChecker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The user must own the project or be a member of it
    pub fn check_project_access(&self, user_id: i64, project_id: i64) -> ServiceResult<Project> {
        let project = self
            .db
            .get_project(project_id)?
            .ok_or(ServiceError::ProjectNotFound { project_id })?;

        if !self.db.has_project_access(project_id, user_id)? {
            return Err(ServiceError::forbidden("You do not have access to this project"));
        }

        Ok(project)
    }

    /// Resolve a document the user can read
    pub fn check_document_access(&self, user_id: i64, document_id: i64) -> ServiceResult<Document> {
        let document = self
            .db
            .get_document(document_id)?
            .ok_or(ServiceError::DocumentNotFound { document_id })?;

        if !self.db.has_project_access(document.project_id, user_id)? {
            return Err(ServiceError::forbidden(
                "You do not have access to this document",
            ));
        }

        Ok(document)
    }

    /// Resolve a document the user can modify: they uploaded it or own its project
    pub fn check_document_ownership(
        &self,
        user_id: i64,
        document_id: i64,
    ) -> ServiceResult<Document> {
        let document = self
            .db
            .get_document(document_id)?
            .ok_or(ServiceError::DocumentNotFound { document_id })?;

        if document.uploaded_by_id == user_id {
            return Ok(document);
        }

        let owns_project = self
            .db
            .get_project(document.project_id)?
            .is_some_and(|project| project.owner_id == user_id);
        if !owns_project {
            return Err(ServiceError::forbidden(
                "Only the uploader or the project owner can modify this document",
            ));
        }

        Ok(document)
    }
}

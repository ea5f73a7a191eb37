//! Document upload.

use tracing::{info, warn};

use crate::db::{Document, NewDocumentRecord};
use crate::error::{ServiceError, ServiceResult};
use crate::ingestion::structure_content;
use crate::service::{DocumentService, NewDocument};

impl DocumentService {
    /// Validate an upload, structure its content, store the file and record it
    pub async fn create_document(&self, upload: NewDocument) -> ServiceResult<Document> {
        let filename = upload.filename.clone();
        let result = self.store_document(upload).await;

        if let Err(e) = &result {
            metrics::counter!("thematic_document_upload_failures_total").increment(1);
            warn!(filename = %filename, error = %e, "Document upload failed");
        }

        result
    }

    async fn store_document(&self, upload: NewDocument) -> ServiceResult<Document> {
        let size = upload.file_content.len() as u64;
        if size == 0 {
            return Err(ServiceError::validation("Uploaded file is empty"));
        }
        let max_size = self.uploads.max_document_size_bytes;
        if size > max_size {
            return Err(ServiceError::validation(format!(
                "File size {} bytes exceeds the maximum of {} bytes",
                size, max_size
            )));
        }

        let name = upload
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(upload.filename.trim())
            .to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Document name cannot be empty"));
        }

        if self.db.get_project(upload.project_id)?.is_none() {
            return Err(ServiceError::ProjectNotFound {
                project_id: upload.project_id,
            });
        }

        let content = structure_content(
            upload.document_type,
            &upload.filename,
            &upload.file_content,
            max_size,
        )?;

        let stored = self
            .files
            .save(upload.project_id, &upload.filename, &upload.file_content)
            .await?;

        let record = NewDocumentRecord {
            project_id: upload.project_id,
            name,
            description: upload.description,
            document_type: upload.document_type,
            content,
            file_path: Some(stored.path.to_string_lossy().to_string()),
            file_size: stored.size,
            file_hash: Some(stored.hash),
            uploaded_by_id: upload.uploaded_by_id,
        };

        let document = match self.db.insert_document(&record) {
            Ok(document) => document,
            Err(e) => {
                self.files.remove(&stored.path).await;
                return Err(e);
            }
        };

        metrics::counter!(
            "thematic_documents_uploaded_total",
            "document_type" => document.document_type.to_string()
        )
        .increment(1);

        info!(
            document_id = document.id,
            project_id = document.project_id,
            document_type = %document.document_type,
            size = document.file_size,
            "Document uploaded"
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::db::{Database, DocumentType};
    use crate::service::test_support::{service_in, text_upload};
    use serde_json::json;
    use std::sync::Arc;

    fn stored_files(dir: &std::path::Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { stored_files(&path) } else { 1 }
            })
            .sum()
    }

    #[tokio::test]
    async fn test_create_text_document() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = service_in(dir.path());
        let user = db.insert_user("ana", None).unwrap();
        let project = db.insert_project("Study", None, user.id).unwrap();

        let document = service
            .create_document(text_upload(
                project.id,
                user.id,
                "interview.txt",
                "Q: Hello?\n\nA: Hi.",
            ))
            .await
            .unwrap();

        assert_eq!(document.name, "interview.txt");
        assert_eq!(document.document_type, DocumentType::Text);
        assert_eq!(document.content.unwrap()["paragraphs"], json!(["Q: Hello?", "A: Hi."]));
        assert_eq!(document.file_size, 17);
        assert_eq!(document.file_hash.unwrap().len(), 64);

        let path = document.file_path.unwrap();
        assert!(path.starts_with(&dir.path().join("documents").to_string_lossy().to_string()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Q: Hello?\n\nA: Hi.");
    }

    #[tokio::test]
    async fn test_explicit_name_wins_over_filename() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = service_in(dir.path());
        let user = db.insert_user("ana", None).unwrap();
        let project = db.insert_project("Study", None, user.id).unwrap();

        let mut upload = text_upload(project.id, user.id, "survey.csv", "q1,q2\nyes,no\n");
        upload.name = Some("  Pilot survey ".to_string());
        upload.description = Some("First wave".to_string());

        let document = service.create_document(upload).await.unwrap();
        assert_eq!(document.name, "Pilot survey");
        assert_eq!(document.description.as_deref(), Some("First wave"));
        assert_eq!(document.document_type, DocumentType::Csv);
        assert_eq!(document.content.unwrap()["row_count"], json!(1));
    }

    #[tokio::test]
    async fn test_validation_failures_store_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = service_in(dir.path());
        let user = db.insert_user("ana", None).unwrap();
        let project = db.insert_project("Study", None, user.id).unwrap();

        let err = service
            .create_document(text_upload(project.id, user.id, "empty.txt", ""))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Uploaded file is empty");

        let err = service
            .create_document(text_upload(project.id, user.id, "broken.csv", "a,\"b\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .create_document(text_upload(project.id, user.id, "scan.pdf", "not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .create_document(text_upload(999, user.id, "notes.txt", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ProjectNotFound { project_id: 999 }));

        assert_eq!(stored_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut config = ServiceConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.uploads.max_document_size_bytes = 4;
        let service = DocumentService::new(db.clone(), &config);

        let user = db.insert_user("ana", None).unwrap();
        let project = db.insert_project("Study", None, user.id).unwrap();

        assert!(
            service
                .create_document(text_upload(project.id, user.id, "a.txt", "four"))
                .await
                .is_ok()
        );
        let err = service
            .create_document(text_upload(project.id, user.id, "b.txt", "five!"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = service_in(dir.path());
        let user = db.insert_user("ana", None).unwrap();
        let project = db.insert_project("Study", None, user.id).unwrap();

        // Unknown uploader violates the foreign key on insert
        let err = service
            .create_document(text_upload(project.id, 424242, "notes.txt", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Database(_)));
        assert_eq!(stored_files(dir.path()), 0);
    }
}

//! Document workflows behind the HTTP API.
//!
//! - Upload: validation, content structuring, file storage and persistence
//! - CRUD: listing, partial updates and deletion

mod crud;
mod upload;

use bytes::Bytes;
use std::sync::Arc;

use crate::config::{ServiceConfig, UploadsConfig};
use crate::db::{Database, DocumentType};
use crate::storage::FileStore;

/// A document upload as received from a client
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub project_id: i64,
    /// Display name; the uploaded filename is used when absent
    pub name: Option<String>,
    pub description: Option<String>,
    pub document_type: DocumentType,
    pub uploaded_by_id: i64,
    pub filename: String,
    pub file_content: Bytes,
}

/// Coordinates the database, ingestion and file storage for documents
pub struct DocumentService {
    db: Arc<Database>,
    uploads: UploadsConfig,
    files: FileStore,
}

impl DocumentService {
    pub fn new(db: Arc<Database>, config: &ServiceConfig) -> Self {
        Self {
            db,
            uploads: config.uploads.clone(),
            files: FileStore::new(config.storage.documents_dir()),
        }
    }

    pub fn uploads(&self) -> &UploadsConfig {
        &self.uploads
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::Path;

    /// A service over an in-memory database with files stored under `data_dir`
    pub fn service_in(data_dir: &Path) -> (Arc<Database>, DocumentService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut config = ServiceConfig::default();
        config.storage.data_dir = data_dir.to_path_buf();
        let service = DocumentService::new(db.clone(), &config);
        (db, service)
    }

    pub fn text_upload(project_id: i64, uploaded_by_id: i64, filename: &str, body: &str) -> NewDocument {
        NewDocument {
            project_id,
            name: None,
            description: None,
            document_type: DocumentType::from_filename(filename),
            uploaded_by_id,
            filename: filename.to_string(),
            file_content: Bytes::from(body.to_string()),
        }
    }
}

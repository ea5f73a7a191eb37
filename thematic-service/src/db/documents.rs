//! Document CRUD operations.
//!
//! This module contains all document-related database operations including
//! insert, get, list by project, partial update and delete.

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use super::Database;
use super::models::{DOCUMENT_COLUMNS, Document, DocumentChanges, NewDocumentRecord};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

impl Database {
    /// Insert a new document and return the stored record
    pub fn insert_document(&self, doc: &NewDocumentRecord) -> ServiceResult<Document> {
        let content_json = doc
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(DatabaseError::Serialization)?;
        let now = super::now_rfc3339();

        let id = {
            let conn = self.conn();
            conn.execute(
                r#"
                INSERT INTO documents (project_id, name, description, document_type, content, file_path, file_size, file_hash, uploaded_by_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                "#,
                params![
                    doc.project_id,
                    doc.name,
                    doc.description,
                    doc.document_type.as_ref(),
                    content_json,
                    doc.file_path,
                    doc.file_size as i64,
                    doc.file_hash,
                    doc.uploaded_by_id,
                    now,
                ],
            )
            .map_err(DatabaseError::Query)?;
            conn.last_insert_rowid()
        };

        self.get_document(id)?
            .ok_or(ServiceError::DocumentNotFound { document_id: id })
    }

    /// Get a document by ID
    pub fn get_document(&self, id: i64) -> ServiceResult<Option<Document>> {
        let conn = self.conn();

        conn.query_row(
            &format!("SELECT {} FROM documents d WHERE d.id = ?1", DOCUMENT_COLUMNS),
            params![id],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List a project's documents, provided the user owns or belongs to the project
    pub fn list_project_documents(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> ServiceResult<Vec<Document>> {
        let conn = self.conn();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents d \
                 JOIN projects p ON p.id = d.project_id \
                 WHERE d.project_id = ?1 AND (p.owner_id = ?2 OR EXISTS ( \
                     SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ?2)) \
                 ORDER BY d.created_at, d.id",
                DOCUMENT_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![project_id, user_id], Document::from_row)
            .map_err(DatabaseError::Query)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(docs)
    }

    /// Apply a partial update. Returns false if the document does not exist.
    ///
    /// An empty change set touches nothing, not even `updated_at`.
    pub fn update_document(&self, id: i64, changes: &DocumentChanges) -> ServiceResult<bool> {
        let conn = self.conn();

        if changes.is_empty() {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(DatabaseError::Query)?;
            return Ok(count > 0);
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(name) = &changes.name {
            assignments.push("name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(description) = &changes.description {
            assignments.push("description = ?");
            values.push(description.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if let Some(content) = &changes.content {
            assignments.push("content = ?");
            let content_json = content
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(DatabaseError::Serialization)?;
            values.push(content_json.map(Value::Text).unwrap_or(Value::Null));
        }
        assignments.push("updated_at = ?");
        values.push(Value::Text(super::now_rfc3339()));
        values.push(Value::Integer(id));

        let rows = conn
            .execute(
                &format!(
                    "UPDATE documents SET {} WHERE id = ?",
                    assignments.join(", ")
                ),
                params_from_iter(values),
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Delete a document. Segments, quotes and quote codes cascade.
    pub fn delete_document(&self, id: i64) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }
}

//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{AsRefStr, Display, EnumString};

/// Classification of an uploaded file, driving how its content is structured
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DocumentType {
    Pdf,
    Docx,
    /// Tabular uploads: `.csv`, `.xlsx` and `.xls`
    Csv,
    /// Anything not recognised by extension
    Text,
}

impl DocumentType {
    /// Infer the document type from a filename's extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => DocumentType::Pdf,
            "docx" => DocumentType::Docx,
            "csv" | "xlsx" | "xls" => DocumentType::Csv,
            _ => DocumentType::Text,
        }
    }
}

/// Document record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub document_type: DocumentType,
    /// Structured content produced at upload time, if the type supports it
    pub content: Option<serde_json::Value>,
    pub file_path: Option<String>,
    pub file_size: u64,
    pub file_hash: Option<String>,
    pub uploaded_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching `Document::from_row`
pub(crate) const DOCUMENT_COLUMNS: &str = "d.id, d.project_id, d.name, d.description, d.document_type, d.content, \
     d.file_path, d.file_size, d.file_hash, d.uploaded_by_id, d.created_at, d.updated_at";

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let document_type_str: String = row.get(4)?;
        let content_str: Option<String> = row.get(5)?;
        let file_size: i64 = row.get(7)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let document_type = document_type_str
            .parse::<DocumentType>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        let content = content_str
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            document_type,
            content,
            file_path: row.get(6)?,
            file_size: file_size.max(0) as u64,
            file_hash: row.get(8)?,
            uploaded_by_id: row.get(9)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Values needed to insert a document row
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub document_type: DocumentType,
    pub content: Option<serde_json::Value>,
    pub file_path: Option<String>,
    pub file_size: u64,
    pub file_hash: Option<String>,
    pub uploaded_by_id: i64,
}

/// Partial update of a document. `None` leaves a field untouched;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub content: Option<Option<serde_json::Value>>,
}

impl DocumentChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.content.is_none()
    }
}

/// User record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
}

/// Project record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(4)?;

        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            owner_id: row.get(3)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

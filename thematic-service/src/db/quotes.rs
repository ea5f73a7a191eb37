//! Segments, quotes and the codes attached to them.
//!
//! Quote coding has no HTTP surface; these helpers seed rows for the
//! constraint and cascade tests of the schema.

use rusqlite::params;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

/// A slice of a document's text that quotes are taken from
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: i64,
    pub document_id: i64,
    pub text: String,
    pub position: i64,
}

/// Tagging label applied to quotes within a project
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Quote record
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub id: i64,
    pub segment_id: i64,
    pub text: String,
    pub start_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub created_by_id: Option<i64>,
}

impl Database {
    /// Insert a segment of a document's text
    pub fn insert_segment(
        &self,
        document_id: i64,
        text: &str,
        position: i64,
    ) -> ServiceResult<Segment> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO segments (document_id, text, position) VALUES (?1, ?2, ?3)",
            params![document_id, text, position],
        )
        .map_err(DatabaseError::Query)?;

        Ok(Segment {
            id: conn.last_insert_rowid(),
            document_id,
            text: text.to_string(),
            position,
        })
    }

    /// Insert a code within a project
    pub fn insert_code(
        &self,
        project_id: i64,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
        created_by_id: Option<i64>,
    ) -> ServiceResult<Code> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO codes (project_id, name, description, color, created_by_id) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, name, description, color, created_by_id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(Code {
            id: conn.last_insert_rowid(),
            project_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            color: color.map(str::to_string),
        })
    }

    /// Insert a quote taken from a segment
    pub fn insert_quote(
        &self,
        segment_id: i64,
        text: &str,
        offsets: Option<(i64, i64)>,
        created_by_id: Option<i64>,
    ) -> ServiceResult<Quote> {
        let conn = self.conn();
        let (start_offset, end_offset) = offsets.unzip();

        conn.execute(
            "INSERT INTO quotes (segment_id, text, start_offset, end_offset, created_by_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                segment_id,
                text,
                start_offset,
                end_offset,
                created_by_id,
                super::now_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(Quote {
            id: conn.last_insert_rowid(),
            segment_id,
            text: text.to_string(),
            start_offset,
            end_offset,
            created_by_id,
        })
    }

    /// Attach a code to a quote. Attaching twice is a no-op.
    pub fn add_code_to_quote(&self, quote_id: i64, code_id: i64) -> ServiceResult<()> {
        let conn = self.conn();

        conn.execute(
            "INSERT OR IGNORE INTO quote_codes (quote_id, code_id) VALUES (?1, ?2)",
            params![quote_id, code_id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Codes attached to a quote, ordered by name
    pub fn codes_for_quote(&self, quote_id: i64) -> ServiceResult<Vec<Code>> {
        let conn = self.conn();

        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.project_id, c.name, c.description, c.color FROM codes c \
                 JOIN quote_codes qc ON qc.code_id = c.id \
                 WHERE qc.quote_id = ?1 ORDER BY c.name",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![quote_id], |row| {
                Ok(Code {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    color: row.get(4)?,
                })
            })
            .map_err(DatabaseError::Query)?;

        let mut codes = Vec::new();
        for row in rows {
            codes.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentType, NewDocumentRecord};

    struct Fixture {
        db: Database,
        project_id: i64,
        document_id: i64,
        user_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user("coder", None).unwrap();
        let project = db.insert_project("Interviews", None, user.id).unwrap();
        let document = db
            .insert_document(&NewDocumentRecord {
                project_id: project.id,
                name: "transcript".to_string(),
                description: None,
                document_type: DocumentType::Text,
                content: None,
                file_path: None,
                file_size: 0,
                file_hash: None,
                uploaded_by_id: user.id,
            })
            .unwrap();

        Fixture {
            db,
            project_id: project.id,
            document_id: document.id,
            user_id: user.id,
        }
    }

    #[test]
    fn test_codes_attach_to_quotes() {
        let f = fixture();
        let segment = f.db.insert_segment(f.document_id, "I felt unheard", 0).unwrap();
        let quote = f
            .db
            .insert_quote(segment.id, "unheard", Some((7, 14)), Some(f.user_id))
            .unwrap();
        let isolation = f
            .db
            .insert_code(f.project_id, "isolation", None, Some("#aa3355"), None)
            .unwrap();
        let voice = f
            .db
            .insert_code(f.project_id, "voice", Some("being listened to"), None, None)
            .unwrap();

        f.db.add_code_to_quote(quote.id, voice.id).unwrap();
        f.db.add_code_to_quote(quote.id, isolation.id).unwrap();
        f.db.add_code_to_quote(quote.id, isolation.id).unwrap();

        let codes = f.db.codes_for_quote(quote.id).unwrap();
        assert_eq!(codes, vec![isolation, voice]);
    }

    #[test]
    fn test_quote_codes_require_existing_quote_and_code() {
        let f = fixture();
        let segment = f.db.insert_segment(f.document_id, "text", 0).unwrap();
        let quote = f.db.insert_quote(segment.id, "text", None, None).unwrap();
        let code = f
            .db
            .insert_code(f.project_id, "theme", None, None, None)
            .unwrap();

        assert!(f.db.add_code_to_quote(quote.id, code.id + 100).is_err());
        assert!(f.db.add_code_to_quote(quote.id + 100, code.id).is_err());
        assert!(f.db.codes_for_quote(quote.id).unwrap().is_empty());
    }

    #[test]
    fn test_quote_requires_segment() {
        let f = fixture();

        assert!(f.db.insert_quote(424242, "dangling", None, None).is_err());

        let conn = f.db.conn();
        let result = conn.execute(
            "INSERT INTO quotes (segment_id, text) VALUES (NULL, 'orphan')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deleting_document_cascades_to_coded_quotes() {
        let f = fixture();
        let segment = f.db.insert_segment(f.document_id, "text", 0).unwrap();
        let quote = f.db.insert_quote(segment.id, "text", None, None).unwrap();
        let code = f
            .db
            .insert_code(f.project_id, "theme", None, None, None)
            .unwrap();
        f.db.add_code_to_quote(quote.id, code.id).unwrap();

        assert!(f.db.delete_document(f.document_id).unwrap());
        assert!(f.db.codes_for_quote(quote.id).unwrap().is_empty());

        let conn = f.db.conn();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}

//! Database schema migrations.
//!
//! The schema evolves through a strict linear chain of revisions. Each
//! revision names the revision it replaces and carries an upgrade and a
//! downgrade step. The applied revision is recorded in `schema_revision`;
//! an empty table means the database is at base.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::MigrationError;

/// A single reversible schema change
pub struct Revision {
    pub id: &'static str,
    pub down_revision: Option<&'static str>,
    pub description: &'static str,
    upgrade: fn(&Connection) -> rusqlite::Result<()>,
    downgrade: fn(&Connection) -> rusqlite::Result<()>,
}

/// The revision chain, oldest first
pub static REVISIONS: &[Revision] = &[
    Revision {
        id: "62282e1dbcba",
        down_revision: None,
        description: "initial schema",
        upgrade: upgrade_initial_schema,
        downgrade: downgrade_initial_schema,
    },
    Revision {
        id: "0042d143b73e",
        down_revision: Some("62282e1dbcba"),
        description: "restructure document content fields",
        upgrade: upgrade_restructure_document_content,
        downgrade: downgrade_restructure_document_content,
    },
    Revision {
        id: "d647b19592de",
        down_revision: Some("0042d143b73e"),
        description: "add quote_codes association table",
        upgrade: upgrade_quote_codes,
        downgrade: downgrade_quote_codes,
    },
    Revision {
        id: "b5ab181acf38",
        down_revision: Some("d647b19592de"),
        description: "remove raw_content column",
        upgrade: upgrade_remove_raw_content,
        downgrade: downgrade_remove_raw_content,
    },
];

#[derive(Debug, Clone, Copy)]
enum Direction {
    Upgrade,
    Downgrade,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Upgrade => "upgrade",
            Direction::Downgrade => "downgrade",
        }
    }
}

/// The newest revision in the chain
pub fn head() -> &'static str {
    REVISIONS.last().map(|r| r.id).unwrap_or("base")
}

/// The ordered chain, oldest first
pub fn history() -> &'static [Revision] {
    REVISIONS
}

/// Check that every revision revises the one before it and ids are unique
pub fn validate_chain(revisions: &[Revision]) -> Result<(), MigrationError> {
    let mut expected: Option<&str> = None;
    for (idx, revision) in revisions.iter().enumerate() {
        if revision.down_revision != expected {
            return Err(MigrationError::BrokenChain {
                revision: revision.id.to_string(),
                expected: expected.map(str::to_string),
                found: revision.down_revision.map(str::to_string),
            });
        }
        if revisions[..idx].iter().any(|r| r.id == revision.id) {
            return Err(MigrationError::BrokenChain {
                revision: revision.id.to_string(),
                expected: expected.map(str::to_string),
                found: Some(revision.id.to_string()),
            });
        }
        expected = Some(revision.id);
    }
    Ok(())
}

/// Read the applied revision. `None` means base.
pub fn current_revision(conn: &Connection) -> Result<Option<String>, MigrationError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_revision (revision TEXT NOT NULL)")
        .map_err(MigrationError::Bookkeeping)?;

    conn.query_row("SELECT revision FROM schema_revision LIMIT 1", [], |row| {
        row.get(0)
    })
    .optional()
    .map_err(MigrationError::Bookkeeping)
}

/// Apply upgrade steps from the current revision up to `target` (head when `None`).
///
/// Returns the ids of the revisions applied, in order.
pub fn upgrade(conn: &Connection, target: Option<&str>) -> Result<Vec<&'static str>, MigrationError> {
    validate_chain(REVISIONS)?;

    let current = current_revision(conn)?;
    let start = match current.as_deref() {
        None => 0,
        Some(id) => position(id)? + 1,
    };
    let end = match target {
        None => REVISIONS.len(),
        Some(id) => position(id)? + 1,
    };

    if end < start {
        return Err(MigrationError::InvalidTarget {
            direction: Direction::Upgrade.as_str(),
            current: current.unwrap_or_else(|| "base".to_string()),
            target: target.unwrap_or("head").to_string(),
        });
    }

    let mut applied = Vec::new();
    for revision in &REVISIONS[start..end] {
        apply(conn, revision, Direction::Upgrade)?;
        applied.push(revision.id);
    }
    Ok(applied)
}

/// Apply downgrade steps from the current revision down to `target` (base when `None`).
///
/// Returns the ids of the revisions reverted, newest first.
pub fn downgrade(
    conn: &Connection,
    target: Option<&str>,
) -> Result<Vec<&'static str>, MigrationError> {
    validate_chain(REVISIONS)?;

    let current = current_revision(conn)?;
    let target_idx = target.map(position).transpose()?;

    let Some(current_id) = current.as_deref() else {
        return match target {
            None => Ok(Vec::new()),
            Some(target) => Err(MigrationError::InvalidTarget {
                direction: Direction::Downgrade.as_str(),
                current: "base".to_string(),
                target: target.to_string(),
            }),
        };
    };
    let current_idx = position(current_id)?;

    // Revisions strictly above the target are reverted
    let stop = target_idx.map(|idx| idx + 1).unwrap_or(0);
    if stop > current_idx + 1 {
        return Err(MigrationError::InvalidTarget {
            direction: Direction::Downgrade.as_str(),
            current: current_id.to_string(),
            target: target.unwrap_or("base").to_string(),
        });
    }

    let mut reverted = Vec::new();
    for revision in REVISIONS[stop..=current_idx].iter().rev() {
        apply(conn, revision, Direction::Downgrade)?;
        reverted.push(revision.id);
    }
    Ok(reverted)
}

fn position(id: &str) -> Result<usize, MigrationError> {
    REVISIONS
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| MigrationError::UnknownRevision {
            revision: id.to_string(),
        })
}

/// Run one step and its bookkeeping in a single transaction
fn apply(conn: &Connection, revision: &Revision, direction: Direction) -> Result<(), MigrationError> {
    let step_error = |source| MigrationError::Step {
        revision: revision.id.to_string(),
        direction: direction.as_str(),
        source,
    };

    let tx = conn.unchecked_transaction().map_err(step_error)?;

    let (step, recorded) = match direction {
        Direction::Upgrade => (revision.upgrade, Some(revision.id)),
        Direction::Downgrade => (revision.downgrade, revision.down_revision),
    };
    step(&tx).map_err(step_error)?;
    set_revision(&tx, recorded).map_err(step_error)?;
    tx.commit().map_err(step_error)?;

    info!(
        revision = revision.id,
        direction = direction.as_str(),
        description = revision.description,
        "Schema revision applied"
    );
    Ok(())
}

fn set_revision(conn: &Connection, revision: Option<&str>) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_revision", [])?;
    if let Some(revision) = revision {
        conn.execute(
            "INSERT INTO schema_revision (revision) VALUES (?1)",
            params![revision],
        )?;
    }
    Ok(())
}

// ==================== 62282e1dbcba: initial schema ====================

fn upgrade_initial_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            owner_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY (owner_id) REFERENCES users(id)
        );

        -- Project membership (many-to-many)
        CREATE TABLE project_members (
            project_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            PRIMARY KEY (project_id, user_id),
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            document_type TEXT NOT NULL,
            content TEXT,
            file_path TEXT,
            file_size INTEGER NOT NULL DEFAULT 0,
            file_hash TEXT,
            uploaded_by_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (uploaded_by_id) REFERENCES users(id)
        );

        CREATE INDEX idx_documents_project ON documents(project_id);

        CREATE TABLE segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_segments_document ON segments(document_id);

        CREATE TABLE codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            color TEXT,
            created_by_id INTEGER,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (created_by_id) REFERENCES users(id)
        );

        CREATE TABLE quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            segment_id INTEGER,
            text TEXT NOT NULL,
            start_offset INTEGER,
            end_offset INTEGER,
            created_by_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY (segment_id) REFERENCES segments(id) ON DELETE CASCADE,
            FOREIGN KEY (created_by_id) REFERENCES users(id)
        );

        CREATE INDEX idx_quotes_segment ON quotes(segment_id);
        "#,
    )
}

fn downgrade_initial_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE quotes;
        DROP TABLE codes;
        DROP TABLE segments;
        DROP TABLE documents;
        DROP TABLE project_members;
        DROP TABLE projects;
        DROP TABLE users;
        "#,
    )
}

// ==================== 0042d143b73e: document content becomes JSON ====================

fn upgrade_restructure_document_content(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE documents ADD COLUMN raw_content TEXT;

        UPDATE documents SET raw_content = content WHERE content IS NOT NULL;

        ALTER TABLE documents DROP COLUMN content;
        ALTER TABLE documents ADD COLUMN content JSON;
        "#,
    )
}

fn downgrade_restructure_document_content(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE documents DROP COLUMN content;
        ALTER TABLE documents ADD COLUMN content TEXT;

        UPDATE documents SET content = raw_content WHERE raw_content IS NOT NULL;

        ALTER TABLE documents DROP COLUMN raw_content;
        "#,
    )
}

// ==================== d647b19592de: quote_codes and required segments ====================

fn upgrade_quote_codes(conn: &Connection) -> rusqlite::Result<()> {
    // SQLite cannot change nullability in place, so quotes is rebuilt.
    // Rows with a NULL segment_id make the copy fail and the step roll back.
    conn.execute_batch(
        r#"
        CREATE TABLE quotes_new (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            segment_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER,
            end_offset INTEGER,
            created_by_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY (segment_id) REFERENCES segments(id) ON DELETE CASCADE,
            FOREIGN KEY (created_by_id) REFERENCES users(id)
        );

        INSERT INTO quotes_new (id, segment_id, text, start_offset, end_offset, created_by_id, created_at)
        SELECT id, segment_id, text, start_offset, end_offset, created_by_id, created_at
        FROM quotes;

        DROP TABLE quotes;
        ALTER TABLE quotes_new RENAME TO quotes;
        CREATE INDEX idx_quotes_segment ON quotes(segment_id);

        CREATE TABLE quote_codes (
            quote_id INTEGER NOT NULL,
            code_id INTEGER NOT NULL,
            PRIMARY KEY (quote_id, code_id),
            FOREIGN KEY (code_id) REFERENCES codes(id) ON DELETE CASCADE,
            FOREIGN KEY (quote_id) REFERENCES quotes(id) ON DELETE CASCADE
        );
        "#,
    )
}

fn downgrade_quote_codes(conn: &Connection) -> rusqlite::Result<()> {
    // quote_codes references quotes, so it goes before the rebuild
    conn.execute_batch(
        r#"
        DROP TABLE quote_codes;

        CREATE TABLE quotes_old (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            segment_id INTEGER,
            text TEXT NOT NULL,
            start_offset INTEGER,
            end_offset INTEGER,
            created_by_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY (segment_id) REFERENCES segments(id) ON DELETE CASCADE,
            FOREIGN KEY (created_by_id) REFERENCES users(id)
        );

        INSERT INTO quotes_old (id, segment_id, text, start_offset, end_offset, created_by_id, created_at)
        SELECT id, segment_id, text, start_offset, end_offset, created_by_id, created_at
        FROM quotes;

        DROP TABLE quotes;
        ALTER TABLE quotes_old RENAME TO quotes;
        CREATE INDEX idx_quotes_segment ON quotes(segment_id);
        "#,
    )
}

// ==================== b5ab181acf38: drop raw_content ====================

fn upgrade_remove_raw_content(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE documents DROP COLUMN raw_content;")
}

/// Restores the column only. Whatever `raw_content` held before the upgrade is gone.
fn downgrade_remove_raw_content(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE documents ADD COLUMN raw_content TEXT;")
}

//! Users, projects and project membership.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{Project, User};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a user and return it
    pub fn insert_user(&self, username: &str, email: Option<&str>) -> ServiceResult<User> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO users (username, email) VALUES (?1, ?2)",
            params![username, email],
        )
        .map_err(DatabaseError::Query)?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.map(str::to_string),
        })
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> ServiceResult<Option<User>> {
        let conn = self.conn();

        conn.query_row(
            "SELECT id, username, email FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Insert a project owned by `owner_id`
    pub fn insert_project(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> ServiceResult<Project> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO projects (name, description, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, description, owner_id, super::now_rfc3339()],
            )
            .map_err(DatabaseError::Query)?;
            conn.last_insert_rowid()
        };

        self.get_project(id)?
            .ok_or(crate::error::ServiceError::ProjectNotFound { project_id: id })
    }

    /// Get a project by ID
    pub fn get_project(&self, id: i64) -> ServiceResult<Option<Project>> {
        let conn = self.conn();

        conn.query_row(
            "SELECT id, name, description, owner_id, created_at FROM projects WHERE id = ?1",
            params![id],
            Project::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Add a user to a project. Adding an existing member is a no-op.
    pub fn add_project_member(&self, project_id: i64, user_id: i64) -> ServiceResult<()> {
        let conn = self.conn();

        conn.execute(
            "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?1, ?2)",
            params![project_id, user_id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Whether the user owns the project or is one of its members
    pub fn has_project_access(&self, project_id: i64, user_id: i64) -> ServiceResult<bool> {
        let conn = self.conn();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM projects p \
                 WHERE p.id = ?1 AND (p.owner_id = ?2 OR EXISTS ( \
                     SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ?2))",
                params![project_id, user_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_access_for_owner_and_members() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.insert_user("owner", None).unwrap();
        let member = db.insert_user("member", Some("m@example.org")).unwrap();
        let outsider = db.insert_user("outsider", None).unwrap();
        let project = db.insert_project("Interviews", None, owner.id).unwrap();
        db.add_project_member(project.id, member.id).unwrap();
        db.add_project_member(project.id, member.id).unwrap();

        assert!(db.has_project_access(project.id, owner.id).unwrap());
        assert!(db.has_project_access(project.id, member.id).unwrap());
        assert!(!db.has_project_access(project.id, outsider.id).unwrap());
        assert!(!db.has_project_access(project.id + 1, owner.id).unwrap());
    }

    #[test]
    fn test_get_user_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user("ana", Some("ana@example.org")).unwrap();

        assert_eq!(db.get_user(user.id).unwrap(), Some(user));
        assert_eq!(db.get_user(999).unwrap(), None);
    }
}

use crate::Database;
use crate::models::{CaptureRow, PhotoRow, UserRow, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use fieldlog_types::models::{Capture, CaptureStatus};
use rusqlite::{Connection, Row};

const CAPTURE_COLUMNS: &str =
    "id, user_id, title, description, data, status, created_at, updated_at";

impl Database {
    // -- Users --

    /// Returns false when the email is already registered. The unique index
    /// decides, so concurrent registrations cannot both succeed.
    pub fn create_user(&self, row: &UserRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, display_name, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                (&row.id, &row.email, &row.display_name, &row.password, &row.created_at),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Captures --

    pub fn insert_capture(&self, capture: &Capture) -> Result<()> {
        let data = serde_json::to_string(&capture.data)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO captures (id, user_id, title, description, data, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    capture.id.to_string(),
                    capture.user_id.to_string(),
                    capture.title,
                    capture.description,
                    data,
                    capture.status.as_str(),
                    format_timestamp(capture.created_at),
                    format_timestamp(capture.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    /// All captures owned by `user_id`, newest first.
    pub fn list_captures(&self, user_id: &str) -> Result<Vec<CaptureRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAPTURE_COLUMNS} FROM captures
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], capture_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_capture(&self, user_id: &str, id: &str) -> Result<Option<CaptureRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAPTURE_COLUMNS} FROM captures WHERE id = ?1 AND user_id = ?2"
            ))?;
            let row = stmt.query_row([id, user_id], capture_from_row).optional()?;
            Ok(row)
        })
    }

    /// Returns false if no capture with that id belongs to `user_id`.
    pub fn update_capture_status(
        &self,
        user_id: &str,
        id: &str,
        status: CaptureStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE captures SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                (status.as_str(), format_timestamp(updated_at), id, user_id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Hard delete. Returns false if nothing matched.
    pub fn delete_capture(&self, user_id: &str, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM captures WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Photos --

    pub fn insert_photo(&self, row: &PhotoRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO photos (name, owner_id, content_type, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.name,
                    row.owner_id,
                    row.content_type,
                    row.size,
                    row.sha256,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_photo(&self, name: &str) -> Result<Option<PhotoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, owner_id, content_type, size, sha256, created_at FROM photos WHERE name = ?1",
            )?;
            let row = stmt.query_row([name], photo_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn delete_photo(&self, owner_id: &str, name: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM photos WHERE name = ?1 AND owner_id = ?2",
                [name, owner_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Photos uploaded before `cutoff` that no capture of their owner
    /// mentions. Capture data embeds the public URL, which ends in the name.
    pub fn unreferenced_photos(&self, cutoff: DateTime<Utc>) -> Result<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.name, p.owner_id, p.content_type, p.size, p.sha256, p.created_at
                 FROM photos p
                 WHERE p.created_at < ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM captures c
                       WHERE c.user_id = p.owner_id
                         AND instr(c.data, '/' || p.name || '\"') > 0
                   )",
            )?;
            let rows = stmt
                .query_map([format_timestamp(cutoff)], photo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Drop a photo row regardless of owner. Used by the cleanup sweep.
    pub fn forget_photo(&self, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM photos WHERE name = ?1", [name])?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, display_name, password, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn capture_from_row(row: &Row<'_>) -> rusqlite::Result<CaptureRow> {
    Ok(CaptureRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        data: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        name: row.get(0)?,
        owner_id: row.get(1)?,
        content_type: row.get(2)?,
        size: row.get(3)?,
        sha256: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

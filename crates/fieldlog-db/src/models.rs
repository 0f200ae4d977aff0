//! Database row types: these map directly to SQLite rows.
//! Distinct from fieldlog-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use fieldlog_types::models::{Capture, CaptureData, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub created_at: String,
}

pub struct CaptureRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub data: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct PhotoRow {
    pub name: String,
    pub owner_id: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that text
/// ordering matches chronological ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("invalid timestamp {raw:?}"))
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id.parse::<Uuid>().with_context(|| format!("corrupt user id {:?}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            email: self.email,
            display_name: self.display_name,
        })
    }
}

impl CaptureRow {
    pub fn into_capture(self) -> Result<Capture> {
        let data: CaptureData = serde_json::from_str(&self.data)
            .with_context(|| format!("corrupt data on capture {}", self.id))?;
        Ok(Capture {
            id: self.id.parse().with_context(|| format!("corrupt capture id {:?}", self.id))?,
            user_id: self
                .user_id
                .parse()
                .with_context(|| format!("corrupt user_id on capture {}", self.id))?,
            status: self.status.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            title: self.title,
            description: self.description,
            data,
        })
    }
}

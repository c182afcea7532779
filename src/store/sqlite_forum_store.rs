use super::models::{Notification, Post};
use super::schema::{CREATE_SCHEMA_V1, FORUM_SCHEMA_VERSION};
use super::ForumStore;
use crate::site_settings::SiteSettings;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub struct SqliteForumStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteForumStore {
    /// Open (creating if needed) the database at `dsn`.
    ///
    /// `dsn` is an SQLite URI such as `file:/var/lib/forum/forum.db?mode=rwc`
    /// or a plain file path.
    pub fn open(dsn: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(dsn, flags)
            .with_context(|| format!("Failed to open forum database {}", dsn))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if version == 0 {
            info!("Creating forum schema version {}", FORUM_SCHEMA_VERSION);
            conn.execute_batch(CREATE_SCHEMA_V1)
                .context("Failed to create forum schema")?;
            conn.execute(
                &format!("PRAGMA user_version = {}", FORUM_SCHEMA_VERSION),
                [],
            )?;
        } else if version != FORUM_SCHEMA_VERSION {
            bail!(
                "Forum database version {} is not supported (expected {})",
                version,
                FORUM_SCHEMA_VERSION
            );
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Forum database connection mutex poisoned"))
    }
}

impl ForumStore for SqliteForumStore {
    fn create_post(
        &self,
        author_id: i64,
        body: &str,
        is_temp: bool,
        created_at: i64,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts (author_id, body, is_temp, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![author_id, body, is_temp, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn()?;
        let post = conn
            .query_row(
                "SELECT id, author_id, body, is_temp, created_at FROM posts WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Post {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        body: row.get(2)?,
                        is_temp: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(post)
    }

    fn count_posts(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn purge_temp_posts_older_than(&self, cutoff: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM posts WHERE is_temp = 1 AND created_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    fn create_session(&self, token: &str, user_id: i64, expires_at: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, expires_at],
        )?;
        Ok(())
    }

    fn count_sessions(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(deleted)
    }

    fn enqueue_notification(&self, user_id: i64, message: &str, created_at: i64) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notifications (user_id, message, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, message, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_pending_notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, message, created_at FROM notifications
             WHERE sent_at IS NULL ORDER BY created_at ASC, id ASC LIMIT ?1",
        )?;
        let notifications = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    fn mark_notification_sent(&self, id: i64, sent_at: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET sent_at = ?1 WHERE id = ?2",
            params![sent_at, id],
        )?;
        if updated == 0 {
            bail!("Notification {} not found", id);
        }
        Ok(())
    }

    fn load_site_settings(&self) -> Result<Option<SiteSettings>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM site_settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to parse stored site settings")?,
            )),
            None => Ok(None),
        }
    }

    fn save_site_settings(&self, settings: &SiteSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO site_settings (id, value, updated_at) VALUES (1, ?1, datetime('now'))
             ON CONFLICT(id) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![json],
        )?;
        Ok(())
    }
}

//! Relational storage used by request handlers and background jobs.
//!
//! The store is shared by every job and handler; implementations are
//! internally synchronized and safe to call from any thread.

mod models;
mod schema;
mod sqlite_forum_store;

pub use models::*;
pub use schema::FORUM_SCHEMA_VERSION;
pub use sqlite_forum_store::SqliteForumStore;

use crate::site_settings::SiteSettings;
use anyhow::Result;

pub trait ForumStore: Send + Sync {
    // Posts
    fn create_post(
        &self,
        author_id: i64,
        body: &str,
        is_temp: bool,
        created_at: i64,
    ) -> Result<i64>;
    fn get_post(&self, id: i64) -> Result<Option<Post>>;
    fn count_posts(&self) -> Result<usize>;
    /// Deletes temporary posts created before `cutoff`, returns how many were removed.
    fn purge_temp_posts_older_than(&self, cutoff: i64) -> Result<usize>;

    // Sessions
    fn create_session(&self, token: &str, user_id: i64, expires_at: i64) -> Result<()>;
    fn count_sessions(&self) -> Result<usize>;
    /// Deletes sessions whose expiry is at or before `now`.
    fn purge_expired_sessions(&self, now: i64) -> Result<usize>;

    // Notifications
    fn enqueue_notification(&self, user_id: i64, message: &str, created_at: i64) -> Result<i64>;
    /// Oldest unsent notifications first.
    fn get_pending_notifications(&self, limit: usize) -> Result<Vec<Notification>>;
    fn mark_notification_sent(&self, id: i64, sent_at: i64) -> Result<()>;

    // Site settings
    fn load_site_settings(&self) -> Result<Option<SiteSettings>>;
    fn save_site_settings(&self, settings: &SiteSettings) -> Result<()>;
}

//! Forum Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod config;
pub mod lifecycle;
pub mod server;
pub mod site_settings;
pub mod store;

// Re-export commonly used types for convenience
pub use background_jobs::{JobScheduler, SchedulerError, Task};
pub use lifecycle::{
    LifecycleEvent, LifecycleState, Program, RequestServer, ShutdownError, ShutdownOutcome,
};
pub use server::{HttpServer, RequestsLoggingLevel};
pub use site_settings::{SiteSettings, SiteSettingsCache};
pub use store::{ForumStore, SqliteForumStore};

//! Background task scheduling and execution system.
//!
//! A fixed set of named, periodic maintenance tasks is registered before
//! start-up. Each task runs on its own loop; the scheduler only synchronizes
//! the loops when it is stopped.

mod context;
mod job;
pub mod jobs;
mod scheduler;
mod task;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
pub use scheduler::{JobScheduler, SchedulerError};
pub use task::{Task, TaskAction};

pub mod cleanup;
pub mod database;
pub mod error;
pub mod queue;
pub mod schema;
pub mod tasks;

pub use cleanup::{CleanupRecord, CleanupRepo};
pub use database::Database;
pub use error::StoreError;
pub use queue::{Delivery, JobQueue};
pub use tasks::{TaskRepo, TaskRow};

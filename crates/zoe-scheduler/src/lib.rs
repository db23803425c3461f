pub mod error;
pub mod materialize;
pub mod scheduler;

pub use error::{MaterializeError, SchedulerError};
pub use scheduler::{Scheduler, SchedulerStats};

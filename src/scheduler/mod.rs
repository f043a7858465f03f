mod scheduler;

pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerReport};

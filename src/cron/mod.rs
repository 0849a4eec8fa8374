mod jobs;
mod scheduler;

pub use scheduler::Scheduler;

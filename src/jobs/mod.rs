//! Asynchronous job lifecycle: records, store, and executor.

pub mod executor;
pub mod record;
pub mod store;

pub use executor::Executor;
pub use record::{JobRecord, JobStatus};
pub use store::{ExecutionMetrics, JobStore};

//! Background sync workers.

mod pool;

pub use pool::{SyncWorkerPool, SyncWorkerPoolHandle};

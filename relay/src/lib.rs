//! Transaction-sync relay core.
//!
//! Keeps a local transaction store consistent with an upstream banking-data
//! provider per connection, using the provider's cursor-based incremental
//! sync protocol. Webhooks enqueue jobs; workers fetch deltas, persist them,
//! advance a per-item cursor and publish events, coordinated by a
//! per-item distributed lock and two fixed-window rate limiters.

pub mod concurrency;
pub mod error;
pub mod events;
pub mod limiter;
pub mod lock;
pub mod provider;
pub mod queue;
pub mod redis;
pub mod store;
pub mod sync;
pub mod types;
pub mod workers;

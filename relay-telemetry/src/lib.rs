//! Tracing initialization shared by the relay binaries.

pub mod tracing;

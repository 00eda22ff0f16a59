//! Utility functions and supporting infrastructure.
//!
//! Provides the bit reader, error types, rate-limited diagnostics, the pooled
//! buffer table and the sink registry that fans buffers out to consumers.

pub mod bitstream_io;
pub mod buffer_pool;
pub mod errors;
pub mod rate_limit;
pub mod sinks;

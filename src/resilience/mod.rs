//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connection lost / discovery attempt failed:
//!     → backoff.rs (compute the delay for this attempt number)
//!     → monitor waits, then re-establishes
//!     → attempt counter resets on a successful reconnect
//! ```
//!
//! Per-operation deadlines live in the store client; this module only owns
//! the reconnect schedule.

pub mod backoff;

pub use backoff::reconnect_delay;

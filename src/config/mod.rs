//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (command-line overrides)
//!     → validation.rs (semantic checks)
//!     → ProbeConfig (validated, immutable for the process lifetime)
//! ```
//!
//! All fields have defaults so a minimal config (or none at all) works;
//! validation separates syntactic (serde) from semantic checks and reports
//! every violation, not just the first.

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    DiscoveryConfig, ObservabilityConfig, ProbeConfig, ProbeSettings, ReconnectConfig,
    ReportConfig, SummaryFormat,
};

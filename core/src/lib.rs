//! Feature-flag project migration engine.
//!
//! Captures a source project into a [`SnapshotDir`] and replays it into a
//! destination project through a rate-limited [`Transport`].

pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod migrate;
pub mod model;
pub mod patch;
pub mod report;
pub mod sanitize;
pub mod snapshot;
pub mod transport;

pub use capture::{CaptureSummary, capture_project};
pub use config::MigrateConfig;
pub use error::{MigrateError, Result};
pub use migrate::{MigrationPhase, MigrationPlan, Migrator};
pub use report::{MigrationReport, ReviewList};
pub use snapshot::{SnapshotDir, SnapshotSource};
pub use transport::{DryRunTransport, HttpTransport, RateLimitedTransport, Transport};

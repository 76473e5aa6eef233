//! Run outcome aggregation
//!
//! [`ReviewList`] collects entities that need an operator's attention. It is
//! append-only and owned by the single control flow of a run.

use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;

use crate::migrate::MigrationPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Segment,
    Flag,
    Metric,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Segment => "segment",
            Self::Flag => "flag",
            Self::Metric => "metric",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entity ended up on the review list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewReason {
    /// The destination answered with a non-success status.
    Status { code: u16 },
    /// The request never produced a status, or the entity could not be built.
    Error { message: String },
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code } => write!(f, "status {code}"),
            Self::Error { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub kind: EntityKind,
    pub key: String,
    /// Environment for environment-scoped entities (segments).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub reason: ReviewReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipNotice {
    pub kind: EntityKind,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub reason: String,
}

/// Entities whose create or patch did not come back clean, in failure order.
///
/// The same entity may appear more than once.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ReviewList {
    entries: Vec<ReviewEntry>,
}

impl ReviewList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entity unless `status` is a 2xx.
    pub fn record(
        &mut self,
        kind: EntityKind,
        key: &str,
        environment: Option<&str>,
        status: StatusCode,
    ) {
        if status.is_success() {
            return;
        }
        self.entries.push(ReviewEntry {
            kind,
            key: key.to_string(),
            environment: environment.map(str::to_string),
            reason: ReviewReason::Status {
                code: status.as_u16(),
            },
        });
    }

    /// Append an entity that failed without a status to report.
    pub fn record_error(
        &mut self,
        kind: EntityKind,
        key: &str,
        environment: Option<&str>,
        message: impl Into<String>,
    ) {
        self.entries.push(ReviewEntry {
            kind,
            key: key.to_string(),
            environment: environment.map(str::to_string),
            reason: ReviewReason::Error {
                message: message.into(),
            },
        });
    }

    pub fn entries(&self) -> &[ReviewEntry] {
        &self.entries
    }

    /// Entity keys in append order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.key.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Counters per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: usize,
    pub patched: usize,
    pub rejected: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub segments: EntityCounts,
    pub flags: EntityCounts,
    pub metrics: EntityCounts,
}

impl MigrationStats {
    pub fn counts_mut(&mut self, kind: EntityKind) -> &mut EntityCounts {
        match kind {
            EntityKind::Segment => &mut self.segments,
            EntityKind::Flag => &mut self.flags,
            EntityKind::Metric => &mut self.metrics,
        }
    }
}

/// Everything a finished (or cancelled) run hands back to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub source_project: String,
    pub destination_project: String,
    pub environments: Vec<String>,
    pub phase: MigrationPhase,
    pub cancelled: bool,
    pub stats: MigrationStats,
    pub skipped: Vec<SkipNotice>,
    pub review: ReviewList,
}

impl MigrationReport {
    pub fn needs_review(&self) -> bool {
        !self.review.is_empty()
    }
}

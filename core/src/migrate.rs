//! Migration orchestrator
//!
//! Replays a captured project into a destination project in strictly
//! sequential phases:
//!
//! ```text
//! Start → CreateProject → CreateSegments → CreateFlags
//!       → PatchFlagEnvironments → MigrateMetrics → Done
//! ```
//!
//! Each request is awaited (including any throttle replay) before the next
//! one is built, so rule appends land in source order. Entity failures go to
//! the review list and the run moves on; only failing to create the
//! destination project ends the run with an error. Cancellation is honoured
//! between entities, never mid-request.

use std::ops::ControlFlow;

use reqwest::StatusCode;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::error::{MigrateError, Result, TransportError};
use crate::model::{CreatedProject, FlagDescriptor, ProjectDescriptor, SegmentDescriptor};
use crate::patch::{FlagPatch, segment_operations};
use crate::report::{
    EntityKind, MigrationReport, MigrationStats, ReviewList, SkipNotice,
};
use crate::sanitize::{flag_payload, metric_payload, project_payload, segment_payload};
use crate::snapshot::{Entry, SnapshotSource};
use crate::transport::{ApiRequest, ApiResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationPhase {
    Start,
    CreateProject,
    CreateSegments,
    CreateFlags,
    PatchFlagEnvironments,
    MigrateMetrics,
    Done,
}

impl MigrationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::CreateProject => "CREATE_PROJECT",
            Self::CreateSegments => "CREATE_SEGMENTS",
            Self::CreateFlags => "CREATE_FLAGS",
            Self::PatchFlagEnvironments => "PATCH_FLAG_ENVIRONMENTS",
            Self::MigrateMetrics => "MIGRATE_METRICS",
            Self::Done => "DONE",
        }
    }
}

/// Which project to read and where to create it.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub source_project: String,
    pub destination_project: String,
}

/// The destination project as the server reported it.
#[derive(Debug, Clone)]
struct Destination {
    key: String,
    environments: Vec<String>,
}

/// How a single create or patch call ended.
enum Outcome {
    Accepted,
    Rejected(StatusCode),
    Failed(String),
}

impl Outcome {
    fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Clone, Copy)]
struct Entity<'a> {
    kind: EntityKind,
    key: &'a str,
    environment: Option<&'a str>,
}

impl Entity<'_> {
    fn record(self, review: &mut ReviewList, outcome: &Outcome) {
        match outcome {
            Outcome::Accepted => {}
            Outcome::Rejected(status) => {
                review.record(self.kind, self.key, self.environment, *status);
            }
            Outcome::Failed(message) => {
                review.record_error(self.kind, self.key, self.environment, message.clone());
            }
        }
    }
}

pub struct Migrator<'a, S: ?Sized, T: ?Sized> {
    snapshot: &'a S,
    transport: &'a T,
    cancel: CancellationToken,
}

impl<'a, S, T> Migrator<'a, S, T>
where
    S: SnapshotSource + ?Sized,
    T: Transport + ?Sized,
{
    pub fn new(snapshot: &'a S, transport: &'a T) -> Self {
        Self {
            snapshot,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every phase and return the report.
    ///
    /// Errors only when the source project cannot be read or the destination
    /// project cannot be created.
    pub async fn run(&self, plan: &MigrationPlan) -> Result<MigrationReport> {
        let mut report = MigrationReport {
            source_project: plan.source_project.clone(),
            destination_project: plan.destination_project.clone(),
            environments: Vec::new(),
            phase: MigrationPhase::Start,
            cancelled: false,
            stats: MigrationStats::default(),
            skipped: Vec::new(),
            review: ReviewList::new(),
        };

        let project = self
            .snapshot
            .read_project(&plan.source_project)
            .map_err(|source| MigrateError::ProjectSnapshot {
                key: plan.source_project.clone(),
                source,
            })?;

        if self.enter(&mut report, MigrationPhase::CreateProject).is_break() {
            return Ok(report);
        }
        let destination = self
            .create_project(&project, &plan.destination_project)
            .await?;
        report.destination_project = destination.key.clone();
        report.environments = destination.environments.clone();

        if self.enter(&mut report, MigrationPhase::CreateSegments).is_break()
            || self
                .create_segments(&project, &destination, &mut report)
                .await
                .is_break()
        {
            return Ok(report);
        }

        if self.enter(&mut report, MigrationPhase::CreateFlags).is_break() {
            return Ok(report);
        }
        let flags = match self.snapshot.read_flags(&project.key) {
            Ok(entries) => accept_entries(entries, EntityKind::Flag, None, &mut report),
            Err(err) => {
                tracing::warn!(path = %err.path().display(), error = %err, "flag snapshot unreadable; no flags to migrate");
                Vec::new()
            }
        };
        if self
            .create_flags(&flags, &destination, &mut report)
            .await
            .is_break()
        {
            return Ok(report);
        }

        if self
            .enter(&mut report, MigrationPhase::PatchFlagEnvironments)
            .is_break()
            || self
                .patch_flag_environments(&flags, &destination, &mut report)
                .await
                .is_break()
        {
            return Ok(report);
        }

        if self.enter(&mut report, MigrationPhase::MigrateMetrics).is_break()
            || self
                .migrate_metrics(&project.key, &destination, &mut report)
                .await
                .is_break()
        {
            return Ok(report);
        }

        report.phase = MigrationPhase::Done;
        tracing::info!(
            project = %report.destination_project,
            review = report.review.len(),
            "migration finished"
        );
        Ok(report)
    }

    fn enter(&self, report: &mut MigrationReport, phase: MigrationPhase) -> ControlFlow<()> {
        if self.checkpoint(report).is_break() {
            return ControlFlow::Break(());
        }
        report.phase = phase;
        tracing::info!(phase = phase.as_str(), "entering phase");
        ControlFlow::Continue(())
    }

    fn checkpoint(&self, report: &mut MigrationReport) -> ControlFlow<()> {
        if !self.cancel.is_cancelled() {
            return ControlFlow::Continue(());
        }
        if !report.cancelled {
            tracing::warn!(phase = report.phase.as_str(), "migration cancelled; stopping");
            report.cancelled = true;
        }
        ControlFlow::Break(())
    }

    async fn send(
        &self,
        request: std::result::Result<ApiRequest, TransportError>,
    ) -> std::result::Result<ApiResponse, TransportError> {
        self.transport.send(&request?).await
    }

    /// Send and log one entity call.
    async fn call(
        &self,
        entity: Entity<'_>,
        action: &str,
        request: std::result::Result<ApiRequest, TransportError>,
    ) -> Outcome {
        let kind = entity.kind.as_str();
        match self.send(request).await {
            Ok(response) if response.is_success() => {
                tracing::info!(
                    kind,
                    key = entity.key,
                    environment = entity.environment,
                    status = response.status.as_u16(),
                    "{action}"
                );
                Outcome::Accepted
            }
            Ok(response) => {
                tracing::warn!(
                    kind,
                    key = entity.key,
                    environment = entity.environment,
                    status = response.status.as_u16(),
                    body = %response.body,
                    "{action} rejected"
                );
                Outcome::Rejected(response.status)
            }
            Err(err) => {
                tracing::warn!(
                    kind,
                    key = entity.key,
                    environment = entity.environment,
                    error = %err,
                    "{action} failed"
                );
                Outcome::Failed(err.to_string())
            }
        }
    }

    async fn create_project(
        &self,
        project: &ProjectDescriptor,
        destination_key: &str,
    ) -> Result<Destination> {
        let payload = project_payload(project, destination_key);
        let request = api::create_project(&payload).map_err(|source| {
            MigrateError::ProjectTransport {
                key: destination_key.to_string(),
                source,
            }
        })?;
        let response = self.transport.send(&request).await.map_err(|source| {
            MigrateError::ProjectTransport {
                key: destination_key.to_string(),
                source,
            }
        })?;

        if !response.is_success() {
            tracing::error!(
                project = destination_key,
                status = response.status.as_u16(),
                body = %response.body,
                "creating project failed"
            );
            return Err(MigrateError::ProjectCreation {
                key: destination_key.to_string(),
                status: response.status,
            });
        }

        let requested: Vec<String> = payload.environments.iter().map(|env| env.key.clone()).collect();
        let destination = match response.json::<CreatedProject>(&request.path) {
            Ok(created) if created.environments.is_empty() => Destination {
                key: created.key,
                environments: requested,
            },
            Ok(created) => Destination {
                key: created.key,
                environments: created.environments.into_iter().map(|env| env.key).collect(),
            },
            Err(err) => {
                tracing::warn!(error = %err, "project response unreadable; using requested key");
                Destination {
                    key: destination_key.to_string(),
                    environments: requested,
                }
            }
        };

        tracing::info!(
            source = %project.key,
            project = %destination.key,
            status = response.status.as_u16(),
            environments = destination.environments.len(),
            "created project"
        );
        Ok(destination)
    }

    async fn create_segments(
        &self,
        project: &ProjectDescriptor,
        destination: &Destination,
        report: &mut MigrationReport,
    ) -> ControlFlow<()> {
        for env in &project.environments {
            if self.checkpoint(report).is_break() {
                return ControlFlow::Break(());
            }
            if !destination.environments.contains(&env.key) {
                tracing::debug!(environment = %env.key, "environment absent from destination; skipping its segments");
                continue;
            }

            let segments = match self.snapshot.read_segments(&project.key, &env.key) {
                Ok(entries) => {
                    accept_entries(entries, EntityKind::Segment, Some(env.key.as_str()), report)
                }
                Err(err) => {
                    tracing::warn!(path = %err.path().display(), error = %err, "segment snapshot unreadable; treating as empty");
                    continue;
                }
            };

            for segment in &segments {
                if self.checkpoint(report).is_break() {
                    return ControlFlow::Break(());
                }
                self.migrate_segment(&destination.key, &env.key, segment, report)
                    .await;
            }
        }
        ControlFlow::Continue(())
    }

    /// Create one segment, then patch in its membership and rules.
    async fn migrate_segment(
        &self,
        project: &str,
        environment: &str,
        segment: &SegmentDescriptor,
        report: &mut MigrationReport,
    ) {
        let entity = Entity {
            kind: EntityKind::Segment,
            key: &segment.key,
            environment: Some(environment),
        };

        if segment.unbounded {
            tracing::warn!(key = %segment.key, environment, "segment is unbounded; skipping");
            report.stats.segments.skipped += 1;
            report.skipped.push(SkipNotice {
                kind: EntityKind::Segment,
                key: segment.key.clone(),
                environment: Some(environment.to_string()),
                reason: "unbounded (synced) segments are not migrated".to_string(),
            });
            return;
        }

        let payload = segment_payload(segment);
        let created = self
            .call(
                entity,
                "created segment",
                api::create_segment(project, environment, &payload),
            )
            .await;
        entity.record(&mut report.review, &created);
        if created.is_accepted() {
            report.stats.segments.created += 1;
        } else {
            report.stats.segments.rejected += 1;
        }

        let ops = segment_operations(segment);
        if ops.is_empty() {
            return;
        }
        let patched = self
            .call(
                entity,
                "patched segment",
                api::patch_segment(project, environment, &segment.key, &ops),
            )
            .await;
        entity.record(&mut report.review, &patched);
        if patched.is_accepted() {
            report.stats.segments.patched += 1;
        } else {
            report.stats.segments.rejected += 1;
        }
    }

    async fn create_flags(
        &self,
        flags: &[FlagDescriptor],
        destination: &Destination,
        report: &mut MigrationReport,
    ) -> ControlFlow<()> {
        for flag in flags {
            if self.checkpoint(report).is_break() {
                return ControlFlow::Break(());
            }
            let entity = Entity {
                kind: EntityKind::Flag,
                key: &flag.key,
                environment: None,
            };
            let payload = flag_payload(flag);
            let outcome = self
                .call(entity, "created flag", api::create_flag(&destination.key, &payload))
                .await;
            // A failed create shows up again when its patch fails, and only the
            // patch result goes on the review list.
            if outcome.is_accepted() {
                report.stats.flags.created += 1;
            } else {
                report.stats.flags.rejected += 1;
            }
        }
        ControlFlow::Continue(())
    }

    async fn patch_flag_environments(
        &self,
        flags: &[FlagDescriptor],
        destination: &Destination,
        report: &mut MigrationReport,
    ) -> ControlFlow<()> {
        for flag in flags {
            if self.checkpoint(report).is_break() {
                return ControlFlow::Break(());
            }
            let entity = Entity {
                kind: EntityKind::Flag,
                key: &flag.key,
                environment: None,
            };

            let patch = match build_flag_patch(flag, &destination.environments) {
                Ok(patch) => patch,
                Err(err) => {
                    tracing::error!(key = %flag.key, error = %err, "cannot build environment patch");
                    entity.record(&mut report.review, &Outcome::Failed(err.to_string()));
                    report.stats.flags.rejected += 1;
                    continue;
                }
            };
            if patch.is_empty() {
                tracing::debug!(key = %flag.key, "no environment configuration to apply");
                continue;
            }

            let environments = patch.environments().join(",");
            tracing::debug!(key = %flag.key, environments, "patching flag environments");
            let ops = patch.into_operations();
            let outcome = self
                .call(
                    entity,
                    "patched flag environments",
                    api::patch_flag(&destination.key, &flag.key, &ops),
                )
                .await;
            entity.record(&mut report.review, &outcome);
            if outcome.is_accepted() {
                report.stats.flags.patched += 1;
            } else {
                report.stats.flags.rejected += 1;
            }
        }
        ControlFlow::Continue(())
    }

    async fn migrate_metrics(
        &self,
        source_project: &str,
        destination: &Destination,
        report: &mut MigrationReport,
    ) -> ControlFlow<()> {
        let metrics = match self.snapshot.read_metric_list(source_project) {
            Ok(entries) => accept_entries(entries, EntityKind::Metric, None, report),
            Err(err) => {
                tracing::warn!(path = %err.path().display(), error = %err, "metric snapshot unreadable; no metrics to migrate");
                return ControlFlow::Continue(());
            }
        };

        for summary in &metrics {
            if self.checkpoint(report).is_break() {
                return ControlFlow::Break(());
            }
            let entity = Entity {
                kind: EntityKind::Metric,
                key: &summary.key,
                environment: None,
            };

            let metric = match self.snapshot.read_metric_detail(source_project, &summary.key) {
                Ok(metric) => metric,
                Err(err) => {
                    tracing::warn!(path = %err.path().display(), error = %err, "metric snapshot unreadable; skipping");
                    entity.record(&mut report.review, &Outcome::Failed(err.to_string()));
                    report.stats.metrics.rejected += 1;
                    continue;
                }
            };

            let payload = metric_payload(&metric);
            let outcome = self
                .call(entity, "created metric", api::create_metric(&destination.key, &payload))
                .await;
            entity.record(&mut report.review, &outcome);
            if outcome.is_accepted() {
                report.stats.metrics.created += 1;
            } else {
                report.stats.metrics.rejected += 1;
            }
        }
        ControlFlow::Continue(())
    }
}

/// Keep the entries that decoded; the rest go straight to the review list.
fn accept_entries<T>(
    entries: Vec<Entry<T>>,
    kind: EntityKind,
    environment: Option<&str>,
    report: &mut MigrationReport,
) -> Vec<T> {
    let mut accepted = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Ok(entity) => accepted.push(entity),
            Err(malformed) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    key = %malformed.key,
                    environment,
                    reason = %malformed.reason,
                    "malformed snapshot entry; not migrated"
                );
                report.review.record_error(
                    kind,
                    &malformed.key,
                    environment,
                    format!("malformed snapshot entry: {}", malformed.reason),
                );
                report.stats.counts_mut(kind).rejected += 1;
            }
        }
    }
    accepted
}

/// Every destination environment's operations for one flag, in one batch.
fn build_flag_patch(
    flag: &FlagDescriptor,
    environments: &[String],
) -> std::result::Result<FlagPatch, crate::error::PatchError> {
    let mut patch = FlagPatch::new();
    for environment in environments {
        match flag.environments.get(environment) {
            Some(overlay) => patch.push_environment(environment, overlay)?,
            None => {
                tracing::debug!(key = %flag.key, environment = %environment, "flag has no overlay for environment");
            }
        }
    }
    Ok(patch)
}

//! Snapshot capture from a live source project.
//!
//! Every GET is issued sequentially through the caller's transport and the
//! body is stored verbatim; shaping happens only at replay time.

use std::path::PathBuf;

use serde_json::Value;

use crate::api;
use crate::error::{MigrateError, Result, TransportError};
use crate::model::{Collection, MetricSummary, ProjectDescriptor};
use crate::snapshot::SnapshotDir;
use crate::transport::{ApiRequest, Transport};

/// A resource that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFailure {
    pub resource: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub project: String,
    pub written: Vec<PathBuf>,
    pub failures: Vec<CaptureFailure>,
}

impl CaptureSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Capture `project` into `store`.
///
/// The project itself must be readable; any other resource that fails is
/// logged, listed in the summary, and left out of the snapshot.
pub async fn capture_project<T>(
    transport: &T,
    store: &SnapshotDir,
    project: &str,
) -> Result<CaptureSummary>
where
    T: Transport + ?Sized,
{
    let mut summary = CaptureSummary {
        project: project.to_string(),
        ..Default::default()
    };

    let request = api::get_project(project);
    let response = transport.send(&request).await?;
    if !response.is_success() {
        tracing::error!(project, status = response.status.as_u16(), "cannot read source project");
        return Err(MigrateError::ProjectCapture {
            key: project.to_string(),
            status: response.status,
        });
    }
    let data: Value = response.json(&request.path)?;
    let descriptor: ProjectDescriptor =
        serde_json::from_value(data.clone()).map_err(|source| TransportError::Decode {
            path: request.path.clone(),
            source,
        })?;
    summary
        .written
        .push(store.write_resource(project, "project", &data)?);

    for environment in descriptor.environment_keys() {
        let resource = format!("segment-{environment}");
        fetch(
            transport,
            store,
            &mut summary,
            api::list_segments(project, &environment),
            &resource,
        )
        .await?;
    }

    fetch(transport, store, &mut summary, api::list_flags(project), "flag").await?;

    let Some(metrics) =
        fetch(transport, store, &mut summary, api::list_metrics(project), "metrics").await?
    else {
        return Ok(summary);
    };
    let metrics: Collection<MetricSummary> = match serde_json::from_value(metrics) {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::warn!(project, error = %err, "metric list has an unexpected shape");
            summary.failures.push(CaptureFailure {
                resource: "metrics".to_string(),
                reason: err.to_string(),
            });
            return Ok(summary);
        }
    };
    for metric in &metrics.items {
        let resource = format!("metrics-{}", metric.key);
        fetch(
            transport,
            store,
            &mut summary,
            api::get_metric(project, &metric.key),
            &resource,
        )
        .await?;
    }

    tracing::info!(
        project,
        files = summary.written.len(),
        failures = summary.failures.len(),
        "snapshot captured"
    );
    Ok(summary)
}

/// GET one resource and store it. Request failures are recorded, write
/// failures are returned.
async fn fetch<T>(
    transport: &T,
    store: &SnapshotDir,
    summary: &mut CaptureSummary,
    request: ApiRequest,
    resource: &str,
) -> Result<Option<Value>>
where
    T: Transport + ?Sized,
{
    let failure = match transport.send(&request).await {
        Ok(response) if response.is_success() => match response.json::<Value>(&request.path) {
            Ok(data) => {
                let path = store.write_resource(&summary.project, resource, &data)?;
                tracing::info!(resource, path = %path.display(), "captured");
                summary.written.push(path);
                return Ok(Some(data));
            }
            Err(err) => err.to_string(),
        },
        Ok(response) => format!("status {}", response.status.as_u16()),
        Err(err) => err.to_string(),
    };

    tracing::warn!(resource, path = %request.path, reason = %failure, "capture failed");
    summary.failures.push(CaptureFailure {
        resource: resource.to_string(),
        reason: failure,
    });
    Ok(None)
}

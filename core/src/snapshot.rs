//! Captured snapshot storage
//!
//! ## Layout
//!
//! ```text
//! <root>/project/<key>/
//!   project.json             project with expanded environments
//!   segment-<env>.json       { items: [segment...] } per environment
//!   flag.json                { items: [flag...] } with all environments
//!   metrics.json             { items: [{ key }...] }
//!   metrics-<metric>.json    one metric in full
//! ```
//!
//! Collection items are decoded one by one, so a malformed entity is
//! reported on its own instead of hiding the rest of its file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SnapshotError;
use crate::model::{
    Collection, FlagDescriptor, MetricDescriptor, MetricSummary, ProjectDescriptor,
    SegmentDescriptor,
};

/// A collection item that does not have its entity's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    /// The item's `key`, or `#<index>` when it has none.
    pub key: String,
    pub reason: String,
}

pub type Entry<T> = Result<T, MalformedEntry>;

pub fn decode_entries<T: DeserializeOwned>(items: Vec<Value>) -> Vec<Entry<T>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let key = item
                .get("key")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);
            serde_json::from_value(item).map_err(|err| MalformedEntry {
                key,
                reason: err.to_string(),
            })
        })
        .collect()
}

/// Read-only view of a captured source project.
pub trait SnapshotSource: Send + Sync {
    fn read_project(&self, project: &str) -> Result<ProjectDescriptor, SnapshotError>;

    fn read_segments(
        &self,
        project: &str,
        environment: &str,
    ) -> Result<Vec<Entry<SegmentDescriptor>>, SnapshotError>;

    fn read_flags(&self, project: &str) -> Result<Vec<Entry<FlagDescriptor>>, SnapshotError>;

    fn read_metric_list(&self, project: &str) -> Result<Vec<Entry<MetricSummary>>, SnapshotError>;

    fn read_metric_detail(
        &self,
        project: &str,
        metric: &str,
    ) -> Result<MetricDescriptor, SnapshotError>;
}

/// Snapshot files on disk.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join("project").join(project)
    }

    pub fn resource_path(&self, project: &str, resource: &str) -> PathBuf {
        self.project_dir(project).join(format!("{resource}.json"))
    }

    /// Write one captured resource, creating the project directory as needed.
    pub fn write_resource(
        &self,
        project: &str,
        resource: &str,
        data: &Value,
    ) -> Result<PathBuf, SnapshotError> {
        let dir = self.project_dir(project);
        std::fs::create_dir_all(&dir).map_err(|source| SnapshotError::Write {
            path: dir.clone(),
            source,
        })?;

        let path = self.resource_path(project, resource);
        let contents = serde_json::to_vec_pretty(data).map_err(|e| SnapshotError::Write {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(&path, contents).map_err(|source| SnapshotError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn read_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, SnapshotError> {
        let contents = std::fs::read_to_string(&path).map_err(|source| SnapshotError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SnapshotError::Parse { path, source })
    }

    fn read_entries<T: DeserializeOwned>(
        &self,
        path: PathBuf,
    ) -> Result<Vec<Entry<T>>, SnapshotError> {
        let collection: Collection<Value> = self.read_json(path)?;
        Ok(decode_entries(collection.items))
    }
}

impl SnapshotSource for SnapshotDir {
    fn read_project(&self, project: &str) -> Result<ProjectDescriptor, SnapshotError> {
        self.read_json(self.resource_path(project, "project"))
    }

    fn read_segments(
        &self,
        project: &str,
        environment: &str,
    ) -> Result<Vec<Entry<SegmentDescriptor>>, SnapshotError> {
        self.read_entries(self.resource_path(project, &format!("segment-{environment}")))
    }

    fn read_flags(&self, project: &str) -> Result<Vec<Entry<FlagDescriptor>>, SnapshotError> {
        self.read_entries(self.resource_path(project, "flag"))
    }

    fn read_metric_list(
        &self,
        project: &str,
    ) -> Result<Vec<Entry<MetricSummary>>, SnapshotError> {
        self.read_entries(self.resource_path(project, "metrics"))
    }

    fn read_metric_detail(
        &self,
        project: &str,
        metric: &str,
    ) -> Result<MetricDescriptor, SnapshotError> {
        self.read_json(self.resource_path(project, &format!("metrics-{metric}")))
    }
}

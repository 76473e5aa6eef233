//! Snapshot resource shapes
//!
//! These mirror what the source API returns closely enough to drive the
//! migration. Anything the engine does not reason about (rule bodies, clause
//! bodies, per-environment overlays) stays as raw JSON so it can be replayed
//! without loss.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Per-environment slice of a flag's configuration, keyed by field name.
pub type Overlay = Map<String, Value>;

/// `{ "items": [...] }` envelope used by every list endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Accept either an `{ "items": [...] }` envelope or a bare array.
fn items_or_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape<T> {
        Envelope { items: Vec<T> },
        List(Vec<T>),
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::Envelope { items } | Shape::List(items) => items,
    })
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub key: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub default_client_side_availability: Option<Value>,
    /// Legacy alternative to `default_client_side_availability`.
    #[serde(default)]
    pub include_in_snippet_by_default: Option<bool>,
    #[serde(default, deserialize_with = "items_or_list")]
    pub environments: Vec<EnvironmentDescriptor>,
}

impl ProjectDescriptor {
    pub fn environment_keys(&self) -> Vec<String> {
        self.environments.iter().map(|env| env.key.clone()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDescriptor {
    pub key: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    #[serde(default)]
    pub default_ttl: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confirm_changes: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secure_mode: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_track_events: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// The project representation the destination returns from creation.
///
/// Only the key and the environment keys matter downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProject {
    pub key: String,
    #[serde(default, deserialize_with = "items_or_list")]
    pub environments: Vec<EnvironmentKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentKey {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentDescriptor {
    pub key: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Synced ("big") segments are never migrated.
    #[serde(default, deserialize_with = "null_as_default")]
    pub unbounded: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub included: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excluded: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<Rule>,
}

/// A targeting rule shared by segments and flag environments.
///
/// `clauses` is required: a rule without one is malformed input.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Rule {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Clause(pub Map<String, Value>);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDescriptor {
    pub key: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variations: Vec<Variation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temporary: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "client_side_availability")]
    pub client_side_availability: Option<Value>,
    /// Legacy alternative to `client_side_availability`.
    #[serde(default, alias = "include_in_snippet")]
    pub include_in_snippet: Option<bool>,
    #[serde(default, alias = "custom_properties")]
    pub custom_properties: Option<Value>,
    #[serde(default)]
    pub defaults: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub environments: BTreeMap<String, Overlay>,
}

/// A flag variation. The source's server-assigned `_id` is not carried.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Variation {
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Entry of the metric list; details are read separately.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricSummary {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    pub key: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub event_key: Option<String>,
    #[serde(default)]
    pub is_numeric: Option<bool>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub urls: Option<Vec<Value>>,
    #[serde(default)]
    pub selector: Option<String>,
}

/// Metric kind. Unknown kinds are carried through rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    Custom,
    Pageview,
    Click,
    Unrecognized(String),
}

impl MetricKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Custom => "custom",
            Self::Pageview => "pageview",
            Self::Click => "click",
            Self::Unrecognized(kind) => kind,
        }
    }
}

impl From<String> for MetricKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "custom" => Self::Custom,
            "pageview" => Self::Pageview,
            "click" => Self::Click,
            _ => Self::Unrecognized(kind),
        }
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Unrecognized(kind) => kind,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

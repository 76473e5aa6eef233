//! Field sanitizer
//!
//! Turns snapshot resources into creation payloads the destination accepts.
//! Typed resources are projected onto their `*Post` payloads; free-form JSON
//! (rules, clauses, environment overlays) is filtered through a
//! [`FieldDenylist`] so the server-owned field policy lives in one place.
//!
//! Every function here is pure. Missing or falsy optional source fields are
//! left out of the payload instead of being sent empty.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{
    EnvironmentDescriptor, FlagDescriptor, MetricDescriptor, MetricKind, ProjectDescriptor,
    SegmentDescriptor, Variation,
};

/// Declarative policy for server-owned keys in free-form JSON objects.
#[derive(Debug, Clone, Copy)]
pub struct FieldDenylist {
    /// Keys removed on exact match.
    exact: &'static [&'static str],
    /// Keys removed when they contain any of these fragments.
    fragments: &'static [&'static str],
    /// Keys removed when they start with any of these prefixes.
    prefixes: &'static [&'static str],
}

impl FieldDenylist {
    pub const fn new(
        exact: &'static [&'static str],
        fragments: &'static [&'static str],
        prefixes: &'static [&'static str],
    ) -> Self {
        Self {
            exact,
            fragments,
            prefixes,
        }
    }

    pub fn denies(&self, key: &str) -> bool {
        self.exact.contains(&key)
            || self.fragments.iter().any(|fragment| key.contains(fragment))
            || self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }

    /// Remove every denied key, keeping the order of the rest.
    pub fn strip(&self, fields: &mut Map<String, Value>) {
        fields.retain(|key, _| !self.denies(key));
    }
}

/// Identity and bookkeeping fields on a rule.
pub const RULE_FIELDS: FieldDenylist =
    FieldDenylist::new(&["_id", "generation", "deleted", "version", "ref"], &[], &[]);

/// Identity field on a clause.
pub const CLAUSE_FIELDS: FieldDenylist = FieldDenylist::new(&["_id"], &[], &[]);

/// Server-owned and ephemeral keys of a flag environment overlay.
///
/// `sel` also covers selector-adjacent internals.
pub const OVERLAY_FIELDS: FieldDenylist = FieldDenylist::new(
    &[],
    &[
        "salt",
        "version",
        "lastModified",
        "_environmentName",
        "_site",
        "_summary",
        "sel",
        "access",
        "_debugEventsUntilDate",
    ],
    &["_", "-"],
);

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPost {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub environments: Vec<EnvironmentPost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_client_side_availability: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_in_snippet_by_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPost {
    pub name: String,
    pub key: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    pub confirm_changes: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub secure_mode: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub default_track_events: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPost {
    pub name: String,
    pub key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flag create body. Fields go out camelCase as the flags endpoint expects;
/// snake_case spellings are only accepted on the read side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPost {
    pub key: String,
    pub name: String,
    pub variations: Vec<Variation>,
    pub temporary: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_side_availability: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_in_snippet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPost {
    pub key: String,
    pub kind: MetricKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_numeric: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl MetricPost {
    fn bare(key: &str, kind: &MetricKind) -> Self {
        Self {
            key: key.to_string(),
            kind: kind.clone(),
            event_key: None,
            is_numeric: None,
            unit: None,
            success_criteria: None,
            urls: None,
            selector: None,
        }
    }
}

/// Project payload, created under `destination_key` with its environments.
pub fn project_payload(project: &ProjectDescriptor, destination_key: &str) -> ProjectPost {
    // The newer availability policy wins; the snippet flag is only a fallback.
    let (default_client_side_availability, include_in_snippet_by_default) =
        match &project.default_client_side_availability {
            Some(availability) if !availability.is_null() => (Some(availability.clone()), None),
            _ => (None, project.include_in_snippet_by_default),
        };

    ProjectPost {
        key: destination_key.to_string(),
        name: project.name.clone(),
        tags: project.tags.clone(),
        environments: project.environments.iter().map(environment_payload).collect(),
        default_client_side_availability,
        include_in_snippet_by_default,
    }
}

pub fn environment_payload(env: &EnvironmentDescriptor) -> EnvironmentPost {
    EnvironmentPost {
        name: env.name.clone(),
        key: env.key.clone(),
        color: env.color.clone(),
        default_ttl: env.default_ttl.filter(|ttl| *ttl > 0),
        confirm_changes: env.confirm_changes,
        secure_mode: env.secure_mode,
        default_track_events: env.default_track_events,
        tags: env.tags.clone(),
    }
}

/// Segment payload. Membership lists and rules go out as a follow-up patch.
pub fn segment_payload(segment: &SegmentDescriptor) -> SegmentPost {
    SegmentPost {
        name: segment.name.clone(),
        key: segment.key.clone(),
        tags: segment.tags.clone(),
        description: non_empty(&segment.description),
    }
}

/// Global (environment-independent) flag payload.
pub fn flag_payload(flag: &FlagDescriptor) -> FlagPost {
    let (client_side_availability, include_in_snippet) = match &flag.client_side_availability {
        Some(availability) if !availability.is_null() => (Some(availability.clone()), None),
        _ => (None, flag.include_in_snippet.filter(|include| *include)),
    };

    FlagPost {
        key: flag.key.clone(),
        name: flag.name.clone(),
        variations: flag.variations.clone(),
        temporary: flag.temporary,
        tags: flag.tags.clone(),
        description: non_empty(&flag.description),
        client_side_availability,
        include_in_snippet,
        custom_properties: flag.custom_properties.clone().filter(|v| !v.is_null()),
        defaults: flag.defaults.clone().filter(|v| !v.is_null()),
    }
}

/// Metric payload: `key` and `kind`, plus exactly the fields of that kind.
pub fn metric_payload(metric: &MetricDescriptor) -> MetricPost {
    let mut post = MetricPost::bare(&metric.key, &metric.kind);
    match metric.kind {
        MetricKind::Custom if metric.is_numeric == Some(true) => {
            post.event_key = metric.event_key.clone();
            post.is_numeric = Some(true);
            post.unit = metric.unit.clone();
            post.success_criteria = metric.success_criteria.clone();
        }
        MetricKind::Custom => {
            post.event_key = metric.event_key.clone();
            post.is_numeric = Some(false);
        }
        MetricKind::Pageview => {
            post.urls = metric.urls.clone();
        }
        MetricKind::Click => {
            post.selector = metric.selector.clone();
            post.urls = metric.urls.clone();
        }
        MetricKind::Unrecognized(_) => {}
    }
    post
}

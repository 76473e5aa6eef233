//! Patch builder
//!
//! Converts the mutable parts of a segment or flag into JSON-Patch style
//! operations for the destination's PATCH endpoints. Rules are appended one
//! operation per rule at `<prefix>/rules/-`, so the order of the operations
//! is what preserves rule order at the destination.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PatchError;
use crate::model::{Overlay, Rule, SegmentDescriptor};
use crate::sanitize::{CLAUSE_FIELDS, OVERLAY_FIELDS, RULE_FIELDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub path: String,
    pub op: PatchOp,
    pub value: Value,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            op: PatchOp::Add,
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            op: PatchOp::Replace,
            value,
        }
    }
}

/// Strip identity fields from a rule and its clauses.
pub fn sanitize_rule(rule: &Rule) -> Map<String, Value> {
    let mut fields = rule.fields.clone();
    RULE_FIELDS.strip(&mut fields);

    let clauses = rule
        .clauses
        .iter()
        .map(|clause| {
            let mut clause = clause.0.clone();
            CLAUSE_FIELDS.strip(&mut clause);
            Value::Object(clause)
        })
        .collect();
    fields.insert("clauses".to_string(), Value::Array(clauses));
    fields
}

/// One append operation per rule, in source order.
///
/// `prefix` is the JSON pointer of the rule owner (empty for a segment).
pub fn rule_operations(prefix: &str, rules: &[Rule]) -> Vec<PatchOperation> {
    let path = format!("{prefix}/rules/-");
    rules
        .iter()
        .map(|rule| PatchOperation::add(path.clone(), Value::Object(sanitize_rule(rule))))
        .collect()
}

/// Membership lists first, then rules.
pub fn segment_operations(segment: &SegmentDescriptor) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    if !segment.included.is_empty() {
        ops.push(PatchOperation::add("/included", Value::from(segment.included.clone())));
    }
    if !segment.excluded.is_empty() {
        ops.push(PatchOperation::add("/excluded", Value::from(segment.excluded.clone())));
    }
    ops.extend(rule_operations("", &segment.rules));
    ops
}

/// Operations applying one environment's overlay to a flag.
///
/// Server-owned keys are dropped; `rules` becomes one append per rule and
/// every other surviving key one `replace`.
pub fn environment_operations(
    environment: &str,
    overlay: &Overlay,
) -> Result<Vec<PatchOperation>, PatchError> {
    let prefix = format!("/environments/{environment}");
    let mut ops = Vec::new();

    for (key, value) in overlay {
        if OVERLAY_FIELDS.denies(key) {
            continue;
        }
        if key == "rules" {
            let rules: Vec<Rule> = serde_json::from_value(value.clone()).map_err(|source| {
                PatchError::MalformedRules {
                    environment: environment.to_string(),
                    source,
                }
            })?;
            ops.extend(rule_operations(&prefix, &rules));
        } else {
            ops.push(PatchOperation::replace(format!("{prefix}/{key}"), value.clone()));
        }
    }

    Ok(ops)
}

/// Accumulates every environment's operations for one flag so they go out
/// as a single request.
#[derive(Debug, Default)]
pub struct FlagPatch {
    operations: Vec<PatchOperation>,
    environments: Vec<String>,
}

impl FlagPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_environment(
        &mut self,
        environment: &str,
        overlay: &Overlay,
    ) -> Result<(), PatchError> {
        let ops = environment_operations(environment, overlay)?;
        self.operations.extend(ops);
        self.environments.push(environment.to_string());
        Ok(())
    }

    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn into_operations(self) -> Vec<PatchOperation> {
        self.operations
    }
}

//! Inbound partial task payloads.
//!
//! # Responsibility
//! - Coerce loosely typed request objects into typed optional fields.
//!
//! # Invariants
//! - A missing key, JSON `null` for a scalar, an empty string or a
//!   non-numeric string for an id/count field all mean "absent".
//! - `parent_id: null` is an explicit detach; `parent_id: "no-epic"` selects
//!   the project's bucket.
//! - Enum labels must match exactly; unknown labels are validation errors.

use crate::model::task::{
    ContributorId, EpicPriority, EstimateType, Priority, ProjectId, TaskStatus, TaskType,
};
use crate::service::task_service::{ParentTarget, TaskServiceError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Wire value selecting the "No Epic" bucket as parent.
pub const NO_EPIC_PARENT_SENTINEL: &str = "no-epic";

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid digits regex"));

/// Partial update/create request. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub project_id: Option<ProjectId>,
    pub parent: Option<ParentTarget>,
    pub contributor_id: Option<ContributorId>,
    pub priority: Option<Priority>,
    pub epic_priority: Option<EpicPriority>,
    pub status: Option<TaskStatus>,
    pub estimate_type: Option<EstimateType>,
    pub story_points: Option<i64>,
    pub time_estimate: Option<i64>,
    pub is_archived: Option<bool>,
}

impl TaskPayload {
    /// Parses a request object.
    ///
    /// # Errors
    /// - `Validation` when the value is not an object or an enum label is
    ///   unknown.
    pub fn from_json(value: &Value) -> Result<Self, TaskServiceError> {
        let object = value.as_object().ok_or_else(|| TaskServiceError::Validation {
            field: "payload",
            reason: "expected a JSON object".to_string(),
        })?;

        Ok(Self {
            name: text_field(object, "name"),
            description: text_field(object, "description"),
            task_type: label_field(object, "task_type", TaskType::parse, TaskType::allowed_labels)?,
            project_id: id_field(object, "project_id"),
            parent: parent_field(object),
            contributor_id: id_field(object, "contributor_id"),
            priority: label_field(object, "priority", Priority::parse, Priority::allowed_labels)?,
            epic_priority: label_field(
                object,
                "epic_priority",
                EpicPriority::parse,
                EpicPriority::allowed_labels,
            )?,
            status: label_field(object, "status", TaskStatus::parse, TaskStatus::allowed_labels)?,
            estimate_type: label_field(
                object,
                "estimate_type",
                EstimateType::parse,
                EstimateType::allowed_labels,
            )?,
            story_points: id_field(object, "story_points"),
            time_estimate: id_field(object, "time_estimate"),
            is_archived: object.get("is_archived").and_then(coerce_bool),
        })
    }

    /// Whether the payload carries no field at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coerces a number or digit-only string into an integer.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if DIGITS_RE.is_match(trimmed) {
                trimmed.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|value| value != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn id_field(object: &Map<String, Value>, key: &str) -> Option<i64> {
    object.get(key).and_then(coerce_integer)
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
}

fn parent_field(object: &Map<String, Value>) -> Option<ParentTarget> {
    match object.get("parent_id")? {
        Value::Null => Some(ParentTarget::Root),
        Value::String(text) if text.trim() == NO_EPIC_PARENT_SENTINEL => {
            Some(ParentTarget::NoEpic)
        }
        other => coerce_integer(other).map(ParentTarget::Task),
    }
}

fn label_field<T>(
    object: &Map<String, Value>,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
    allowed: impl Fn() -> String,
) -> Result<Option<T>, TaskServiceError> {
    let Some(Value::String(text)) = object.get(key) else {
        return Ok(None);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse(trimmed)
        .map(Some)
        .ok_or_else(|| TaskServiceError::Validation {
            field: key,
            reason: format!("`{trimmed}` is not one of: {}", allowed()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_become_ids_and_junk_is_absent() {
        let payload = TaskPayload::from_json(&json!({
            "project_id": "12",
            "contributor_id": "",
            "story_points": "abc",
            "time_estimate": 45,
        }))
        .unwrap();
        assert_eq!(payload.project_id, Some(12));
        assert_eq!(payload.contributor_id, None);
        assert_eq!(payload.story_points, None);
        assert_eq!(payload.time_estimate, Some(45));
    }

    #[test]
    fn parent_field_variants() {
        let parse = |value: Value| TaskPayload::from_json(&json!({ "parent_id": value })).unwrap();
        assert_eq!(parse(json!(null)).parent, Some(ParentTarget::Root));
        assert_eq!(parse(json!("no-epic")).parent, Some(ParentTarget::NoEpic));
        assert_eq!(parse(json!("7")).parent, Some(ParentTarget::Task(7)));
        assert_eq!(parse(json!("")).parent, None);
        assert!(TaskPayload::from_json(&json!({})).unwrap().parent.is_none());
    }

    #[test]
    fn unknown_enum_label_is_validation_error() {
        let err = TaskPayload::from_json(&json!({ "status": "Done" })).unwrap_err();
        match err {
            TaskServiceError::Validation { field, reason } => {
                assert_eq!(field, "status");
                assert!(reason.contains("Not Started"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn labels_and_flags_parse() {
        let payload = TaskPayload::from_json(&json!({
            "task_type": "User Story",
            "priority": "High",
            "estimate_type": "time",
            "is_archived": "true",
            "epic_priority": "",
        }))
        .unwrap();
        assert_eq!(payload.task_type, Some(TaskType::UserStory));
        assert_eq!(payload.priority, Some(Priority::High));
        assert_eq!(payload.estimate_type, Some(EstimateType::Time));
        assert_eq!(payload.is_archived, Some(true));
        assert_eq!(payload.epic_priority, None);
    }

    #[test]
    fn non_object_is_rejected_and_empty_object_is_empty() {
        assert!(TaskPayload::from_json(&json!([1, 2])).is_err());
        assert!(TaskPayload::from_json(&json!({})).unwrap().is_empty());
    }
}

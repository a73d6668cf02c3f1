//! Tasks submitted to the task-tracking service.

use geoflag_core::{ChangeDescriptor, ChangeOperation, Entity, Flag, FixSuggestion, ItemType};
use serde_json::{Map, Value, json};

use super::UploadError;

const COOPERATIVE_VERSION: u8 = 2;
const COOPERATIVE_TYPE_TAGS: u8 = 1;

/// One flag prepared for upload.
///
/// Two tasks are the same task when their identifier and challenge match.
#[derive(Debug, Clone)]
pub struct Task {
    challenge: String,
    project: String,
    identifier: String,
    instruction: String,
    features: Vec<Value>,
    cooperative_work: Vec<Value>,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.challenge == other.challenge
    }
}

impl Eq for Task {}

impl Task {
    /// Build a task for `flag` in `challenge`. The project defaults to the
    /// flag's country.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::EmptyTask`] when the flag has no objects.
    pub fn from_flag(flag: &Flag, challenge: &str) -> Result<Self, UploadError> {
        if flag.objects().is_empty() {
            return Err(UploadError::EmptyTask {
                identifier: flag.identifier().to_owned(),
            });
        }
        let features = flag
            .objects()
            .iter()
            .map(|object| object.to_feature(flag.identifier()))
            .collect();
        let cooperative_work = flag
            .fix_suggestions()
            .iter()
            .filter_map(tag_operation)
            .collect();
        Ok(Self {
            challenge: challenge.to_owned(),
            project: flag.country().to_owned(),
            identifier: flag.identifier().to_owned(),
            instruction: flag.instructions(),
            features,
            cooperative_work,
        })
    }

    /// Replace the project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Challenge the task belongs to.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Project the challenge belongs to.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Task identifier, the flag identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Rendered instruction text.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Whether the task carries tag edits a mapper can apply directly.
    #[must_use]
    pub fn is_cooperative(&self) -> bool {
        !self.cooperative_work.is_empty()
    }

    /// Request body for this task.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut geometries = Map::new();
        geometries.insert("type".to_owned(), Value::from("FeatureCollection"));
        geometries.insert("features".to_owned(), Value::Array(self.features.clone()));
        if self.is_cooperative() {
            geometries.insert(
                "cooperativeWork".to_owned(),
                json!({
                    "meta": { "version": COOPERATIVE_VERSION, "type": COOPERATIVE_TYPE_TAGS },
                    "operations": self.cooperative_work,
                }),
            );
        }
        json!({
            "name": self.identifier,
            "parent": self.challenge,
            "instruction": self.instruction,
            "geometries": geometries,
        })
    }
}

fn element_reference(entity: &dyn Entity) -> String {
    let element = match entity.item_type() {
        ItemType::Relation => "relation",
        ItemType::Node | ItemType::Point => "node",
        ItemType::Line | ItemType::Area | ItemType::Edge => "way",
    };
    format!("{element}/{}", entity.osm_identifier())
}

// Only fixes made entirely of tag changes become cooperative operations.
fn tag_operation(fix: &FixSuggestion) -> Option<Value> {
    let descriptors = fix.descriptors();
    if descriptors.is_empty() {
        return None;
    }
    let operations = descriptors
        .iter()
        .map(|descriptor| match descriptor {
            ChangeDescriptor::Tag {
                operation: ChangeOperation::Remove,
                key,
                ..
            } => Some(json!({ "operation": "unsetTags", "data": [key] })),
            ChangeDescriptor::Tag {
                key,
                value: Some(value),
                ..
            } => Some(json!({ "operation": "setTags", "data": { key.as_str(): value } })),
            _ => None,
        })
        .collect::<Option<Vec<Value>>>()?;
    let action = match fix.operation() {
        ChangeOperation::Add => "createElement",
        ChangeOperation::Update => "modifyElement",
        ChangeOperation::Remove => "deleteElement",
    };
    Some(json!({
        "operationType": action,
        "data": {
            "id": element_reference(fix.before()),
            "operations": operations,
        },
    }))
}

//! JSON form of change descriptors.

use geo::Coord;
use serde_json::{Map, Value, json};

use super::deserialize::DeserializeError;
use crate::entity::ItemType;
use crate::fix::{ChangeDescriptor, ChangeOperation, DescriptorName};
use crate::wkt::{from_wkt, to_wkt};

const NAME: &str = "name";
const TYPE: &str = "type";
const KEY: &str = "key";
const VALUE: &str = "value";
const ORIGINAL_VALUE: &str = "originalValue";
const POSITION: &str = "position";
const BEFORE_VIEW: &str = "beforeView";
const AFTER_VIEW: &str = "afterView";
const ID: &str = "id";
const ROLE: &str = "role";
const ITEM_TYPE: &str = "itemType";

/// Encode one descriptor.
#[must_use]
pub fn encode_descriptor(descriptor: &ChangeDescriptor) -> Value {
    let mut object = Map::new();
    object.insert(NAME.to_owned(), Value::from(descriptor.name().as_str()));
    object.insert(TYPE.to_owned(), Value::from(descriptor.operation().as_str()));
    match descriptor {
        ChangeDescriptor::Tag {
            key,
            value,
            original_value,
            ..
        } => {
            object.insert(KEY.to_owned(), Value::from(key.as_str()));
            if let Some(current) = value {
                object.insert(VALUE.to_owned(), Value::from(current.as_str()));
            }
            if let Some(original) = original_value {
                object.insert(ORIGINAL_VALUE.to_owned(), Value::from(original.as_str()));
            }
        }
        ChangeDescriptor::Geometry {
            position,
            before,
            after,
            ..
        } => {
            object.insert(POSITION.to_owned(), json!(position));
            if !before.is_empty() {
                object.insert(BEFORE_VIEW.to_owned(), Value::from(to_wkt(before)));
            }
            if !after.is_empty() {
                object.insert(AFTER_VIEW.to_owned(), Value::from(to_wkt(after)));
            }
        }
        ChangeDescriptor::RelationMember {
            identifier,
            item_type,
            role,
            ..
        } => {
            object.insert(ID.to_owned(), json!(identifier));
            object.insert(ROLE.to_owned(), Value::from(role.as_str()));
            object.insert(ITEM_TYPE.to_owned(), Value::from(item_type.as_str()));
        }
    }
    Value::Object(object)
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DeserializeError> {
    object
        .get(field)
        .ok_or(DeserializeError::MissingProperty { field })?
        .as_str()
        .ok_or(DeserializeError::InvalidField {
            field,
            expected: "a string",
        })
}

fn optional_str(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn optional_wkt(object: &Map<String, Value>, field: &str) -> Result<Vec<Coord>, DeserializeError> {
    match object.get(field).and_then(Value::as_str) {
        Some(text) => Ok(from_wkt(text)?),
        None => Ok(Vec::new()),
    }
}

/// Decode one descriptor.
///
/// # Errors
///
/// Returns [`DeserializeError`] when required fields are missing, names are
/// unknown, or a geometry view is not valid WKT.
pub fn decode_descriptor(value: &Value) -> Result<ChangeDescriptor, DeserializeError> {
    let object = value.as_object().ok_or(DeserializeError::InvalidField {
        field: "descriptors",
        expected: "an array of objects",
    })?;
    let name: DescriptorName = required_str(object, NAME)?.parse()?;
    let operation: ChangeOperation = required_str(object, TYPE)?.parse()?;
    let descriptor = match name {
        DescriptorName::Tag => ChangeDescriptor::Tag {
            operation,
            key: required_str(object, KEY)?.to_owned(),
            value: optional_str(object, VALUE),
            original_value: optional_str(object, ORIGINAL_VALUE),
        },
        DescriptorName::Geometry => {
            let position = object
                .get(POSITION)
                .ok_or(DeserializeError::MissingProperty { field: POSITION })?
                .as_u64()
                .and_then(|raw| usize::try_from(raw).ok())
                .ok_or(DeserializeError::InvalidField {
                    field: POSITION,
                    expected: "a non-negative integer",
                })?;
            ChangeDescriptor::Geometry {
                operation,
                position,
                before: optional_wkt(object, BEFORE_VIEW)?,
                after: optional_wkt(object, AFTER_VIEW)?,
            }
        }
        DescriptorName::RelationMember => ChangeDescriptor::RelationMember {
            operation,
            identifier: object
                .get(ID)
                .ok_or(DeserializeError::MissingProperty { field: ID })?
                .as_i64()
                .ok_or(DeserializeError::InvalidField {
                    field: ID,
                    expected: "an integer",
                })?,
            item_type: required_str(object, ITEM_TYPE)?.parse::<ItemType>()?,
            role: optional_str(object, ROLE).unwrap_or_default(),
        },
    };
    Ok(descriptor)
}

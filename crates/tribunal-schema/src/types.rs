//! The typed representation of tool parameters and responses.
//!
//! `SchemaType` is the small tagged union the authorization schema speaks:
//! records, sets, strings, longs, booleans and entity references. Tool
//! contracts arrive as JSON-Schema and are folded into it by
//! [`from_json_schema`]; anything the conversion does not understand
//! becomes `String`.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// One attribute of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub ty: SchemaType,
    pub required: bool,
}

impl Attribute {
    pub fn required(ty: SchemaType) -> Self {
        Self { ty, required: true }
    }

    pub fn optional(ty: SchemaType) -> Self {
        Self { ty, required: false }
    }

    fn to_json(&self) -> Value {
        let mut value = self.ty.to_json();
        if !self.required {
            if let Value::Object(map) = &mut value {
                map.insert("required".to_string(), Value::Bool(false));
            }
        }
        value
    }
}

/// A type in the authorization schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    Record(BTreeMap<String, Attribute>),
    Set(Box<SchemaType>),
    String,
    Long,
    Boolean,
    /// Reference to an entity type declared in the same namespace.
    Entity(String),
}

impl SchemaType {
    pub fn is_record(&self) -> bool {
        matches!(self, SchemaType::Record(_))
    }

    /// Wrap a non-record type as `{value: <type>}` so context fields are
    /// always record-shaped. Records pass through unchanged.
    pub fn into_record(self) -> (SchemaType, bool) {
        match self {
            SchemaType::Record(_) => (self, false),
            other => {
                let mut attributes = BTreeMap::new();
                attributes.insert("value".to_string(), Attribute::required(other));
                (SchemaType::Record(attributes), true)
            }
        }
    }

    /// Render in the evaluator's JSON schema format.
    pub fn to_json(&self) -> Value {
        match self {
            SchemaType::Record(attributes) => {
                let attrs: Map<String, Value> = attributes
                    .iter()
                    .map(|(name, attr)| (name.clone(), attr.to_json()))
                    .collect();
                json!({ "type": "Record", "attributes": attrs })
            }
            SchemaType::Set(element) => json!({ "type": "Set", "element": element.to_json() }),
            SchemaType::String => json!({ "type": "String" }),
            SchemaType::Long => json!({ "type": "Long" }),
            SchemaType::Boolean => json!({ "type": "Boolean" }),
            SchemaType::Entity(name) => json!({ "type": "Entity", "name": name }),
        }
    }
}

/// Convert a JSON-Schema document into a `SchemaType`.
///
/// - `object` → `Record`; properties not listed in `required` are optional
/// - `array` → `Set` of the converted `items`
/// - `string` → `String`; `number`/`integer` → `Long`; `boolean` → `Boolean`
/// - anything else, including a non-object schema, → `String`
///
/// Type names are matched case-insensitively. A `type` array uses its first
/// member that is not `"null"`. A schema with no `type` is a record when it
/// declares `properties` and a string otherwise.
pub fn from_json_schema(schema: &Value) -> SchemaType {
    let Some(obj) = schema.as_object() else {
        return SchemaType::String;
    };

    let json_type = declared_type(obj).unwrap_or_else(|| "string".to_string());

    match json_type.as_str() {
        "object" => {
            let required: Vec<&str> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            let attributes = obj
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, prop)| {
                            let attr = Attribute {
                                ty: from_json_schema(prop),
                                required: required.contains(&name.as_str()),
                            };
                            (name.clone(), attr)
                        })
                        .collect()
                })
                .unwrap_or_default();

            SchemaType::Record(attributes)
        }
        "array" => {
            let items = obj.get("items").cloned().unwrap_or(Value::Null);
            SchemaType::Set(Box::new(from_json_schema(&items)))
        }
        "number" | "integer" => SchemaType::Long,
        "boolean" => SchemaType::Boolean,
        _ => SchemaType::String,
    }
}

/// True when every value the schema admits has a declared type.
///
/// An object needs at least one property and every property must itself
/// be fully typed; an array needs fully typed `items`. A schema without a
/// type (such as `{}`) or with a type the conversion does not know is not
/// fully typed. Only fully typed schemas become typed context fields;
/// anything else would reject values the tool legitimately produces.
pub fn is_fully_typed(schema: &Value) -> bool {
    let Some(obj) = schema.as_object() else {
        return false;
    };

    match declared_type(obj).as_deref() {
        Some("object") => obj
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| !props.is_empty() && props.values().all(is_fully_typed)),
        Some("array") => obj.get("items").is_some_and(is_fully_typed),
        Some("string" | "number" | "integer" | "boolean") => true,
        _ => false,
    }
}

/// The lowercased JSON type of a schema object. A `type` array yields its
/// first non-null member; no `type` at all is an object when `properties`
/// is declared.
fn declared_type(obj: &Map<String, Value>) -> Option<String> {
    let declared = match obj.get("type") {
        Some(Value::String(t)) => Some(t.to_ascii_lowercase()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_ascii_lowercase)
            .find(|t| t != "null"),
        _ => None,
    };
    declared.or_else(|| obj.contains_key("properties").then(|| "object".to_string()))
}

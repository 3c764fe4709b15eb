//! Record schema declarations
//!
//! Every stream declares the shape of its records once; the writer emits the
//! declaration as a JSON-schema object before the first record of a sync so
//! downstream loaders can build tables without sampling.

use serde_json::{json, Map, Value};

/// Field type in a record schema
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// 64-bit integer
    Integer,
    /// Double-precision number
    Number,
    /// Boolean
    Boolean,
    /// Calendar date serialized as `YYYY-MM-DD`
    Date,
    /// RFC 3339 timestamp
    DateTime,
    /// Array of strings
    StringArray,
    /// Nested object with declared fields
    Object(Vec<SchemaField>),
    /// Free-form object (shape passed through from the API)
    AnyObject,
}

impl FieldType {
    fn base_json(&self, required: bool) -> Value {
        let type_value = |name: &str| -> Value {
            if required {
                json!(name)
            } else {
                json!([name, "null"])
            }
        };

        match self {
            FieldType::String => json!({ "type": type_value("string") }),
            FieldType::Integer => json!({ "type": type_value("integer") }),
            FieldType::Number => json!({ "type": type_value("number") }),
            FieldType::Boolean => json!({ "type": type_value("boolean") }),
            FieldType::Date => json!({ "type": type_value("string"), "format": "date" }),
            FieldType::DateTime => {
                json!({ "type": type_value("string"), "format": "date-time" })
            }
            FieldType::StringArray => json!({
                "type": type_value("array"),
                "items": { "type": "string" },
            }),
            FieldType::Object(fields) => {
                let mut obj = schema_object(fields);
                if let Some(map) = obj.as_object_mut() {
                    if !required {
                        map.insert("type".to_string(), json!(["object", "null"]));
                    }
                }
                obj
            }
            FieldType::AnyObject => json!({ "type": type_value("object") }),
        }
    }
}

/// One declared record field
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Field name as emitted in records
    pub name: &'static str,
    /// Declared type
    pub field_type: FieldType,
    /// Whether the field is always present and non-null
    pub required: bool,
}

impl SchemaField {
    /// Declare a required field
    pub fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    /// Declare an optional (nullable) field
    pub fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }
}

/// Declared shape of a stream's records
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    fields: Vec<SchemaField>,
}

impl RecordSchema {
    /// Build a schema from field declarations
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// The declared fields
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Render as a JSON-schema object
    pub fn to_json(&self) -> Value {
        schema_object(&self.fields)
    }
}

fn schema_object(fields: &[SchemaField]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields {
        properties.insert(field.name.to_string(), field.field_type.base_json(field.required));
        if field.required {
            required.push(json!(field.name));
        }
    }

    let mut obj = Map::new();
    obj.insert("type".to_string(), json!("object"));
    obj.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        obj.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(obj)
}

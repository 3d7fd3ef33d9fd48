use serde_json::{json, Value};

/// Runtime-checked shape descriptor. One `validate` contract reused at
/// every boundary that accepts untrusted JSON: inbound messages, tool
/// arguments, and tool outputs.
#[derive(Clone, Debug)]
pub enum Schema {
    String,
    Integer,
    Number,
    Boolean,
    /// A string restricted to a fixed set of values.
    StringEnum(Vec<&'static str>),
    Array(Box<Schema>),
    Object(Vec<Field>),
}

/// A named field of an object schema.
#[derive(Clone, Debug)]
pub struct Field {
    pub name: &'static str,
    pub schema: Schema,
    pub required: bool,
    pub description: Option<&'static str>,
}

impl Field {
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("field `{path}` has wrong type: expected {expected}, got {actual}")]
    WrongType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("field `{path}` has invalid value `{value}`: must be one of {allowed:?}")]
    InvalidValue {
        path: String,
        value: String,
        allowed: Vec<&'static str>,
    },
}

impl Schema {
    pub fn object(fields: impl Into<Vec<Field>>) -> Self {
        Self::Object(fields.into())
    }

    pub fn array(items: Schema) -> Self {
        Self::Array(Box::new(items))
    }

    /// Validate a value against this schema. Side-effect free; the
    /// first violation found is returned with the path that failed.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaError> {
        match self {
            Self::String => expect(value.is_string(), value, path, "string"),
            Self::Integer => expect(value.is_i64() || value.is_u64(), value, path, "integer"),
            Self::Number => expect(value.is_number(), value, path, "number"),
            Self::Boolean => expect(value.is_boolean(), value, path, "boolean"),
            Self::StringEnum(allowed) => {
                let s = value.as_str().ok_or_else(|| SchemaError::WrongType {
                    path: path.to_string(),
                    expected: "string",
                    actual: type_name(value),
                })?;
                if allowed.contains(&s) {
                    Ok(())
                } else {
                    Err(SchemaError::InvalidValue {
                        path: path.to_string(),
                        value: s.to_string(),
                        allowed: allowed.clone(),
                    })
                }
            }
            Self::Array(items) => {
                let arr = value.as_array().ok_or_else(|| SchemaError::WrongType {
                    path: path.to_string(),
                    expected: "array",
                    actual: type_name(value),
                })?;
                for (i, item) in arr.iter().enumerate() {
                    items.validate_at(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            Self::Object(fields) => {
                let obj = value.as_object().ok_or_else(|| SchemaError::WrongType {
                    path: path.to_string(),
                    expected: "object",
                    actual: type_name(value),
                })?;
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    match obj.get(field.name) {
                        Some(v) if !v.is_null() => field.schema.validate_at(v, &field_path)?,
                        _ if field.required => {
                            return Err(SchemaError::MissingField(field_path));
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
        }
    }

    /// Render as JSON Schema for tool descriptors sent to the model.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::StringEnum(allowed) => json!({"type": "string", "enum": allowed}),
            Self::Array(items) => json!({"type": "array", "items": items.to_json_schema()}),
            Self::Object(fields) => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for field in fields {
                    let mut prop = field.schema.to_json_schema();
                    if let (Some(desc), Some(obj)) = (field.description, prop.as_object_mut()) {
                        obj.insert("description".into(), json!(desc));
                    }
                    properties.insert(field.name.to_string(), prop);
                    if field.required {
                        required.push(field.name);
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

fn expect(
    ok: bool,
    value: &Value,
    path: &str,
    expected: &'static str,
) -> Result<(), SchemaError> {
    if ok {
        Ok(())
    } else {
        Err(SchemaError::WrongType {
            path: path.to_string(),
            expected,
            actual: type_name(value),
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

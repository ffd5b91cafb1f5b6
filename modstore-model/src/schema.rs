use crate::document::parse_pointer;
use crate::{Document, ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Declares where a persistent module's fields live in its entity's document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSchema {
    pub module: String,
    pub fields: Vec<FieldBinding>,
}

impl ModuleSchema {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a binding (builder style).
    #[must_use]
    pub fn field(mut self, binding: FieldBinding) -> Self {
        self.fields.push(binding);
        self
    }

    /// Looks up the binding for a field name.
    pub fn binding(&self, field: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|b| b.field == field)
    }

    /// Rejects duplicate field names, malformed paths, and paths that are
    /// equal to or nested inside another binding's path.
    pub fn validate(&self) -> ModelResult<()> {
        let mut names = HashSet::new();
        let mut bound: Vec<(&str, Vec<String>)> = Vec::with_capacity(self.fields.len());
        for binding in &self.fields {
            if !names.insert(binding.field.as_str()) {
                return Err(self.duplicate(&binding.field));
            }
            let segments = parse_pointer(&binding.path)?;
            for (other, other_segments) in &bound {
                if *other_segments == segments {
                    return Err(self.duplicate(&binding.path));
                }
                if other_segments.starts_with(&segments) || segments.starts_with(other_segments) {
                    return Err(ModelError::InvalidPath {
                        path: binding.path.clone(),
                        reason: format!("overlaps bound path {other}"),
                    });
                }
            }
            bound.push((binding.path.as_str(), segments));
        }
        Ok(())
    }

    fn duplicate(&self, name: &str) -> ModelError {
        ModelError::DuplicateBinding {
            module: self.module.clone(),
            name: name.to_string(),
        }
    }

    fn require(&self, field: &str) -> ModelResult<&FieldBinding> {
        self.binding(field).ok_or_else(|| ModelError::UnknownField {
            module: self.module.clone(),
            field: field.to_string(),
        })
    }
}

/// One module field mapped to a JSON pointer in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Field name as the module refers to it.
    pub field: String,
    /// JSON pointer path (e.g., "/mute/muted").
    pub path: String,
    pub field_type: FieldType,
    /// Value used when the path is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldBinding {
    pub fn new(field: &str, path: &str, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            path: path.into(),
            field_type,
            default: None,
        }
    }

    /// Shorthand for a string field.
    pub fn text(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Text)
    }

    /// Shorthand for a boolean field.
    pub fn bool(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Bool)
    }

    /// Shorthand for a floating point field.
    pub fn number(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Number)
    }

    /// Shorthand for an integer field.
    pub fn integer(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Integer)
    }

    /// Shorthand for a unix-millis timestamp field.
    pub fn timestamp(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Timestamp)
    }

    /// Shorthand for a list field.
    pub fn list(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::List)
    }

    /// Shorthand for a nested map field.
    pub fn map(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Map)
    }

    /// Shorthand for an untyped JSON field.
    pub fn json(field: &str, path: &str) -> Self {
        Self::new(field, path, FieldType::Json)
    }

    /// Declares the value read when the path is absent.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn check(&self, value: &Value) -> ModelResult<()> {
        if value.is_null() || self.field_type.accepts(value) {
            return Ok(());
        }
        Err(ModelError::TypeMismatch {
            field: self.field.clone(),
            path: self.path.clone(),
            expected: self.field_type,
            found: json_kind(value),
        })
    }
}

/// The JSON shape a bound field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Bool,
    Number,
    Integer,
    Timestamp,
    List,
    Map,
    Json,
}

impl FieldType {
    /// Whether a stored value has this shape.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::Integer | Self::Timestamp => value.is_i64() || value.is_u64(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
            Self::Json => true,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed read access to a module's bound paths.
pub struct FieldReader<'a> {
    document: &'a Document,
    schema: &'a ModuleSchema,
}

impl<'a> FieldReader<'a> {
    pub fn new(document: &'a Document, schema: &'a ModuleSchema) -> Self {
        Self { document, schema }
    }

    /// Reads a field, falling back to its declared default.
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> ModelResult<T> {
        self.get_opt(field)?.ok_or_else(|| ModelError::MissingField {
            module: self.schema.module.clone(),
            field: field.to_string(),
        })
    }

    /// Reads a field; `None` when absent and undefaulted.
    pub fn get_opt<T: DeserializeOwned>(&self, field: &str) -> ModelResult<Option<T>> {
        let binding = self.schema.require(field)?;
        let value = match self.document.get(&binding.path) {
            Some(stored) => stored,
            None => match &binding.default {
                Some(default) => default,
                None => return Ok(None),
            },
        };
        binding.check(value)?;
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| ModelError::Conversion {
                field: field.to_string(),
                source,
            })
    }

    /// Reads a field, using `fallback` when absent and undefaulted.
    pub fn get_or<T: DeserializeOwned>(&self, field: &str, fallback: T) -> ModelResult<T> {
        Ok(self.get_opt(field)?.unwrap_or(fallback))
    }
}

/// Typed write access to a module's bound paths.
pub struct FieldWriter<'a> {
    document: &'a mut Document,
    schema: &'a ModuleSchema,
}

impl<'a> FieldWriter<'a> {
    pub fn new(document: &'a mut Document, schema: &'a ModuleSchema) -> Self {
        Self { document, schema }
    }

    /// Serializes `value` at the field's path.
    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> ModelResult<()> {
        let binding = self.schema.require(field)?;
        let json = serde_json::to_value(value).map_err(|source| ModelError::Conversion {
            field: field.to_string(),
            source,
        })?;
        binding.check(&json)?;
        self.document.set(&binding.path, json)
    }

    /// Writes `Some` values, removes the path for `None`.
    pub fn set_opt<T: Serialize>(&mut self, field: &str, value: Option<&T>) -> ModelResult<()> {
        match value {
            Some(value) => self.set(field, value),
            None => {
                let binding = self.schema.require(field)?;
                self.document.remove(&binding.path).map(|_| ())
            }
        }
    }
}

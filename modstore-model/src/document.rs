use crate::{ModelError, ModelResult};
use serde_json::{Map, Value};

/// One entity's persisted state: a JSON object tree addressed by JSON
/// pointers (e.g. `/mute/muted`).
///
/// A document is *virtual* when it has no on-disk representation and
/// nothing has been set into it yet. Stores hand out virtual documents
/// instead of "not found" errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
    is_virtual: bool,
}

impl Document {
    /// An empty document with no backing record.
    #[must_use]
    pub fn new_virtual() -> Self {
        Self {
            root: Value::Object(Map::new()),
            is_virtual: true,
        }
    }

    /// Wraps a loaded tree. The root must be an object.
    pub fn from_value(root: Value) -> ModelResult<Self> {
        if !root.is_object() {
            return Err(ModelError::NotAnObject);
        }
        Ok(Self {
            root,
            is_virtual: false,
        })
    }

    /// Whether the document has never been persisted nor written to.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Marks the document as having an on-disk representation.
    pub fn mark_persisted(&mut self) {
        self.is_virtual = false;
    }

    /// True when the root object has no keys.
    pub fn is_empty(&self) -> bool {
        self.root.as_object().is_none_or(Map::is_empty)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Reads the value at `path`. Null values read as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if !path.starts_with('/') {
            return None;
        }
        self.root.pointer(path).filter(|v| !v.is_null())
    }

    /// Extract a string value using a JSON pointer.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Extract a boolean value using a JSON pointer.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Extract an integer value using a JSON pointer.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    /// Writes `value` at `path`, creating intermediate objects as needed.
    /// Clears the virtual flag.
    pub fn set(&mut self, path: &str, value: Value) -> ModelResult<()> {
        let segments = parse_pointer(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| invalid(path, "pointer has no segments"))?;

        let mut node = self.root.as_object_mut().ok_or(ModelError::NotAnObject)?;
        for segment in parents {
            let child = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if child.is_null() {
                *child = Value::Object(Map::new());
            }
            node = child
                .as_object_mut()
                .ok_or_else(|| invalid(path, &format!("'{segment}' is not an object")))?;
        }
        node.insert(last.clone(), value);
        self.is_virtual = false;
        Ok(())
    }

    /// Removes the value at `path`, returning it if present.
    pub fn remove(&mut self, path: &str) -> ModelResult<Option<Value>> {
        let segments = parse_pointer(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| invalid(path, "pointer has no segments"))?;

        let mut node = self.root.as_object_mut().ok_or(ModelError::NotAnObject)?;
        for segment in parents {
            match node.get_mut(segment).and_then(Value::as_object_mut) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(node.remove(last))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new_virtual()
    }
}

/// Splits a JSON pointer into unescaped segments (`~1` → `/`, `~0` → `~`).
pub(crate) fn parse_pointer(path: &str) -> ModelResult<Vec<String>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| invalid(path, "must start with '/'"))?;
    rest.split('/')
        .map(|raw| {
            if raw.is_empty() {
                Err(invalid(path, "empty segment"))
            } else {
                Ok(raw.replace("~1", "/").replace("~0", "~"))
            }
        })
        .collect()
}

fn invalid(path: &str, reason: &str) -> ModelError {
    ModelError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

//! Flat, field-typed schema descriptors and value coercion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::error::InputError;

/// Longest excerpt of an offending value quoted in a [`FieldError`].
const FOUND_EXCERPT_CHARS: usize = 40;

/// Scalar type a field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Any text.
    #[serde(alias = "str")]
    String,
    /// A whole number that fits in `i64`.
    #[serde(alias = "int")]
    Integer,
    /// Any finite number.
    #[serde(alias = "float")]
    Number,
    /// `true` or `false`.
    #[serde(alias = "bool")]
    Boolean,
}

impl FieldType {
    /// Canonical lowercase name, as used in JSON Schema.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Parses a type name, accepting the short aliases `str`, `int`, `float`, `bool`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "integer" | "int" => Some(Self::Integer),
            "number" | "float" => Some(Self::Number),
            "boolean" | "bool" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Coerces `value` to this type, or returns `None` when it cannot be.
    ///
    /// Quoted numerics and `"true"`/`"false"` strings are accepted because
    /// models frequently quote scalars. `null`, arrays and objects never coerce.
    #[must_use]
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => integer_from_number(n),
            (Self::Integer, Value::String(s)) => integer_from_str(s.trim()),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => number_from_str(s.trim()),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
                t if t.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
                _ => None,
            },

            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn integer_from_number(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return n.as_i64().map(Value::from);
    }
    n.as_f64().and_then(integral_f64)
}

fn integer_from_str(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>().ok().and_then(integral_f64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64(f: f64) -> Option<Value> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| Value::from(f as i64))
}

fn number_from_str(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Declared type and description of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Type the extracted value must coerce to.
    #[serde(rename = "type")]
    pub expected_type: FieldType,
    /// Free-text hint shown to the model.
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    /// Creates a field spec.
    #[must_use]
    pub fn new(expected_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            expected_type,
            description: description.into(),
        }
    }

    /// Parses the `"<description>, type: <type>"` shorthand.
    ///
    /// Text without a `type:` suffix is a string field described by the whole text.
    fn from_shorthand(field: &str, text: &str) -> Result<Self, InputError> {
        let Some((description, type_name)) = text.rsplit_once("type:") else {
            return Ok(Self::new(FieldType::String, text.trim()));
        };
        let expected_type =
            FieldType::parse(type_name).ok_or_else(|| InputError::UnknownFieldType {
                field: field.to_string(),
                type_name: type_name.trim().to_string(),
            })?;
        let description = description.trim().trim_end_matches(',').trim_end();
        Ok(Self::new(expected_type, description))
    }

    fn from_object(field: &str, object: &Map<String, Value>) -> Result<Self, InputError> {
        let expected_type = match object.get("type") {
            None => FieldType::String,
            Some(Value::String(name)) => {
                FieldType::parse(name).ok_or_else(|| InputError::UnknownFieldType {
                    field: field.to_string(),
                    type_name: name.clone(),
                })?
            }
            Some(other) => {
                return Err(InputError::UnknownFieldType {
                    field: field.to_string(),
                    type_name: other.to_string(),
                })
            }
        };
        let description = object
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(Self::new(expected_type, description))
    }
}

/// Why a field of a parsed model output was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The field is absent from the output object.
    #[error("field '{field}' is missing")]
    Missing {
        /// Field name.
        field: String,
    },

    /// The field is present but cannot be coerced to the declared type.
    #[error("field '{field}' must be {expected}, found {found}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Short description of the offending value.
        found: String,
    },

    /// The coerced object still violates the descriptor's JSON Schema.
    #[error("field '{field}': {message}")]
    Constraint {
        /// Field name, or empty for object-level errors.
        field: String,
        /// Validator message.
        message: String,
    },
}

impl FieldError {
    /// Name of the field this error refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field }
            | Self::TypeMismatch { field, .. }
            | Self::Constraint { field, .. } => field,
        }
    }
}

fn describe_value(value: &Value) -> String {
    let kind = match value {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let text = value.to_string();
    if text.chars().count() > FOUND_EXCERPT_CHARS {
        let excerpt: String = text.chars().take(FOUND_EXCERPT_CHARS).collect();
        format!("{kind} {excerpt}...")
    } else {
        format!("{kind} {text}")
    }
}

/// Ordered mapping from field name to [`FieldSpec`].
///
/// Duplicate or empty names are representable so that [`validate`](Self::validate)
/// can report them; the extractor validates before every run.
///
/// # Examples
///
/// ```
/// use webai_extractor::schema::{FieldType, SchemaDescriptor};
///
/// let schema = SchemaDescriptor::new()
///     .field("code", FieldType::String, "code or number of the product")
///     .field("price", FieldType::Integer, "price of the product");
/// assert!(schema.validate().is_ok());
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    fields: Vec<(String, FieldSpec)>,
}

impl SchemaDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field (builder style).
    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        expected_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.push(name, FieldSpec::new(expected_type, description));
        self
    }

    /// Appends a field.
    pub fn push(&mut self, name: impl Into<String>, spec: FieldSpec) {
        self.fields.push((name.into(), spec));
    }

    /// Parses a descriptor from a JSON object.
    ///
    /// Each member is either `{"type": "...", "description": "..."}` or a
    /// `"<description>, type: <type>"` string. Field order follows the document.
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        let object = value.as_object().ok_or_else(|| {
            InputError::MalformedSchema("descriptor must be a JSON object".to_string())
        })?;

        let mut schema = Self::new();
        for (name, member) in object {
            let spec = match member {
                Value::String(text) => FieldSpec::from_shorthand(name, text)?,
                Value::Object(spec) => FieldSpec::from_object(name, spec)?,
                other => {
                    return Err(InputError::MalformedSchema(format!(
                        "field '{name}' must be a string or an object, found {}",
                        describe_value(other)
                    )))
                }
            };
            schema.push(name.clone(), spec);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Parses a descriptor from JSON text. See [`from_json`](Self::from_json).
    pub fn from_json_str(text: &str) -> Result<Self, InputError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| InputError::MalformedSchema(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Checks that every field name is non-empty and unique.
    pub fn validate(&self) -> Result<(), InputError> {
        let mut seen = HashSet::new();
        for (position, (name, _)) in self.fields.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(InputError::EmptyFieldName { position });
            }
            if !seen.insert(name.as_str()) {
                return Err(InputError::DuplicateField(name.clone()));
            }
        }
        Ok(())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the descriptor has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Object form: `{"name": {"type": "...", "description": "..."}, ...}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .iter()
            .map(|(name, spec)| {
                (
                    name.to_string(),
                    serde_json::json!({
                        "type": spec.expected_type.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();
        Value::Object(object)
    }

    /// JSON Schema for a conforming output object: typed properties, all required.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .iter()
            .map(|(name, spec)| {
                let mut property = Map::new();
                property.insert("type".to_string(), spec.expected_type.as_str().into());
                if !spec.description.is_empty() {
                    property.insert("description".to_string(), spec.description.clone().into());
                }
                (name.to_string(), Value::Object(property))
            })
            .collect();
        let required: Vec<Value> = self.iter().map(|(name, _)| name.into()).collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Coerces a parsed output object to this descriptor.
    ///
    /// The result holds exactly the declared fields in declaration order;
    /// extra keys are dropped. All failing fields are reported together.
    pub fn coerce(&self, object: &Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
        let mut coerced = Map::new();
        let mut errors = Vec::new();

        for (name, spec) in self.iter() {
            match object.get(name) {
                None => errors.push(FieldError::Missing {
                    field: name.to_string(),
                }),
                Some(value) => match spec.expected_type.coerce(value) {
                    Some(value) => {
                        coerced.insert(name.to_string(), value);
                    }
                    None => errors.push(FieldError::TypeMismatch {
                        field: name.to_string(),
                        expected: spec.expected_type,
                        found: describe_value(value),
                    }),
                },
            }
        }

        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err(errors)
        }
    }
}

//! Core entity traits and types for normalized metadata entities.
//!
//! An entity is built from one raw JSON record. Its metadata view is the
//! contract downstream storage relies on, so every entity kind exposes it
//! through the same object-safe [`EntityData`] trait.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

use crate::error::StructuralError;
use crate::normalize::FieldDiagnostic;

/// Ordered metadata mapping returned by [`EntityData::get_all_metadata`].
pub type Metadata = IndexMap<String, Value>;

/// Raw keys that are not core fields, preserved verbatim in input order.
pub type Overflow = IndexMap<String, Value>;

/// Object-safe view of a constructed entity.
///
/// Collections hand out entities through this trait so that callers can
/// handle every registered entity kind the same way.
pub trait EntityData: fmt::Debug + Send + Sync {
    /// Registered name of this entity kind
    fn entity_type(&self) -> &'static str;

    /// Display name of this entity
    fn name(&self) -> &str;

    /// All descriptive metadata: non-empty core fields followed by overflow.
    fn get_all_metadata(&self) -> Metadata;

    /// Raw keys that were not core fields
    fn overflow(&self) -> &Overflow;

    /// Field coercion failures recorded during construction
    fn diagnostics(&self) -> &[FieldDiagnostic];

    /// Metadata view as a JSON object
    fn metadata_json(&self) -> Value {
        Value::Object(self.get_all_metadata().into_iter().collect())
    }

    /// Convert the metadata view to a JSON string
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.get_all_metadata())
    }

    /// Convert the metadata view to an NDJSON line (newline-delimited JSON)
    fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let json = self.to_json()?;
        Ok(format!("{}\n", json))
    }
}

/// Statically typed entity kind.
///
/// # Example
///
/// ```ignore
/// use metabrowse::{Entity, EntityData};
///
/// let book = Book::from_raw(serde_json::json!({"title": "Dune"}))?;
/// assert_eq!(book.name(), "Dune");
/// ```
pub trait Entity: EntityData + Sized + 'static {
    /// The name this entity kind is registered under
    const NAME: &'static str;

    /// Core field names, in normalization order
    fn core_fields() -> Vec<&'static str>;

    /// Build an entity from one raw record.
    ///
    /// # Errors
    /// Returns [`StructuralError::RecordNotAnObject`] if `raw` is not a JSON
    /// object. Field-level problems never fail construction.
    fn from_raw(raw: Value) -> Result<Self, StructuralError>;
}

/// Name of a JSON value's type, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct TestEntity {
        name: String,
        overflow: Overflow,
    }

    impl EntityData for TestEntity {
        fn entity_type(&self) -> &'static str {
            "TestEntity"
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn get_all_metadata(&self) -> Metadata {
            let mut metadata = Metadata::new();
            metadata.insert("label".to_string(), Value::String(self.name.clone()));
            for (k, v) in &self.overflow {
                metadata.entry(k.clone()).or_insert_with(|| v.clone());
            }
            metadata
        }

        fn overflow(&self) -> &Overflow {
            &self.overflow
        }

        fn diagnostics(&self) -> &[FieldDiagnostic] {
            &[]
        }
    }

    fn sample() -> TestEntity {
        let mut overflow = Overflow::new();
        overflow.insert("age".to_string(), json!(30));
        TestEntity {
            name: "Alice".to_string(),
            overflow,
        }
    }

    #[test]
    fn test_entity_to_json() {
        let json = sample().to_json().unwrap();
        assert_eq!(json, r#"{"label":"Alice","age":30}"#);
    }

    #[test]
    fn test_entity_to_ndjson_line() {
        let line = sample().to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn test_metadata_json() {
        assert_eq!(sample().metadata_json(), json!({"label": "Alice", "age": 30}));
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!("x")), "string");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&Value::Null), "null");
    }
}

//! Collection traits and the shared array-parsing rules.

use serde_json::Value;
use std::fmt;

use crate::entity::{json_type_name, Entity, EntityData};
use crate::error::StructuralError;

/// Object-safe view of a parsed collection.
pub trait EntityCollection: fmt::Debug + Send + Sync {
    /// Registered name of this collection kind
    fn collection_type(&self) -> &'static str;

    /// Entities in input order
    fn get_entities(&self) -> Vec<&dyn EntityData>;

    fn len(&self) -> usize {
        self.get_entities().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Statically typed collection kind.
pub trait Collection: EntityCollection + Sized + 'static {
    /// The name this collection kind is registered under
    const NAME: &'static str;

    /// Entity kind held by this collection
    type Item: Entity;

    /// Parse a whole top-level document. No partial collections are produced.
    fn from_raw(raw: Value) -> Result<Self, StructuralError>;

    /// Typed, read-only view of the entities.
    fn entities(&self) -> &[Self::Item];
}

/// Parse the array under `key` of a top-level document into entities.
///
/// # Arguments
/// * `raw` - Top-level document
/// * `collection` - Collection name used in error messages
/// * `key` - Key holding the array of raw records
///
/// # Errors
/// Fails on the first structural problem: the document is not an object, the
/// key is missing or not an array, or an element is not a record.
pub fn parse_entity_array<E: Entity>(
    raw: Value,
    collection: &'static str,
    key: &'static str,
) -> Result<Vec<E>, StructuralError> {
    let mut map = match raw {
        Value::Object(map) => map,
        other => {
            return Err(StructuralError::DocumentNotAnObject {
                collection,
                found: json_type_name(&other),
            })
        }
    };

    let items = match map.remove(key) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(StructuralError::NotAnArray {
                collection,
                key,
                found: json_type_name(&other),
            })
        }
        None => return Err(StructuralError::MissingKey { collection, key }),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            E::from_raw(item).map_err(|source| StructuralError::InvalidElement {
                collection,
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

//! Type registry: entity types, collection types and detection rules.
//!
//! The registry is an explicit value. It is populated during startup and then
//! only read, so a fully built registry can be shared across threads.
//! [`TypeRegistry::global`] provides a process-wide instance with the built-in
//! types; tests and embedders build their own with [`TypeRegistry::new`].
//!
//! Detection rules are evaluated in registration order and the first match
//! wins. Registration order is therefore part of a deployment's contract.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::any::TypeId;
use std::fmt;
use std::sync::OnceLock;

use crate::book::{detect_book_format, Book, BookCollection};
use crate::collection::{Collection, EntityCollection};
use crate::config::NoMatchPolicy;
use crate::entity::{Entity, EntityData};
use crate::error::{DetectionError, IngestError, Result, StructuralError};

type ConstructEntity = fn(Value) -> std::result::Result<Box<dyn EntityData>, StructuralError>;
type ParseCollection = fn(Value) -> std::result::Result<Box<dyn EntityCollection>, StructuralError>;

fn construct_boxed<E: Entity>(raw: Value) -> std::result::Result<Box<dyn EntityData>, StructuralError> {
    Ok(Box::new(E::from_raw(raw)?))
}

fn parse_boxed<C: Collection>(raw: Value) -> std::result::Result<Box<dyn EntityCollection>, StructuralError> {
    Ok(Box::new(C::from_raw(raw)?))
}

/// Registered handle for an entity kind.
#[derive(Clone, Copy)]
pub struct EntityType {
    name: &'static str,
    type_id: TypeId,
    construct: ConstructEntity,
}

impl EntityType {
    pub fn of<E: Entity>() -> Self {
        Self {
            name: E::NAME,
            type_id: TypeId::of::<E>(),
            construct: construct_boxed::<E>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build one entity from a raw record.
    pub fn construct(&self, raw: Value) -> std::result::Result<Box<dyn EntityData>, StructuralError> {
        (self.construct)(raw)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityType").field(&self.name).finish()
    }
}

/// Registered handle for a collection kind.
#[derive(Clone, Copy)]
pub struct CollectionType {
    name: &'static str,
    type_id: TypeId,
    parse: ParseCollection,
}

impl CollectionType {
    pub fn of<C: Collection>() -> Self {
        Self {
            name: C::NAME,
            type_id: TypeId::of::<C>(),
            parse: parse_boxed::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parse a top-level document into this collection kind.
    pub fn parse(&self, raw: Value) -> std::result::Result<Box<dyn EntityCollection>, StructuralError> {
        (self.parse)(raw)
    }
}

impl PartialEq for CollectionType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CollectionType {}

impl fmt::Debug for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CollectionType").field(&self.name).finish()
    }
}

/// Predicate deciding whether a document has a given shape.
///
/// Implemented for any `Fn(&Value) -> Result<bool, DetectionError>`.
pub trait DetectionPredicate: Send + Sync {
    fn matches(&self, raw: &Value) -> std::result::Result<bool, DetectionError>;
}

impl<F> DetectionPredicate for F
where
    F: Fn(&Value) -> std::result::Result<bool, DetectionError> + Send + Sync,
{
    fn matches(&self, raw: &Value) -> std::result::Result<bool, DetectionError> {
        self(raw)
    }
}

/// A labelled predicate and the collection type it selects.
pub struct DetectionRule {
    label: String,
    predicate: Box<dyn DetectionPredicate>,
    target: CollectionType,
}

impl DetectionRule {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> CollectionType {
        self.target
    }
}

impl fmt::Debug for DetectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionRule")
            .field("label", &self.label)
            .field("target", &self.target)
            .finish()
    }
}

/// Outcome of format detection.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Matched(CollectionType),
    NoMatch,
}

impl Detection {
    /// Treat [`Detection::NoMatch`] as an error.
    pub fn into_result(self) -> Result<CollectionType> {
        match self {
            Detection::Matched(collection) => Ok(collection),
            Detection::NoMatch => Err(IngestError::NoFormatDetected),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Detection::Matched(_))
    }
}

/// Listing of registered names, for debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub entities: Vec<String>,
    pub collections: Vec<String>,
    pub detection_rules: Vec<(String, String)>,
}

/// Catalog of entity types, collection types and detection rules.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entity_types: IndexMap<String, EntityType>,
    collection_types: IndexMap<String, CollectionType>,
    detection_rules: Vec<DetectionRule>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in book types.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register_entity_type(Book::NAME, EntityType::of::<Book>());
        registry.register_collection_type(BookCollection::NAME, CollectionType::of::<BookCollection>());
        registry.register_detection_rule(
            "books array",
            detect_book_format,
            CollectionType::of::<BookCollection>(),
        );
        registry
    }

    /// Process-wide registry with the built-in types, initialised on first use.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::with_builtin_types)
    }

    /// Register an entity type. An existing name is overwritten.
    pub fn register_entity_type(&mut self, name: impl Into<String>, entity_type: EntityType) {
        let name = name.into();
        if let Some(previous) = self.entity_types.insert(name.clone(), entity_type) {
            tracing::warn!(
                name = %name,
                previous = previous.name(),
                replacement = entity_type.name(),
                "entity type re-registered, last registration wins"
            );
        }
    }

    /// Register a collection type. An existing name is overwritten in place.
    pub fn register_collection_type(&mut self, name: impl Into<String>, collection_type: CollectionType) {
        let name = name.into();
        if let Some(previous) = self.collection_types.insert(name.clone(), collection_type) {
            tracing::warn!(
                name = %name,
                previous = previous.name(),
                replacement = collection_type.name(),
                "collection type re-registered, last registration wins"
            );
        }
    }

    /// Append a detection rule. Earlier rules take priority.
    ///
    /// # Example
    ///
    /// ```ignore
    /// registry.register_detection_rule(
    ///     "albums array",
    ///     |raw: &Value| -> Result<bool, DetectionError> {
    ///         Ok(raw.get("albums").map_or(false, Value::is_array))
    ///     },
    ///     CollectionType::of::<AlbumCollection>(),
    /// );
    /// ```
    pub fn register_detection_rule<P>(
        &mut self,
        label: impl Into<String>,
        predicate: P,
        collection_type: CollectionType,
    ) where
        P: DetectionPredicate + 'static,
    {
        self.detection_rules.push(DetectionRule {
            label: label.into(),
            predicate: Box::new(predicate),
            target: collection_type,
        });
    }

    /// Select the collection type for a top-level document.
    ///
    /// Rules run in registration order. A failing predicate is logged and
    /// skipped. Returns [`Detection::NoMatch`] when nothing matches; there is
    /// no implicit fallback.
    pub fn detect_collection_type(&self, raw: &Value) -> Detection {
        for rule in &self.detection_rules {
            match rule.predicate.matches(raw) {
                Ok(true) => {
                    tracing::debug!(rule = %rule.label, collection = rule.target.name(), "detected format");
                    return Detection::Matched(rule.target);
                }
                Ok(false) => continue,
                Err(err) => {
                    tracing::warn!(
                        rule = %rule.label,
                        collection = rule.target.name(),
                        error = %err,
                        "detection failed, skipping rule"
                    );
                    continue;
                }
            }
        }

        tracing::warn!("no suitable data format detected");
        Detection::NoMatch
    }

    /// First registered collection type.
    ///
    /// Only for callers that explicitly opt into a fallback; detection never
    /// uses it.
    pub fn get_default_collection_type(&self) -> Option<CollectionType> {
        self.collection_types.values().next().copied()
    }

    pub fn get_entity_type(&self, name: &str) -> Option<EntityType> {
        self.entity_types.get(name).copied()
    }

    pub fn get_collection_type(&self, name: &str) -> Option<CollectionType> {
        self.collection_types.get(name).copied()
    }

    pub fn detection_rules(&self) -> &[DetectionRule] {
        &self.detection_rules
    }

    /// Detect the document format and parse it.
    ///
    /// # Errors
    /// * [`IngestError::NoFormatDetected`] if no rule matches
    /// * [`IngestError::Structural`] if the matched collection cannot be built
    pub fn parse_document(&self, raw: Value) -> Result<Box<dyn EntityCollection>> {
        self.parse_document_with_policy(raw, NoMatchPolicy::Error)
    }

    /// Detect and parse, applying `policy` when no rule matches.
    pub fn parse_document_with_policy(
        &self,
        raw: Value,
        policy: NoMatchPolicy,
    ) -> Result<Box<dyn EntityCollection>> {
        let collection_type = match (self.detect_collection_type(&raw), policy) {
            (Detection::Matched(collection), _) => collection,
            (Detection::NoMatch, NoMatchPolicy::Error) => return Err(IngestError::NoFormatDetected),
            (Detection::NoMatch, NoMatchPolicy::DefaultCollection) => {
                let fallback = self
                    .get_default_collection_type()
                    .ok_or(IngestError::NoCollectionTypes)?;
                tracing::info!(collection = fallback.name(), "falling back to default collection type");
                fallback
            }
        };

        Ok(collection_type.parse(raw)?)
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            entities: self.entity_types.keys().cloned().collect(),
            collections: self.collection_types.keys().cloned().collect(),
            detection_rules: self
                .detection_rules
                .iter()
                .map(|r| (r.label.clone(), r.target.name().to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Shelf {
        books: Vec<Book>,
    }

    impl EntityCollection for Shelf {
        fn collection_type(&self) -> &'static str {
            Self::NAME
        }

        fn get_entities(&self) -> Vec<&dyn EntityData> {
            self.books.iter().map(|b| b as &dyn EntityData).collect()
        }
    }

    impl Collection for Shelf {
        const NAME: &'static str = "Shelf";
        type Item = Book;

        fn from_raw(raw: Value) -> std::result::Result<Self, StructuralError> {
            let books = crate::collection::parse_entity_array(raw, Self::NAME, "shelf")?;
            Ok(Self { books })
        }

        fn entities(&self) -> &[Book] {
            &self.books
        }
    }

    fn always(raw: &Value) -> std::result::Result<bool, DetectionError> {
        Ok(raw.is_object())
    }

    fn broken(_raw: &Value) -> std::result::Result<bool, DetectionError> {
        Err(DetectionError::new("predicate exploded"))
    }

    #[test]
    fn test_builtin_registry() {
        let registry = TypeRegistry::with_builtin_types();

        assert_eq!(registry.get_entity_type("Book"), Some(EntityType::of::<Book>()));
        assert_eq!(
            registry.get_collection_type("BookCollection"),
            Some(CollectionType::of::<BookCollection>())
        );
        assert_eq!(registry.detection_rules().len(), 1);
        assert!(registry.get_entity_type("Album").is_none());
    }

    #[test]
    fn test_detect_books() {
        let registry = TypeRegistry::with_builtin_types();
        let detection = registry.detect_collection_type(&json!({"books": []}));
        assert_eq!(detection, Detection::Matched(CollectionType::of::<BookCollection>()));
    }

    #[test]
    fn test_detect_no_match() {
        let registry = TypeRegistry::with_builtin_types();
        let detection = registry.detect_collection_type(&json!({"albums": [{"title": "x"}]}));

        assert_eq!(detection, Detection::NoMatch);
        assert!(matches!(detection.into_result(), Err(IngestError::NoFormatDetected)));
    }

    #[test]
    fn test_empty_registry_detects_nothing() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.detect_collection_type(&json!({"books": []})), Detection::NoMatch);
        assert_eq!(registry.get_default_collection_type(), None);
    }

    #[test]
    fn test_first_registered_rule_wins() {
        let mut registry = TypeRegistry::new();
        registry.register_detection_rule("shelf first", always, CollectionType::of::<Shelf>());
        registry.register_detection_rule("books", detect_book_format, CollectionType::of::<BookCollection>());

        let detection = registry.detect_collection_type(&json!({"books": []}));
        assert_eq!(detection, Detection::Matched(CollectionType::of::<Shelf>()));
    }

    #[test]
    fn test_failing_predicate_is_skipped() {
        let mut registry = TypeRegistry::new();
        registry.register_detection_rule("broken", broken, CollectionType::of::<Shelf>());
        registry.register_detection_rule("books", detect_book_format, CollectionType::of::<BookCollection>());

        let detection = registry.detect_collection_type(&json!({"books": []}));
        assert_eq!(detection, Detection::Matched(CollectionType::of::<BookCollection>()));
    }

    #[test]
    fn test_closure_predicate() {
        let mut registry = TypeRegistry::new();
        registry.register_detection_rule(
            "shelf array",
            |raw: &Value| -> std::result::Result<bool, DetectionError> {
                Ok(raw.get("shelf").map_or(false, Value::is_array))
            },
            CollectionType::of::<Shelf>(),
        );

        assert!(registry.detect_collection_type(&json!({"shelf": []})).is_match());
        assert!(!registry.detect_collection_type(&json!({"books": []})).is_match());
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let mut registry = TypeRegistry::new();
        registry.register_collection_type("primary", CollectionType::of::<BookCollection>());
        registry.register_collection_type("secondary", CollectionType::of::<Shelf>());
        registry.register_collection_type("primary", CollectionType::of::<Shelf>());

        assert_eq!(registry.get_collection_type("primary"), Some(CollectionType::of::<Shelf>()));
        assert_eq!(registry.summary().collections, vec!["primary", "secondary"]);
        assert_eq!(registry.get_default_collection_type(), Some(CollectionType::of::<Shelf>()));
    }

    #[test]
    fn test_default_collection_is_first_registered() {
        let mut registry = TypeRegistry::new();
        registry.register_collection_type("BookCollection", CollectionType::of::<BookCollection>());
        registry.register_collection_type("Shelf", CollectionType::of::<Shelf>());

        assert_eq!(
            registry.get_default_collection_type(),
            Some(CollectionType::of::<BookCollection>())
        );
    }

    #[test]
    fn test_parse_document_requires_match() {
        let registry = TypeRegistry::with_builtin_types();
        let err = registry.parse_document(json!({"albums": []})).unwrap_err();
        assert!(matches!(err, IngestError::NoFormatDetected));
    }

    #[test]
    fn test_parse_document_with_default_policy() {
        let registry = TypeRegistry::with_builtin_types();

        // Detection fails but the default collection still enforces its shape
        let err = registry
            .parse_document_with_policy(json!({"albums": []}), NoMatchPolicy::DefaultCollection)
            .unwrap_err();
        assert!(matches!(err, IngestError::Structural(StructuralError::MissingKey { .. })));

        let empty = TypeRegistry::new();
        let err = empty
            .parse_document_with_policy(json!({}), NoMatchPolicy::DefaultCollection)
            .unwrap_err();
        assert!(matches!(err, IngestError::NoCollectionTypes));
    }

    #[test]
    fn test_entity_type_construct() {
        let entity = EntityType::of::<Book>().construct(json!({"title": "Emma"})).unwrap();
        assert_eq!(entity.entity_type(), "Book");
        assert_eq!(entity.name(), "Emma");
    }

    #[test]
    fn test_summary() {
        let summary = TypeRegistry::with_builtin_types().summary();
        assert_eq!(summary.entities, vec!["Book"]);
        assert_eq!(summary.collections, vec!["BookCollection"]);
        assert_eq!(
            summary.detection_rules,
            vec![("books array".to_string(), "BookCollection".to_string())]
        );
    }

    #[test]
    fn test_global_registry_has_builtins() {
        let registry = TypeRegistry::global();
        assert!(registry.get_collection_type("BookCollection").is_some());
        assert!(std::ptr::eq(registry, TypeRegistry::global()));
    }
}

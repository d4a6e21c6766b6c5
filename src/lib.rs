//! # Metabrowse: Format Detection and Entity Normalization
//!
//! Metabrowse turns heterogeneous JSON documents describing collections of
//! entities into typed entities with a predictable metadata contract.
//!
//! ## Features
//!
//! - **Type registry**: entity types, collection types and ordered detection rules
//! - **Explicit pipeline**: metadata extraction, then per-field normalizers in declared order
//! - **No data loss**: keys outside the core schema are kept verbatim as overflow
//! - **Lenient fields, strict structure**: bad field values degrade to `null` with a
//!   diagnostic, while a malformed document fails as a whole
//!
//! ## Example
//!
//! ```
//! use metabrowse::TypeRegistry;
//! use serde_json::json;
//!
//! let registry = TypeRegistry::with_builtin_types();
//! let collection = registry
//!     .parse_document(json!({
//!         "books": [{"title": " The Hobbit ", "authors": "J.R.R. Tolkien", "pages": "310", "rating": 4.5}]
//!     }))
//!     .unwrap();
//!
//! let books = collection.get_entities();
//! assert_eq!(books[0].name(), "The Hobbit");
//! assert_eq!(
//!     books[0].metadata_json(),
//!     json!({"title": "The Hobbit", "authors": ["J.R.R. Tolkien"], "pages": 310, "rating": 4.5})
//! );
//! ```
//!
//! ## Adding an entity kind
//!
//! Implement [`Entity`] and [`Collection`], then register
//! `EntityType::of::<E>()`, `CollectionType::of::<C>()` and a detection rule.
//! Existing types are untouched.

// Core modules
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod entity;
pub mod collection;
pub mod registry;

// Built-in entity kinds
pub mod book;

pub mod config;
pub mod serialization;

// Re-export key types
pub use error::{DetectionError, IngestError, StructuralError};
pub use entity::{Entity, EntityData, Metadata, Overflow};
pub use collection::{Collection, EntityCollection};
pub use normalize::{Diagnostics, FieldDiagnostic, PublicationDate};
pub use pipeline::{FieldPipeline, StagedRecord};
pub use registry::{CollectionType, Detection, EntityType, RegistrySummary, TypeRegistry};
pub use book::{Book, BookCollection};
pub use config::{IngestConfig, NoMatchPolicy, OutputFormat};
pub use serialization::{JsonArrayWriter, NdjsonWriter, SerializationError};

//! Error types for document detection and entity construction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal shape mismatch that aborts the parse of a whole collection.
///
/// Field-level coercion problems never produce this error; they degrade the
/// field to `null` and are reported as [`crate::normalize::FieldDiagnostic`]s.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("{collection} document must be a JSON object, got {found}")]
    DocumentNotAnObject {
        collection: &'static str,
        found: &'static str,
    },

    #[error("{collection} document is missing the '{key}' array")]
    MissingKey {
        collection: &'static str,
        key: &'static str,
    },

    #[error("'{key}' in {collection} document must be an array, got {found}")]
    NotAnArray {
        collection: &'static str,
        key: &'static str,
        found: &'static str,
    },

    #[error("{entity} record must be a JSON object, got {found}")]
    RecordNotAnObject {
        entity: &'static str,
        found: &'static str,
    },

    #[error("{collection} element {index} is invalid: {source}")]
    InvalidElement {
        collection: &'static str,
        index: usize,
        #[source]
        source: Box<StructuralError>,
    },
}

/// A detection predicate could not evaluate a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DetectionError(pub String);

impl DetectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced to callers of the document-level entry points.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No registered detection rule matched the document")]
    NoFormatDetected,

    #[error("No collection types are registered")]
    NoCollectionTypes,

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for IngestError {
    fn from(err: serde_yaml::Error) -> Self {
        IngestError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_element_message_includes_cause() {
        let err = StructuralError::InvalidElement {
            collection: "BookCollection",
            index: 2,
            source: Box::new(StructuralError::RecordNotAnObject {
                entity: "Book",
                found: "string",
            }),
        };

        let msg = err.to_string();
        assert!(msg.contains("element 2"));
        assert!(msg.contains("Book record must be a JSON object, got string"));
    }

    #[test]
    fn test_structural_error_converts_to_ingest_error() {
        let err: IngestError = StructuralError::MissingKey {
            collection: "BookCollection",
            key: "books",
        }
        .into();

        assert!(matches!(err, IngestError::Structural(_)));
        assert_eq!(
            err.to_string(),
            "BookCollection document is missing the 'books' array"
        );
    }
}

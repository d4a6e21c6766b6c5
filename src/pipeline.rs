//! Two-stage construction pipeline for entities.
//!
//! Stage 1 partitions a raw record into core fields and overflow and then runs
//! an optional reconciler over the partitioned record. Stage 2 runs the
//! per-field normalizers in the order they were declared. Both stages are
//! plain data, so the order is visible to callers and tests.

use indexmap::IndexMap;
use serde_json::Value;

use crate::entity::{json_type_name, Overflow};
use crate::error::StructuralError;
use crate::normalize::{Diagnostics, FieldDiagnostic};

/// Normalizer step: reads one raw core value and writes the typed field.
///
/// Missing keys are passed as `Value::Null`.
pub type FieldSetter<T> = fn(&mut T, &Value, &mut Diagnostics);

/// Rewrites a partitioned record before per-field normalization.
pub type Reconciler = fn(&mut StagedRecord);

/// A record after stage 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedRecord {
    /// Raw values of core fields
    pub core: IndexMap<String, Value>,
    /// Everything else, verbatim
    pub overflow: Overflow,
}

impl StagedRecord {
    /// Raw core value, or `Value::Null` when the key was absent.
    pub fn core_value(&self, field: &str) -> &Value {
        self.core.get(field).unwrap_or(&Value::Null)
    }
}

/// Output of a full pipeline run.
#[derive(Debug)]
pub struct Constructed<T> {
    pub fields: T,
    pub overflow: Overflow,
    pub diagnostics: Vec<FieldDiagnostic>,
}

struct FieldStep<T> {
    field: &'static str,
    apply: FieldSetter<T>,
}

/// Ordered list of `(field name, normalizer)` steps for one entity kind.
pub struct FieldPipeline<T> {
    entity: &'static str,
    steps: Vec<FieldStep<T>>,
    reconciler: Option<Reconciler>,
}

impl<T> FieldPipeline<T> {
    /// Create an empty pipeline for the named entity kind.
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            steps: Vec::new(),
            reconciler: None,
        }
    }

    /// Append a normalizer step. The field becomes a core field.
    pub fn step(mut self, field: &'static str, apply: FieldSetter<T>) -> Self {
        self.steps.push(FieldStep { field, apply });
        self
    }

    /// Set the stage 1 reconciler.
    pub fn reconcile_with(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Core field names in normalization order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.field).collect()
    }

    /// Check if a key is a core field
    pub fn is_core_field(&self, key: &str) -> bool {
        self.steps.iter().any(|s| s.field == key)
    }

    /// Stage 1: partition keys and reconcile.
    ///
    /// # Errors
    /// Returns [`StructuralError::RecordNotAnObject`] if `raw` is not an object.
    pub fn extract(&self, raw: Value) -> Result<StagedRecord, StructuralError> {
        let map = match raw {
            Value::Object(map) => map,
            other => {
                return Err(StructuralError::RecordNotAnObject {
                    entity: self.entity,
                    found: json_type_name(&other),
                })
            }
        };

        let mut staged = StagedRecord::default();
        for (key, value) in map {
            if self.is_core_field(&key) {
                staged.core.insert(key, value);
            } else {
                staged.overflow.insert(key, value);
            }
        }

        if let Some(reconcile) = self.reconciler {
            reconcile(&mut staged);
        }

        Ok(staged)
    }

    /// Stage 2: run every normalizer in declaration order.
    pub fn normalize(&self, target: &mut T, staged: &StagedRecord, diagnostics: &mut Diagnostics) {
        for step in &self.steps {
            (step.apply)(target, staged.core_value(step.field), diagnostics);
        }
    }

    /// Run both stages, starting from `T::default()`.
    pub fn construct(&self, raw: Value) -> Result<Constructed<T>, StructuralError>
    where
        T: Default,
    {
        let staged = self.extract(raw)?;

        let mut fields = T::default();
        let mut diagnostics = Diagnostics::new();
        self.normalize(&mut fields, &staged, &mut diagnostics);

        Ok(Constructed {
            fields,
            overflow: staged.overflow,
            diagnostics: diagnostics.into_vec(),
        })
    }
}

//! Error types for the compiler.

use thiserror::Error;

/// Result type alias for compiler operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// A single compile-time error.
///
/// Every variant corresponds to an entry in the compiler's public error
/// taxonomy. Errors are raised synchronously during compilation; none are
/// retried or swallowed (the result formatter, C8, never throws — see
/// [`crate::format`]).
#[derive(Debug, Error)]
pub enum CompileError {
    /// A model could not be resolved by slug or plural slug.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A field could not be resolved on a model by dotted path.
    #[error("Field not found: {field} on model {model}")]
    FieldNotFound { model: String, field: String },

    /// An index could not be resolved by slug on a model.
    #[error("Index not found: {index} on model {model}")]
    IndexNotFound { model: String, index: String },

    /// A trigger could not be resolved by slug on a model.
    #[error("Trigger not found: {trigger} on model {model}")]
    TriggerNotFound { model: String, trigger: String },

    /// A preset could not be resolved by slug.
    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    /// A required attribute was missing from a meta-query body.
    #[error("Missing field '{field}' in {context}")]
    MissingField { context: String, field: String },

    /// A required top-level instruction was missing.
    #[error("Missing instruction '{instruction}' for {query_type} query")]
    MissingInstruction {
        query_type: String,
        instruction: String,
    },

    /// A `with` subtree resolved to an empty or unmatchable value.
    #[error("Invalid `with` value at '{field}': {reason}")]
    InvalidWithValue { field: String, reason: String },

    /// A `to` subtree resolved to an invalid value.
    #[error("Invalid `to` value at '{field}': {reason}")]
    InvalidToValue { field: String, reason: String },

    /// An `including` entry could not be compiled.
    #[error("Invalid `including` value at '{name}': {reason}")]
    InvalidIncludingValue { name: String, reason: String },

    /// An `orderedBy`/`selecting` entry referenced something invalid.
    #[error("Invalid value for {instruction}: {reason}")]
    InvalidForValue { instruction: String, reason: String },

    /// `before`/`after` cursor could not be decoded, or both were given.
    #[error("Invalid `before`/`after` cursor: {0}")]
    InvalidBeforeOrAfterInstruction(String),

    /// A model/field/index/trigger/preset meta-value was malformed.
    #[error("Invalid model value: {0}")]
    InvalidModelValue(String),

    /// Two instructions were supplied that cannot both be honored.
    #[error("Mutually exclusive instructions: {0} and {1}")]
    MutuallyExclusiveInstructions(&'static str, &'static str),

    /// A `create` meta-query targeted an entity that already exists.
    #[error("{kind} '{slug}' already exists on model '{model}'")]
    ExistingModelEntity {
        kind: &'static str,
        model: String,
        slug: String,
    },

    /// An `alter`/`drop` meta-query is missing an entity it requires.
    #[error("{kind} '{slug}' is required on model '{model}' but is absent")]
    RequiredModelEntity {
        kind: &'static str,
        model: String,
        slug: String,
    },

    /// Catch-all for malformed JSON shapes that don't match any recognized
    /// query/instruction/symbol grammar.
    #[error("Invalid query shape: {0}")]
    InvalidQueryShape(String),
}

impl CompileError {
    pub fn invalid_with(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWithValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_to(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_including(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIncludingValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }
}

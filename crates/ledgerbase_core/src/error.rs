//! Error types for the mapping core.

use thiserror::Error;

use crate::key::Key;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in mapping-core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Substrate error.
    #[error("storage error: {0}")]
    Storage(#[from] ledgerbase_storage::StorageError),

    /// No entity exists under the given natural key.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity type that was looked up.
        entity: String,
        /// The key that did not resolve.
        key: Key,
    },

    /// An entity with this natural key already exists.
    #[error("duplicate {entity} key: {key}")]
    DuplicateKey {
        /// Entity type being created.
        entity: String,
        /// The conflicting key.
        key: Key,
    },

    /// A foreign-key value does not resolve to an existing entity.
    #[error("reference not found: {field} does not resolve to an existing {entity}: {key}")]
    ReferenceNotFound {
        /// The referenced entity type.
        entity: String,
        /// The field carrying the reference.
        field: String,
        /// The key that did not resolve.
        key: Key,
    },

    /// A filter criterion addressed a versioned or derived field.
    ///
    /// Filtering through an active-version join is deliberately not
    /// supported; this is a hard contract, not a missing feature.
    #[error("unsupported filter: {field} on {entity} resolves through a version record and cannot be filtered")]
    UnsupportedFilter {
        /// Entity type being filtered.
        entity: String,
        /// The rejected field.
        field: String,
    },

    /// A field name is not declared in the entity's schema.
    #[error("unknown field {field} on {entity}")]
    UnknownField {
        /// Entity type being addressed.
        entity: String,
        /// The undeclared field.
        field: String,
    },

    /// A natural-key field was absent or null where one is required.
    #[error("missing key field {field} for {entity}")]
    MissingKey {
        /// Entity type being created or looked up.
        entity: String,
        /// The absent key field.
        field: String,
    },

    /// No entity type with this name is registered.
    #[error("unknown entity type: {name}")]
    UnknownEntity {
        /// The unregistered name.
        name: String,
    },

    /// A field value was rejected by the entity's field policy.
    #[error("invalid field {field} on {entity}: {message}")]
    InvalidField {
        /// Entity type being written.
        entity: String,
        /// The offending field.
        field: String,
        /// Why it was rejected.
        message: String,
    },

    /// A schema declaration is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the inconsistency.
        message: String,
    },

    /// Stored state contradicts a core invariant.
    ///
    /// Signals a bug or a concurrent-write race (for example two active
    /// version rows for one parent). Fatal for the enclosing transaction;
    /// never resolved by silently picking a survivor.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(entity: impl Into<String>, key: Key) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key,
        }
    }

    /// Creates a duplicate-key error.
    pub fn duplicate_key(entity: impl Into<String>, key: Key) -> Self {
        Self::DuplicateKey {
            entity: entity.into(),
            key,
        }
    }

    /// Creates a reference-not-found error.
    pub fn reference_not_found(
        entity: impl Into<String>,
        field: impl Into<String>,
        key: Key,
    ) -> Self {
        Self::ReferenceNotFound {
            entity: entity.into(),
            field: field.into(),
            key,
        }
    }

    /// Creates an unsupported-filter error.
    pub fn unsupported_filter(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnsupportedFilter {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown-field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates a missing-key error.
    pub fn missing_key(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingKey {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown-entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }

    /// Creates an invalid-field error.
    pub fn invalid_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invariant-violation error.
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }
}

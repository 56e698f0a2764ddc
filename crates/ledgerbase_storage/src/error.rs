//! Error types for storage operations.

use thiserror::Error;

use crate::row::RowId;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named table has not been created on this backend.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the missing table.
        name: String,
    },

    /// A table with this name already exists.
    #[error("table already exists: {name}")]
    TableExists {
        /// Name of the conflicting table.
        name: String,
    },

    /// A column name is not declared in the table's spec.
    #[error("column not found: {column} in table {table}")]
    ColumnNotFound {
        /// Table that was addressed.
        table: String,
        /// The unknown column.
        column: String,
    },

    /// The addressed row does not exist.
    #[error("row not found: {row} in table {table}")]
    RowNotFound {
        /// Table that was addressed.
        table: String,
        /// The missing row id.
        row: RowId,
    },

    /// Operation not permitted on a committed or aborted transaction.
    #[error("transaction no longer active: {message}")]
    TransactionInactive {
        /// Description of the attempted operation.
        message: String,
    },
}

impl StorageError {
    /// Creates a table-not-found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a row-not-found error.
    pub fn row_not_found(table: impl Into<String>, row: RowId) -> Self {
        Self::RowNotFound {
            table: table.into(),
            row,
        }
    }

    /// Creates a transaction-inactive error.
    pub fn transaction_inactive(message: impl Into<String>) -> Self {
        Self::TransactionInactive {
            message: message.into(),
        }
    }
}

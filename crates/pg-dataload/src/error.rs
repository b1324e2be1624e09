//! Error types for the loader library.

use thiserror::Error;

/// Main error type for load operations.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or statement error
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Metadata lookup returned no columns for the table
    #[error("Table {schema}.{table} not found (no columns in information_schema)")]
    TableNotFound { schema: String, table: String },

    /// Target table already exists and the existence policy is 'fail'
    #[error("Table {0} already exists and if_exists is 'fail'")]
    TableExists(String),

    /// Table has no uniqueness constraint (required for update mode)
    #[error("Table {0} has no uniqueness constraint - pin one with pin_constraint")]
    NoConstraintFound(String),

    /// Table has more than one uniqueness constraint
    #[error("Table {table} has multiple constraints ({names:?}) - pin one with pin_constraint")]
    AmbiguousConstraint { table: String, names: Vec<String> },

    /// One or more reported column types have no catalog entry
    #[error("Unresolved column types for table {table}: {columns:?}")]
    DataTypeUnresolved { table: String, columns: Vec<String> },

    /// A row's value count does not match the dataset's column count
    #[error("Row {index} has {actual} values but the dataset has {expected} columns")]
    RowArity {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// A designated key column is not present in the dataset
    #[error("Key column {column} is not a column of the dataset for table {table}")]
    KeyColumn { table: String, column: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LoadError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        LoadError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for load operations.
pub type Result<T> = std::result::Result<T, LoadError>;

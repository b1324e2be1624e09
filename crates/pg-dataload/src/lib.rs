//! # pg-dataload
//!
//! Upsert-aware PostgreSQL table loader for in-memory tabular data.
//!
//! Given a table name and a batch of rows, the loader either appends the
//! rows (plain bulk insert over COPY) or reconciles them against existing
//! ones with one parameterized `INSERT ... ON CONFLICT ON CONSTRAINT ...
//! DO UPDATE` statement per row, keyed on a uniqueness constraint discovered
//! from the table's `information_schema` metadata:
//!
//! - **Type discovery**: each column's declared type is resolved against a
//!   fixed catalog of seven PostgreSQL types; anything else fails the load.
//! - **Constraint discovery**: the table's single uniqueness constraint is
//!   looked up once and cached per loader instance. Tables with zero or
//!   multiple constraints must be disambiguated with `pin_constraint`.
//! - **Existence policy**: fail, replace (truncate), or append when the
//!   target table already exists and update mode is off.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_dataload::{Config, Dataset, LoadOptions, Loader, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_dataload::LoadError> {
//!     let config = Config::load("config.yaml")?;
//!     let loader = Loader::connect(config).await?;
//!
//!     let mut users = Dataset::new(vec!["id".into(), "name".into()]);
//!     users.push_row(vec![Value::Int(1), Value::from("Alice")])?;
//!
//!     loader.load_with(&users, "users", &LoadOptions::update()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod loader;
pub mod schema;
pub mod target;
pub mod typemap;

#[cfg(test)]
mod testsupport;

// Re-exports for convenient access
pub use config::{Config, IfExists, LoaderConfig, TargetConfig};
pub use error::{LoadError, Result};
pub use frame::{Dataset, Value};
pub use loader::{LoadOptions, Loader};
pub use schema::SchemaInspector;
pub use target::{ColumnTypes, PgPool, TargetPool};
pub use typemap::PgType;

//! Load orchestration.
//!
//! The [`Loader`] resolves a table's column types, applies the configured
//! existence policy, and either appends the dataset via COPY or reconciles
//! it row by row against the table's uniqueness constraint.

use crate::config::{Config, IfExists};
use crate::error::{LoadError, Result};
use crate::frame::Dataset;
use crate::schema::SchemaInspector;
use crate::target::{PgPool, TargetPool};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call load options.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Reconcile rows against existing ones instead of plain appending.
    pub update_existing: bool,

    /// Columns excluded from the upsert's UPDATE SET clause. When empty,
    /// the dataset's first column is treated as the key. This mirrors the
    /// historical convention: column 0 is never updated, whether or not it
    /// is actually the key, so callers with a differently ordered dataset
    /// should name their key columns here.
    pub key_columns: Vec<String>,
}

impl LoadOptions {
    /// Options for an update-mode load keyed on the dataset's first column.
    pub fn update() -> Self {
        Self {
            update_existing: true,
            key_columns: Vec::new(),
        }
    }

    /// Options for an update-mode load with explicitly named key columns.
    pub fn update_keyed(key_columns: Vec<String>) -> Self {
        Self {
            update_existing: true,
            key_columns,
        }
    }
}

/// Entry point: loads in-memory tabular datasets into PostgreSQL tables.
pub struct Loader {
    config: Config,
    pool: Arc<dyn TargetPool>,
    inspector: SchemaInspector,
}

impl Loader {
    /// Create a loader over an existing target pool.
    pub fn new(config: Config, pool: Arc<dyn TargetPool>) -> Self {
        let inspector = SchemaInspector::new(
            config.target.database.clone(),
            config.target.schema.clone(),
            pool.clone(),
        );
        Self {
            config,
            pool,
            inspector,
        }
    }

    /// Create a loader with its own [`PgPool`] built from the configuration.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = Arc::new(PgPool::connect(&config.target, config.target.max_connections).await?);
        Ok(Self::new(config, pool))
    }

    /// Pre-populate the constraint cache for a table whose constraint the
    /// metadata lookup cannot resolve (zero or multiple matches).
    pub fn pin_constraint(&self, table: &str, constraint: &str) {
        self.inspector.pin_constraint(table, constraint);
    }

    /// Load a dataset with the default options (plain append/replace/fail
    /// per the configured existence policy). Returns the rows written.
    pub async fn load(&self, dataset: &Dataset, table: &str) -> Result<u64> {
        self.load_with(dataset, table, &LoadOptions::default()).await
    }

    /// Load a dataset into a table.
    ///
    /// Column types are always resolved first and any unresolved type aborts
    /// the load. In update mode the constraint name is also resolved before
    /// any row is written, so a constraint failure leaves the table
    /// untouched. Each upserted row is its own unit of work: a mid-load
    /// failure leaves prior rows committed.
    pub async fn load_with(
        &self,
        dataset: &Dataset,
        table: &str,
        options: &LoadOptions,
    ) -> Result<u64> {
        let schema = &self.config.target.schema;
        info!(
            "Loading {} rows into {}.{} (update_existing={})",
            dataset.len(),
            schema,
            table,
            options.update_existing
        );

        let types = self.inspector.column_types(table).await?;

        let written = if options.update_existing {
            let constraint = self.inspector.constraint_name(table).await?;
            let key_cols = self.key_columns(dataset, table, options)?;

            let mut written = 0u64;
            for chunk in dataset.rows().chunks(self.config.loader.chunk_size) {
                written += self
                    .pool
                    .upsert_rows(
                        schema,
                        table,
                        &constraint,
                        dataset.columns(),
                        &key_cols,
                        &types,
                        chunk,
                    )
                    .await?;
                debug!("Upserted {}/{} rows into {}.{}", written, dataset.len(), schema, table);
            }
            written
        } else {
            if self.pool.table_exists(schema, table).await? {
                match self.config.loader.if_exists {
                    IfExists::Fail => return Err(LoadError::TableExists(table.to_string())),
                    IfExists::Replace => self.pool.truncate_table(schema, table).await?,
                    IfExists::Append => {}
                }
            }

            self.pool
                .insert_rows(schema, table, dataset.columns(), dataset.rows())
                .await?
        };

        info!("Finished loading {} rows into {}.{}", written, schema, table);
        Ok(written)
    }

    /// Determine the key columns for an update-mode load and verify they
    /// are all present in the dataset.
    fn key_columns(
        &self,
        dataset: &Dataset,
        table: &str,
        options: &LoadOptions,
    ) -> Result<Vec<String>> {
        if options.key_columns.is_empty() {
            let first = dataset.columns().first().ok_or_else(|| {
                LoadError::Config(format!("dataset for table {} has no columns", table))
            })?;
            return Ok(vec![first.clone()]);
        }

        for key in &options.key_columns {
            if !dataset.columns().contains(key) {
                return Err(LoadError::KeyColumn {
                    table: table.to_string(),
                    column: key.clone(),
                });
            }
        }
        Ok(options.key_columns.clone())
    }
}

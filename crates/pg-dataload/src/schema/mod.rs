//! Table metadata inspection.
//!
//! Resolves column type descriptors and the uniqueness constraint name the
//! upsert path targets. Constraint names are cached per inspector instance;
//! the cache is never evicted and an entry is never overwritten once set.

use crate::error::{LoadError, Result};
use crate::target::{ColumnTypes, TargetPool};
use crate::typemap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Instance-scoped table name -> constraint name mapping.
///
/// Populated on first successful single-constraint resolution, or explicitly
/// via [`SchemaInspector::pin_constraint`] for tables the metadata lookup
/// cannot disambiguate.
#[derive(Debug, Default)]
struct ConstraintCache {
    inner: Mutex<HashMap<String, String>>,
}

impl ConstraintCache {
    fn get(&self, table: &str) -> Option<String> {
        self.inner.lock().expect("constraint cache poisoned").get(table).cloned()
    }

    fn insert(&self, table: &str, constraint: &str) {
        self.inner
            .lock()
            .expect("constraint cache poisoned")
            .entry(table.to_string())
            .or_insert_with(|| constraint.to_string());
    }
}

/// Queries `information_schema` views for a table's column types and
/// uniqueness constraint.
pub struct SchemaInspector {
    database: String,
    schema: String,
    pool: Arc<dyn TargetPool>,
    cache: ConstraintCache,
}

impl SchemaInspector {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, pool: Arc<dyn TargetPool>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            pool,
            cache: ConstraintCache::default(),
        }
    }

    /// Resolve every column's declared type for a table.
    ///
    /// An empty metadata result means the table does not exist in the
    /// configured schema. Any column whose reported type is outside the
    /// catalog fails the whole call; a partial type map is never returned.
    pub async fn column_types(&self, table: &str) -> Result<ColumnTypes> {
        let meta = self.pool.column_metadata(&self.schema, table).await?;

        if meta.is_empty() {
            return Err(LoadError::TableNotFound {
                schema: self.schema.clone(),
                table: table.to_string(),
            });
        }

        let mut types = ColumnTypes::new();
        let mut unresolved = Vec::new();

        for (column, reported) in meta {
            match typemap::resolve(&reported) {
                Some(pg_type) => {
                    types.insert(column, pg_type);
                }
                None => unresolved.push(column),
            }
        }

        if !unresolved.is_empty() {
            unresolved.sort();
            return Err(LoadError::DataTypeUnresolved {
                table: table.to_string(),
                columns: unresolved,
            });
        }

        Ok(types)
    }

    /// Resolve the single uniqueness constraint name for a table.
    ///
    /// The first successful resolution is cached for the inspector's
    /// lifetime; later calls for the same table do not query metadata.
    /// Zero or multiple matching constraints fail without touching the
    /// cache; callers disambiguate with [`pin_constraint`](Self::pin_constraint).
    pub async fn constraint_name(&self, table: &str) -> Result<String> {
        if let Some(name) = self.cache.get(table) {
            debug!("Constraint cache hit for {}: {}", table, name);
            return Ok(name);
        }

        let names = self
            .pool
            .constraint_names(&self.database, &self.schema, table)
            .await?;

        match names.len() {
            1 => {
                let name = names.into_iter().next().unwrap_or_default();
                self.cache.insert(table, &name);
                debug!("Resolved constraint for {}: {}", table, name);
                Ok(name)
            }
            0 => Err(LoadError::NoConstraintFound(table.to_string())),
            _ => Err(LoadError::AmbiguousConstraint {
                table: table.to_string(),
                names,
            }),
        }
    }

    /// Pre-populate the cache entry for a table, bypassing metadata lookup.
    pub fn pin_constraint(&self, table: &str, constraint: &str) {
        self.cache.insert(table, constraint);
    }
}

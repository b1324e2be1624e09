//! Shared in-memory fake of [`TargetPool`] for unit tests.

use crate::error::Result;
use crate::frame::Value;
use crate::target::{ColumnTypes, TargetPool};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fake target pool that serves canned metadata and counts every call.
pub struct FakePool {
    pub columns: Vec<(String, String)>,
    pub constraints: Vec<String>,
    pub exists: bool,
    pub metadata_queries: AtomicUsize,
    pub constraint_queries: AtomicUsize,
    pub truncates: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub inserted: AtomicU64,
    pub upserted: AtomicU64,
    pub last_key_cols: Mutex<Vec<String>>,
    pub last_constraint: Mutex<String>,
}

impl Default for FakePool {
    fn default() -> Self {
        Self::with_columns(vec![
            ("id".to_string(), "integer".to_string()),
            ("name".to_string(), "character varying".to_string()),
            (
                "updated_at".to_string(),
                "timestamp without time zone".to_string(),
            ),
        ])
    }
}

impl FakePool {
    pub fn with_columns(columns: Vec<(String, String)>) -> Self {
        Self {
            columns,
            constraints: vec!["pk_id".to_string()],
            exists: true,
            metadata_queries: AtomicUsize::new(0),
            constraint_queries: AtomicUsize::new(0),
            truncates: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            inserted: AtomicU64::new(0),
            upserted: AtomicU64::new(0),
            last_key_cols: Mutex::new(Vec::new()),
            last_constraint: Mutex::new(String::new()),
        }
    }

    pub fn with_constraints(constraints: Vec<String>) -> Self {
        let mut pool = Self::default();
        pool.constraints = constraints;
        pool
    }

    /// Total rows written through either path.
    pub fn rows_written(&self) -> u64 {
        self.inserted.load(Ordering::SeqCst) + self.upserted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetPool for FakePool {
    async fn table_exists(&self, _schema: &str, _table: &str) -> Result<bool> {
        Ok(self.exists)
    }

    async fn truncate_table(&self, _schema: &str, _table: &str) -> Result<()> {
        self.truncates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn column_metadata(&self, _schema: &str, _table: &str) -> Result<Vec<(String, String)>> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.columns.clone())
    }

    async fn constraint_names(
        &self,
        _database: &str,
        _schema: &str,
        _table: &str,
    ) -> Result<Vec<String>> {
        self.constraint_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.constraints.clone())
    }

    async fn insert_rows(
        &self,
        _schema: &str,
        _table: &str,
        _cols: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        self.inserted.fetch_add(rows.len() as u64, Ordering::SeqCst);
        Ok(rows.len() as u64)
    }

    async fn upsert_rows(
        &self,
        _schema: &str,
        _table: &str,
        constraint: &str,
        _cols: &[String],
        key_cols: &[String],
        _types: &ColumnTypes,
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.upserted.fetch_add(rows.len() as u64, Ordering::SeqCst);
        *self.last_key_cols.lock().unwrap() = key_cols.to_vec();
        *self.last_constraint.lock().unwrap() = constraint.to_string();
        Ok(rows.len() as u64)
    }
}

//! PostgreSQL target database operations.
//!
//! [`TargetPool`] is the seam between the loader and a live database: metadata
//! lookups, the COPY append path, and the per-row upsert path. [`PgPool`] is
//! the production implementation on a `deadpool-postgres` pool; tests supply
//! fakes.

use crate::config::TargetConfig;
use crate::error::{LoadError, Result};
use crate::frame::Value;
use crate::typemap::PgType;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::SinkExt;
use std::collections::HashMap;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info};

/// Resolved column type descriptors, keyed by column name.
pub type ColumnTypes = HashMap<String, PgType>;

/// Trait for target database operations.
#[async_trait]
pub trait TargetPool: Send + Sync {
    /// Check if a table exists.
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool>;

    /// Truncate a table.
    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()>;

    /// Fetch `(column_name, data_type)` pairs for a table from
    /// `information_schema.columns`, in ordinal order.
    async fn column_metadata(&self, schema: &str, table: &str) -> Result<Vec<(String, String)>>;

    /// Fetch the distinct constraint names governing a table, from
    /// `information_schema.key_column_usage` joined to `table_constraints`.
    async fn constraint_names(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<String>>;

    /// Append rows using the COPY protocol.
    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64>;

    /// Upsert rows one statement at a time, resolving conflicts against the
    /// named constraint. Rows arrive in caller-chosen chunks; each row is
    /// still its own unit of work.
    async fn upsert_rows(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        cols: &[String],
        key_cols: &[String],
        types: &ColumnTypes,
        rows: &[Vec<Value>],
    ) -> Result<u64>;
}

/// PostgreSQL target pool implementation.
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Create a new PostgreSQL target pool and verify connectivity.
    pub async fn connect(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| LoadError::pool(e, "creating PostgreSQL pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl TargetPool for PgPool {
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for table_exists"))?;

        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&schema, &table],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for truncate_table"))?;

        let sql = format!("TRUNCATE TABLE {}", qualify_table(schema, table));
        client.execute(&sql, &[]).await?;

        debug!("Truncated table {}.{}", schema, table);
        Ok(())
    }

    async fn column_metadata(&self, schema: &str, table: &str) -> Result<Vec<(String, String)>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for column_metadata"))?;

        let query = r#"
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&schema, &table]).await?;

        let cols = rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect::<Vec<_>>();

        debug!("Loaded {} columns for {}.{}", cols.len(), schema, table);
        Ok(cols)
    }

    async fn constraint_names(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<String>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for constraint_names"))?;

        // key_column_usage has one row per constrained column; DISTINCT
        // collapses composite keys to a single constraint name.
        let query = r#"
            SELECT DISTINCT tc.constraint_name
            FROM information_schema.key_column_usage AS kcu
            JOIN information_schema.table_constraints AS tc
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_catalog = kcu.table_catalog
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE kcu.table_catalog = $1
                AND kcu.constraint_schema = $2
                AND kcu.table_name = $3
            ORDER BY tc.constraint_name
        "#;

        let rows = client.query(query, &[&database, &schema, &table]).await?;

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for insert_rows"))?;

        let col_list: String = cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let copy_stmt = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            qualify_table(schema, table),
            col_list
        );

        let sink = client.copy_in(&copy_stmt).await?;
        futures::pin_mut!(sink);

        const FLUSH_EVERY: usize = 10_000;
        let mut buf = BytesMut::with_capacity(1024 * 1024);
        let row_count = rows.len();

        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    buf.put_u8(b'\t');
                }
                buf.extend_from_slice(value_to_copy_text(value).as_bytes());
            }
            buf.put_u8(b'\n');

            if (i + 1) % FLUSH_EVERY == 0 || i + 1 == row_count {
                sink.send(buf.split().freeze()).await?;
            }
        }

        let copied = sink.finish().await?;
        Ok(copied)
    }

    async fn upsert_rows(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        cols: &[String],
        key_cols: &[String],
        types: &ColumnTypes,
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e, "getting connection for upsert_rows"))?;

        let sql = build_upsert_sql(schema, table, constraint, cols, key_cols, types);

        // Declare every parameter as text. Without this, PREPARE assigns each
        // placeholder its cast's target type (integer, jsonb, ...), and the
        // string binds below would be rejected client-side. Declared as text,
        // the ::casts convert server-side.
        let param_types = vec![Type::TEXT; cols.len()];
        let stmt = client.prepare_typed(&sql, &param_types).await?;

        let mut total = 0u64;
        for row in rows {
            let params: Vec<Option<String>> = row.iter().map(Value::to_param).collect();
            let param_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            match client.execute(&stmt, &param_refs).await {
                Ok(n) => total += n,
                Err(e) => {
                    tracing::error!(
                        "Upsert failed for {}.{} on constraint {}: {}",
                        schema,
                        table,
                        constraint,
                        e
                    );
                    return Err(LoadError::Postgres(e));
                }
            }
        }

        Ok(total)
    }
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table name.
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Build a single-row parameterized upsert statement.
///
/// Placeholders are cast server-side using each column's resolved descriptor;
/// columns missing from `types` are bound untyped. Conflict resolution
/// targets the named constraint, and the UPDATE SET clause covers every
/// column not designated as a key column. A dataset whose columns are all
/// key columns degenerates to `DO NOTHING`.
pub fn build_upsert_sql(
    schema: &str,
    table: &str,
    constraint: &str,
    cols: &[String],
    key_cols: &[String],
    types: &ColumnTypes,
) -> String {
    let col_list: String = cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let placeholders: Vec<String> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let cast = types.get(c).map(PgType::cast).unwrap_or("");
            format!("${}{}", i + 1, cast)
        })
        .collect();

    let update_cols: Vec<String> = cols
        .iter()
        .filter(|c| !key_cols.contains(c))
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect();

    if update_cols.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ON CONSTRAINT {} DO NOTHING",
            qualify_table(schema, table),
            col_list,
            placeholders.join(", "),
            quote_ident(constraint)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ON CONSTRAINT {} DO UPDATE SET {}",
            qualify_table(schema, table),
            col_list,
            placeholders.join(", "),
            quote_ident(constraint),
            update_cols.join(", ")
        )
    }
}

/// Convert a value to text format for COPY.
/// Escapes special characters: backslash, tab, newline, carriage return.
pub fn value_to_copy_text(value: &Value) -> String {
    match value {
        Value::Null => "\\N".to_string(),
        Value::SmallInt(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Text(s) => escape_copy_text(s),
        Value::Json(v) => escape_copy_text(&v.to_string()),
        Value::Timestamp(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }
}

/// Escape special characters for COPY text format.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_types() -> ColumnTypes {
        let mut types = ColumnTypes::new();
        types.insert("id".to_string(), PgType::Integer);
        types.insert("name".to_string(), PgType::Varchar);
        types.insert("updated_at".to_string(), PgType::Timestamp);
        types
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upsert_sql_excludes_key_column_from_set() {
        let sql = build_upsert_sql(
            "public",
            "users",
            "pk_id",
            &cols(&["id", "name", "updated_at"]),
            &cols(&["id"]),
            &demo_types(),
        );

        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"users\" (\"id\", \"name\", \"updated_at\") \
             VALUES ($1::integer, $2::varchar, $3::timestamp) \
             ON CONFLICT ON CONSTRAINT \"pk_id\" \
             DO UPDATE SET \"name\" = EXCLUDED.\"name\", \"updated_at\" = EXCLUDED.\"updated_at\""
        );
    }

    #[test]
    fn test_upsert_sql_key_only_table_does_nothing() {
        let sql = build_upsert_sql(
            "public",
            "tags",
            "pk_tag",
            &cols(&["id"]),
            &cols(&["id"]),
            &demo_types(),
        );
        assert!(sql.ends_with("ON CONFLICT ON CONSTRAINT \"pk_tag\" DO NOTHING"));
    }

    #[test]
    fn test_upsert_sql_untyped_fallback_for_unknown_column() {
        let sql = build_upsert_sql(
            "public",
            "users",
            "pk_id",
            &cols(&["id", "mystery"]),
            &cols(&["id"]),
            &demo_types(),
        );
        assert!(sql.contains("$1::integer"));
        assert!(sql.contains("($1::integer, $2)"));
    }

    #[test]
    fn test_upsert_sql_composite_key() {
        let sql = build_upsert_sql(
            "public",
            "memberships",
            "uq_user_group",
            &cols(&["user_id", "group_id", "role"]),
            &cols(&["user_id", "group_id"]),
            &ColumnTypes::new(),
        );
        assert!(sql.contains("DO UPDATE SET \"role\" = EXCLUDED.\"role\""));
        assert!(!sql.contains("\"user_id\" = EXCLUDED"));
        assert!(!sql.contains("\"group_id\" = EXCLUDED"));
    }

    #[test]
    fn test_string_params_require_text_declaration() {
        // Parameters are rendered as strings, which checked binding only
        // accepts for text-typed placeholders. The cast target types the
        // upsert statement emits ($n::integer, $n::jsonb, $n::timestamp)
        // all reject a string bind, so upsert_rows must prepare with every
        // parameter declared as text and leave conversion to the ::casts.
        let param: Option<String> = Some("42".to_string());
        let mut buf = bytes::BytesMut::new();

        assert!(param.to_sql_checked(&Type::TEXT, &mut buf).is_ok());
        assert!(param.to_sql_checked(&Type::VARCHAR, &mut buf).is_ok());
        for ty in [Type::INT2, Type::INT4, Type::INT8, Type::JSONB, Type::TIMESTAMP] {
            assert!(
                param.to_sql_checked(&ty, &mut buf).is_err(),
                "string bind unexpectedly accepted for {ty}"
            );
        }
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_copy_text_escaping() {
        assert_eq!(value_to_copy_text(&Value::Null), "\\N");
        assert_eq!(
            value_to_copy_text(&Value::Text("a\tb\nc\\d".to_string())),
            "a\\tb\\nc\\\\d"
        );
        assert_eq!(value_to_copy_text(&Value::Int(42)), "42");
        assert_eq!(
            value_to_copy_text(&Value::Json(serde_json::json!(["x"]))),
            "[\"x\"]"
        );
    }
}

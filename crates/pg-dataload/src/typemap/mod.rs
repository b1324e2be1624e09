//! Catalog of recognized PostgreSQL column types.
//!
//! The loader only declares and binds the types listed here. Anything else
//! reported by `information_schema.columns` is treated as unresolved and
//! surfaces as [`LoadError::DataTypeUnresolved`](crate::LoadError) at the
//! inspection layer; `resolve` itself never fails.

/// Semantic descriptor for a recognized PostgreSQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgType {
    BigInt,
    Varchar,
    Integer,
    SmallInt,
    Text,
    Jsonb,
    Timestamp,
}

impl PgType {
    /// The `information_schema` spelling of this type.
    pub fn name(&self) -> &'static str {
        match self {
            PgType::BigInt => "bigint",
            PgType::Varchar => "character varying",
            PgType::Integer => "integer",
            PgType::SmallInt => "smallint",
            PgType::Text => "text",
            PgType::Jsonb => "jsonb",
            PgType::Timestamp => "timestamp without time zone",
        }
    }

    /// SQL cast suffix applied to a placeholder bound for a column of this
    /// type. Values are transmitted as text and cast server-side.
    pub fn cast(&self) -> &'static str {
        match self {
            PgType::BigInt => "::bigint",
            PgType::Varchar => "::varchar",
            PgType::Integer => "::integer",
            PgType::SmallInt => "::smallint",
            PgType::Text => "::text",
            PgType::Jsonb => "::jsonb",
            PgType::Timestamp => "::timestamp",
        }
    }
}

/// Map a type name reported by `information_schema.columns` to its
/// descriptor. Returns `None` for anything outside the fixed catalog.
pub fn resolve(reported: &str) -> Option<PgType> {
    match reported {
        "bigint" => Some(PgType::BigInt),
        "character varying" => Some(PgType::Varchar),
        "integer" => Some(PgType::Integer),
        "smallint" => Some(PgType::SmallInt),
        "text" => Some(PgType::Text),
        "jsonb" => Some(PgType::Jsonb),
        "timestamp without time zone" => Some(PgType::Timestamp),
        _ => None,
    }
}

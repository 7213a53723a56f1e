//! Binding [`QueryParam`]s to database-specific queries.

use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Scalars bind natively on every driver; only JSON differs.
macro_rules! bind_scalar {
    ($query:ident, $param:expr, |$v:ident| $json:expr) => {
        match $param {
            QueryParam::Null => $query.bind(None::<String>),
            QueryParam::Bool(v) => $query.bind(*v),
            QueryParam::Int(v) => $query.bind(*v),
            QueryParam::Float(v) => $query.bind(*v),
            QueryParam::String(v) => $query.bind(v.as_str()),
            QueryParam::Json($v) => $json,
        }
    };
}

pub(crate) fn bind_mysql_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> Query<'q, MySql, MySqlArguments> {
    bind_scalar!(query, param, |v| query.bind(Json(v)))
}

pub(crate) fn bind_postgres_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> Query<'q, Postgres, PgArguments> {
    bind_scalar!(query, param, |v| query.bind(Json(v)))
}

/// SQLite has no native JSON type, so JSON is stored as text.
pub(crate) fn bind_sqlite_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    bind_scalar!(query, param, |v| query.bind(v.to_string()))
}

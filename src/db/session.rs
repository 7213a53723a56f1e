//! sqlx-backed sessions.
//!
//! An auto-commit session holds a plain pooled connection; a transactional session holds a
//! `Transaction` begun on the pool. Mapped operations run SQL through [`SqlSession::execute`]
//! and the `fetch_*` methods, which bind [`QueryParam`]s and convert rows to JSON objects.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Session;
use crate::models::{DatabaseType, QueryParam};
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::{Database, MySql, Pool, Postgres, Sqlite, Transaction};
use tracing::{debug, warn};

/// One row, columns in select order.
type JsonRow = Map<String, Value>;

/// A pooled connection, with or without an open transaction.
enum Handle<DB: Database> {
    AutoCommit(PoolConnection<DB>),
    Transactional(Transaction<'static, DB>),
}

impl<DB: Database> Handle<DB> {
    async fn open(pool: &Pool<DB>, auto_commit: bool) -> Result<Self, sqlx::Error> {
        if auto_commit {
            Ok(Self::AutoCommit(pool.acquire().await?))
        } else {
            Ok(Self::Transactional(pool.begin().await?))
        }
    }

    fn connection(&mut self) -> &mut DB::Connection {
        match self {
            Self::AutoCommit(conn) => &mut **conn,
            Self::Transactional(tx) => &mut **tx,
        }
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Transactional(tx) => tx.commit().await,
            Self::AutoCommit(_) => Ok(()),
        }
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Transactional(tx) => tx.rollback().await,
            Self::AutoCommit(_) => Ok(()),
        }
    }

    fn is_transactional(&self) -> bool {
        matches!(self, Self::Transactional(_))
    }
}

enum SessionHandle {
    MySql(Handle<MySql>),
    Postgres(Handle<Postgres>),
    SQLite(Handle<Sqlite>),
}

impl SessionHandle {
    async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(h) => h.commit().await,
            Self::Postgres(h) => h.commit().await,
            Self::SQLite(h) => h.commit().await,
        }
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(h) => h.rollback().await,
            Self::Postgres(h) => h.rollback().await,
            Self::SQLite(h) => h.rollback().await,
        }
    }

    fn is_transactional(&self) -> bool {
        match self {
            Self::MySql(h) => h.is_transactional(),
            Self::Postgres(h) => h.is_transactional(),
            Self::SQLite(h) => h.is_transactional(),
        }
    }
}

/// A session on one sqlx pool.
///
/// After `commit` or `rollback` the connection goes back to the pool; further statements on
/// the same session fail.
pub struct SqlSession {
    environment: String,
    db_type: DatabaseType,
    auto_commit: bool,
    handle: Option<SessionHandle>,
}

impl SqlSession {
    pub(crate) async fn open(
        pool: &DbPool,
        environment: &str,
        auto_commit: bool,
    ) -> GatewayResult<Self> {
        let handle = match pool {
            DbPool::MySql(pool) => SessionHandle::MySql(Handle::open(pool, auto_commit).await?),
            DbPool::Postgres(pool) => {
                SessionHandle::Postgres(Handle::open(pool, auto_commit).await?)
            }
            DbPool::SQLite(pool) => SessionHandle::SQLite(Handle::open(pool, auto_commit).await?),
        };
        debug!(environment = %environment, auto_commit, "Session opened");
        Ok(Self {
            environment: environment.to_string(),
            db_type: pool.db_type(),
            auto_commit,
            handle: Some(handle),
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn handle(&mut self) -> GatewayResult<&mut SessionHandle> {
        self.handle.as_mut().ok_or_else(|| {
            GatewayError::connection(
                "Session already finished",
                "Open a new session for further statements",
            )
        })
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> GatewayResult<u64> {
        let affected = match self.handle()? {
            SessionHandle::MySql(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                query.execute(h.connection()).await?.rows_affected()
            }
            SessionHandle::Postgres(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                query.execute(h.connection()).await?.rows_affected()
            }
            SessionHandle::SQLite(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(h.connection()).await?.rows_affected()
            }
        };
        Ok(affected)
    }

    /// Run a query and return every row as a JSON object.
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> GatewayResult<Vec<JsonRow>> {
        let rows: Vec<JsonRow> = match self.handle()? {
            SessionHandle::MySql(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                let rows = query.fetch_all(h.connection()).await?;
                rows.iter().map(RowToJson::to_json_map).collect()
            }
            SessionHandle::Postgres(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                let rows = query.fetch_all(h.connection()).await?;
                rows.iter().map(RowToJson::to_json_map).collect()
            }
            SessionHandle::SQLite(h) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                let rows = query.fetch_all(h.connection()).await?;
                rows.iter().map(RowToJson::to_json_map).collect()
            }
        };
        Ok(rows)
    }

    /// Run a query and return the first row, if any.
    pub async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> GatewayResult<Option<JsonRow>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Run a query returning one value: the first column of the first row, or `Null`.
    pub async fn fetch_scalar(&mut self, sql: &str, params: &[QueryParam]) -> GatewayResult<Value> {
        let row = self.fetch_optional(sql, params).await?;
        Ok(row
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or(Value::Null))
    }
}

impl Session for SqlSession {
    fn environment(&self) -> &str {
        &self.environment
    }

    async fn commit(&mut self) -> GatewayResult<()> {
        let handle = self.handle.take().ok_or_else(|| {
            GatewayError::connection("Session already finished", "Open a new session")
        })?;
        handle.commit().await?;
        debug!(environment = %self.environment, "Committed");
        Ok(())
    }

    async fn rollback(&mut self) -> GatewayResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.rollback().await?;
        debug!(environment = %self.environment, "Rolled back");
        Ok(())
    }

    async fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_transactional() {
                if let Err(e) = handle.rollback().await {
                    warn!(environment = %self.environment, error = %e, "Rollback on close failed");
                }
            }
        }
        debug!(environment = %self.environment, "Session closed");
    }
}

impl std::fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSession")
            .field("environment", &self.environment)
            .field("db_type", &self.db_type)
            .field("auto_commit", &self.auto_commit)
            .field("finished", &self.handle.is_none())
            .finish()
    }
}

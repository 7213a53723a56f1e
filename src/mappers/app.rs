//! Backend identity probes: which server, which database user, which connection.

use crate::error::GatewayResult;
use crate::db::SqlSession;
use crate::gateway::{Dispatcher, Mapper, OperationRegistry, ParamShape, Params, Session, SessionFactory};
use crate::models::DatabaseType;
use serde_json::Value;
use tracing::{error, info};

pub const SELECT_SERVER: &str = "selectServer";
pub const SELECT_SESSION_ID: &str = "selectSessionId";
pub const SELECT_USERNAME: &str = "selectUsername";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Server,
    SessionId,
    Username,
}

impl Probe {
    fn sql(&self, db_type: DatabaseType) -> &'static str {
        match (self, db_type) {
            (Self::Server, DatabaseType::MySQL) => "SELECT @@hostname AS value",
            (Self::Server, DatabaseType::PostgreSQL) => {
                "SELECT COALESCE(inet_server_addr()::text, 'localhost') AS value"
            }
            (Self::Server, DatabaseType::SQLite) => {
                "SELECT file AS value FROM pragma_database_list WHERE name = 'main'"
            }
            (Self::SessionId, DatabaseType::MySQL) => "SELECT CAST(CONNECTION_ID() AS CHAR) AS value",
            (Self::SessionId, DatabaseType::PostgreSQL) => "SELECT pg_backend_pid()::text AS value",
            // SQLite has no server-side session; the open database is the closest identity
            (Self::SessionId, DatabaseType::SQLite) => "SELECT 'main' AS value",
            (Self::Username, DatabaseType::MySQL) => "SELECT CURRENT_USER() AS value",
            (Self::Username, DatabaseType::PostgreSQL) => "SELECT current_user::text AS value",
            (Self::Username, DatabaseType::SQLite) => "SELECT '' AS value",
        }
    }

    async fn run(self, session: &mut SqlSession) -> GatewayResult<Value> {
        let sql = self.sql(session.db_type());
        session.fetch_scalar(sql, &[]).await
    }
}

/// Diagnostic mapper for [`SqlSession`]s.
pub struct AppMapper;

impl Mapper<SqlSession> for AppMapper {
    fn register(registry: &mut OperationRegistry<SqlSession>) {
        registry
            .register(SELECT_SERVER, ParamShape::None, |session, _| {
                Box::pin(Probe::Server.run(session))
            })
            .register(SELECT_SESSION_ID, ParamShape::None, |session, _| {
                Box::pin(Probe::SessionId.run(session))
            })
            .register(SELECT_USERNAME, ParamShape::None, |session, _| {
                Box::pin(Probe::Username.run(session))
            });
    }
}

/// Identity of the backend behind one session factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub environment: String,
    pub server: String,
    pub username: String,
    pub session_id: String,
}

impl DiagnosticReport {
    /// Open an auto-commit session and run every probe. Failed probes are logged and left
    /// empty.
    pub async fn collect<F>(factory: &F) -> GatewayResult<Self>
    where
        F: SessionFactory<Session = SqlSession>,
    {
        let dispatcher = Dispatcher::new(AppMapper::registry());
        let mut session = factory.open_session(true).await?;

        let mut report = DiagnosticReport {
            environment: session.environment().to_string(),
            ..Default::default()
        };
        report.server = probe(&dispatcher, &mut session, SELECT_SERVER).await;
        report.username = probe(&dispatcher, &mut session, SELECT_USERNAME).await;
        report.session_id = probe(&dispatcher, &mut session, SELECT_SESSION_ID).await;
        session.close().await;

        info!(
            environment = %report.environment,
            server = %report.server,
            username = %report.username,
            session_id = %report.session_id,
            "Backend identity"
        );
        Ok(report)
    }
}

async fn probe(dispatcher: &Dispatcher<SqlSession>, session: &mut SqlSession, operation: &str) -> String {
    match dispatcher.invoke(session, operation, Params::None).await {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => String::new(),
        Ok(other) => other.to_string(),
        Err(e) => {
            error!(operation = %operation, error = %e, "Diagnostic probe failed");
            String::new()
        }
    }
}

//! Error types for the persistence gateway.
//!
//! `Configuration` is the only fatal variant: it means no session factory could be built for a
//! topology/tenant. Every other variant describes a failure of a single operation and is
//! absorbed by the DAO façade into an empty or default result.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error for environment '{environment}': {message}")]
    Configuration {
        message: String,
        environment: String,
        suggestion: String,
    },

    #[error("Operation '{operation}' with parameters {shape} not found on mapper {mapper}")]
    OperationNotFound {
        mapper: String,
        operation: String,
        shape: String,
    },

    #[error("Operation '{operation}' failed: {source}")]
    BackendInvocation {
        operation: String,
        source: Box<GatewayError>,
    },

    #[error("Cannot construct default instance of {type_name}: {message}")]
    DefaultConstruction { type_name: String, message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Decode error: {message}")]
    Decode { message: String },
}

impl GatewayError {
    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(
        environment: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            environment: environment.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an operation-not-found error.
    pub fn operation_not_found(
        mapper: impl Into<String>,
        operation: impl Into<String>,
        shape: impl Into<String>,
    ) -> Self {
        Self::OperationNotFound {
            mapper: mapper.into(),
            operation: operation.into(),
            shape: shape.into(),
        }
    }

    /// Wrap an inner failure raised while running a mapper operation.
    pub fn backend_invocation(operation: impl Into<String>, source: GatewayError) -> Self {
        Self::BackendInvocation {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn default_construction(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DefaultConstruction {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. }
            | Self::Connection { suggestion, .. }
            | Self::Database { suggestion, .. } => Some(suggestion),
            Self::BackendInvocation { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Whether the façade may absorb this error into a default result.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// The innermost error, unwrapping any `BackendInvocation` layers.
    pub fn root_cause(&self) -> &GatewayError {
        match self {
            Self::BackendInvocation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convert sqlx errors to GatewayError.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => GatewayError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::database(
                    db_err.message(),
                    code,
                    "Check the mapped SQL and the referenced objects",
                )
            }
            sqlx::Error::RowNotFound => GatewayError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => GatewayError::connection(
                "Timed out acquiring a pooled connection",
                "Increase acquire_timeout or max_connections for this environment",
            ),
            sqlx::Error::PoolClosed => GatewayError::connection(
                "Connection pool is closed",
                "The session factory was shut down",
            ),
            sqlx::Error::Io(io_err) => GatewayError::connection(
                format!("I/O error: {io_err}"),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => GatewayError::connection(
                format!("TLS error: {tls_err}"),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => GatewayError::connection(
                format!("Protocol error: {msg}"),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                GatewayError::decode(format!("Column not found: {col}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GatewayError::decode(format!(
                "Column index {index} out of bounds (len: {len})"
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::decode(format!("Failed to decode column {index}: {source}"))
            }
            sqlx::Error::Decode(source) => GatewayError::decode(source.to_string()),
            sqlx::Error::TypeNotFound { type_name } => {
                GatewayError::decode(format!("Type not found: {type_name}"))
            }
            other => GatewayError::database(
                format!("Unexpected database error: {other}"),
                None,
                "Check the database server logs",
            ),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::decode(err.to_string())
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

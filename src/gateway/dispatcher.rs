//! Runs named operations against a session and turns failures into recovery defaults.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::entity::Entity;
use crate::gateway::mapper::{OperationRegistry, Params, short_type_name};
use crate::gateway::session::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves and invokes operations from one mapper's registry.
pub struct Dispatcher<S> {
    registry: Arc<OperationRegistry<S>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Session> Dispatcher<S> {
    pub fn new(registry: OperationRegistry<S>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &OperationRegistry<S> {
        &self.registry
    }

    fn mapper_name(&self) -> &'static str {
        short_type_name(self.registry.mapper())
    }

    /// Invoke `operation` on a mapper handle bound to `session`.
    ///
    /// Lookup misses come back as `OperationNotFound`; anything the operation itself raises
    /// is wrapped in `BackendInvocation`.
    pub async fn invoke(
        &self,
        session: &mut S,
        operation: &str,
        params: Params,
    ) -> GatewayResult<Value> {
        debug!(
            mapper = self.mapper_name(),
            operation = %operation,
            shape = %params.shape(),
            environment = %session.environment(),
            "Invoking operation"
        );
        let mut handle = self.registry.handle(session);
        handle
            .call(operation, params)
            .await
            .map_err(|e| match e {
                e @ (GatewayError::OperationNotFound { .. }
                | GatewayError::BackendInvocation { .. }) => e,
                other => GatewayError::backend_invocation(operation, other),
            })
    }

    /// Run a list query. Null results and failures become an empty list.
    pub async fn query_list<T: DeserializeOwned>(
        &self,
        session: &mut S,
        operation: &str,
        params: Params,
    ) -> Vec<T> {
        let value = match self.invoke(session, operation, params).await {
            Ok(value) => value,
            Err(e) => {
                self.log_failure(operation, &e);
                return Vec::new();
            }
        };

        let rows = match value {
            Value::Null => return Vec::new(),
            Value::Array(rows) => rows,
            single => vec![single],
        };

        match rows
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(items) => items,
            Err(e) => {
                self.log_failure(operation, &GatewayError::backend_invocation(operation, e.into()));
                Vec::new()
            }
        }
    }

    /// Run a single-object query. Null results and failures become `T::default_instance()`;
    /// `None` only if that fails too.
    pub async fn query_object<T: Entity>(
        &self,
        session: &mut S,
        operation: &str,
        params: Params,
    ) -> Option<T> {
        let value = match self.invoke(session, operation, params).await {
            Ok(value) => value,
            Err(e) => {
                self.log_failure(operation, &e);
                return default_instance::<T>(operation);
            }
        };

        let value = match value {
            Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
            other => other,
        };
        if value.is_null() {
            return default_instance::<T>(operation);
        }

        match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                self.log_failure(operation, &GatewayError::backend_invocation(operation, e.into()));
                default_instance::<T>(operation)
            }
        }
    }

    /// Run a mutating operation inside a caller-owned session. Failures become `Null`.
    pub async fn execute_dml(&self, session: &mut S, operation: &str, params: Params) -> Value {
        match self.invoke(session, operation, params).await {
            Ok(value) => value,
            Err(e) => {
                self.log_failure(operation, &e);
                Value::Null
            }
        }
    }

    fn log_failure(&self, operation: &str, err: &GatewayError) {
        error!(
            mapper = self.mapper_name(),
            operation = %operation,
            error = %err,
            cause = %err.root_cause(),
            "Operation failed"
        );
    }
}

pub(crate) fn default_instance<T: Entity>(operation: &str) -> Option<T> {
    match T::default_instance() {
        Ok(item) => Some(item),
        Err(e) => {
            error!(
                fatal = true,
                operation = %operation,
                error = %e,
                "Cannot construct default result"
            );
            None
        }
    }
}

/// Whether a mutation result reports affected rows: a number that is zero or more.
pub fn rows_affected(result: &Value) -> bool {
    match result {
        Value::Number(n) => n.as_u64().is_some() || n.as_f64().is_some_and(|v| v >= 0.0),
        _ => false,
    }
}

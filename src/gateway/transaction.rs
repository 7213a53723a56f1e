//! Standalone mutations: one session, one transaction, one operation.

use crate::gateway::dispatcher::Dispatcher;
use crate::gateway::mapper::Params;
use crate::gateway::session::{Session, SessionFactory};
use serde_json::Value;
use tracing::{debug, error};

/// How a standalone mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Committed,
    RolledBack,
    /// Commit was attempted and failed; nothing took effect.
    CommitFailed,
    /// No session could be opened.
    NotOpened,
}

impl TransactionState {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// Operation result; `Null` unless the transaction committed.
    pub result: Value,
    pub state: TransactionState,
}

/// Wraps a mutating operation in its own transaction.
///
/// The session is opened without auto-commit, committed when the operation returns a
/// non-null result and rolled back otherwise. It is closed on every path.
pub struct TransactionalExecutor<S> {
    dispatcher: Dispatcher<S>,
}

impl<S: Session> TransactionalExecutor<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self { dispatcher }
    }

    pub async fn execute<F>(&self, factory: &F, operation: &str, params: Params) -> TransactionOutcome
    where
        F: SessionFactory<Session = S>,
    {
        let mut session = match factory.open_session(false).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    environment = %factory.environment(),
                    operation = %operation,
                    error = %e,
                    "Cannot open session"
                );
                return TransactionOutcome {
                    result: Value::Null,
                    state: TransactionState::NotOpened,
                };
            }
        };

        let result = self
            .dispatcher
            .execute_dml(&mut session, operation, params)
            .await;

        let outcome = if result.is_null() {
            if let Err(e) = session.rollback().await {
                error!(operation = %operation, error = %e, "Rollback failed");
            }
            TransactionOutcome {
                result: Value::Null,
                state: TransactionState::RolledBack,
            }
        } else {
            match session.commit().await {
                Ok(()) => TransactionOutcome {
                    result,
                    state: TransactionState::Committed,
                },
                Err(e) => {
                    error!(operation = %operation, error = %e, "Commit failed");
                    TransactionOutcome {
                        result: Value::Null,
                        state: TransactionState::CommitFailed,
                    }
                }
            }
        };

        debug!(
            environment = %session.environment(),
            operation = %operation,
            state = ?outcome.state,
            "Transaction finished"
        );
        session.close().await;
        outcome
    }
}

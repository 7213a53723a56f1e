//! In-memory backend for gateway tests.
//!
//! Factories and sessions count every construction, open, close, commit and rollback so tests
//! can check session and transaction accounting. Operation results are scripted per
//! operation name on a shared [`MockBackend`].

#![allow(dead_code)]

use persistence_gateway::config::{EnvironmentConfig, EnvironmentCatalog, GatewaySettings};
use persistence_gateway::gateway::{
    ArgKind, Entity, FactoryBuilder, Mapper, OperationFuture, OperationRegistry, ParamShape,
    Params, Session, SessionFactory, SessionFactoryCache,
};
use persistence_gateway::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Counters {
    pub build_attempts: AtomicUsize,
    pub constructions: AtomicUsize,
    pub factory_closes: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

impl Counters {
    pub fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn constructions(&self) -> usize {
        Self::load(&self.constructions)
    }

    pub fn build_attempts(&self) -> usize {
        Self::load(&self.build_attempts)
    }

    pub fn opened(&self) -> usize {
        Self::load(&self.opened)
    }

    pub fn closed(&self) -> usize {
        Self::load(&self.closed)
    }

    pub fn commits(&self) -> usize {
        Self::load(&self.commits)
    }

    pub fn rollbacks(&self) -> usize {
        Self::load(&self.rollbacks)
    }
}

/// Scripted operation results plus a log of invoked operations.
#[derive(Debug, Default)]
pub struct MockBackend {
    responses: Mutex<HashMap<String, Result<Value, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn respond(&self, operation: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(operation.to_string(), Ok(value));
    }

    pub fn fail(&self, operation: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(operation.to_string(), Err(message.to_string()));
    }

    /// Scripted result for `operation`; `Null` when nothing was scripted.
    pub fn response(&self, operation: &str) -> GatewayResult<Value> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self.responses.lock().unwrap().get(operation) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(GatewayError::database(message.clone(), None, "scripted")),
            None => Ok(Value::Null),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBuilder {
    pub counters: Arc<Counters>,
    pub backend: Arc<MockBackend>,
    failing_environments: HashSet<String>,
    build_delay: Duration,
    fail_open: bool,
    fail_commit: bool,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construction fails for the named environment.
    pub fn failing(mut self, environment: &str) -> Self {
        self.failing_environments.insert(environment.to_string());
        self
    }

    /// Sleep during construction to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }
}

impl FactoryBuilder for MockBuilder {
    type Factory = MockFactory;

    async fn build(&self, environment: &EnvironmentConfig) -> GatewayResult<MockFactory> {
        self.counters.build_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        if self.failing_environments.contains(&environment.name) {
            return Err(GatewayError::connection(
                format!("cannot reach {}", environment.name),
                "scripted failure",
            ));
        }
        self.counters.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(MockFactory {
            environment: environment.name.clone(),
            connection_string: environment.connection_string.clone(),
            counters: Arc::clone(&self.counters),
            backend: Arc::clone(&self.backend),
            fail_open: self.fail_open,
            fail_commit: self.fail_commit,
        })
    }
}

#[derive(Debug)]
pub struct MockFactory {
    environment: String,
    pub connection_string: String,
    counters: Arc<Counters>,
    backend: Arc<MockBackend>,
    fail_open: bool,
    fail_commit: bool,
}

impl SessionFactory for MockFactory {
    type Session = MockSession;

    fn environment(&self) -> &str {
        &self.environment
    }

    async fn open_session(&self, auto_commit: bool) -> GatewayResult<MockSession> {
        if self.fail_open {
            return Err(GatewayError::connection("pool exhausted", "scripted"));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            environment: self.environment.clone(),
            auto_commit,
            counters: Arc::clone(&self.counters),
            backend: Arc::clone(&self.backend),
            fail_commit: self.fail_commit,
        })
    }

    async fn close(&self) {
        self.counters.factory_closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockSession {
    environment: String,
    pub auto_commit: bool,
    counters: Arc<Counters>,
    backend: Arc<MockBackend>,
    fail_commit: bool,
}

impl MockSession {
    pub fn backend(&self) -> &MockBackend {
        &self.backend
    }
}

impl Session for MockSession {
    fn environment(&self) -> &str {
        &self.environment
    }

    async fn commit(&mut self) -> GatewayResult<()> {
        if self.fail_commit {
            return Err(GatewayError::database("deadlock detected", Some("40001".into()), "retry"));
        }
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> GatewayResult<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Widget {
    pub id: i64,
    pub name: String,
}

impl Entity for Widget {}

/// An entity without a usable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gizmo {
    pub id: i64,
}

impl Entity for Gizmo {}

/// Full CRUD mapper whose operations return whatever the backend has scripted.
pub struct WidgetMapper;

impl Mapper<MockSession> for WidgetMapper {
    fn register(registry: &mut OperationRegistry<MockSession>) {
        registry
            .register("selectAll", ParamShape::None, scripted("selectAll"))
            .register("selectAll", ParamShape::Keyed, scripted("selectAll"))
            .register(
                "selectById",
                ParamShape::positional([ArgKind::Integer]),
                scripted("selectById"),
            )
            .register("selectById", ParamShape::Keyed, scripted("selectById"))
            .register("selectById", ParamShape::bean::<Widget>(), scripted("selectById"))
            .register("insert", ParamShape::bean::<Widget>(), scripted("insert"))
            .register("update", ParamShape::bean::<Widget>(), scripted("update"))
            .register("delete", ParamShape::bean::<Widget>(), scripted("delete"))
            .register("delete", ParamShape::Keyed, scripted("delete"))
            .register(
                "archive",
                ParamShape::positional([ArgKind::Integer, ArgKind::Text]),
                scripted("archive"),
            );
    }
}

/// Same mapper for an entity without a usable default.
pub struct GizmoMapper;

impl Mapper<MockSession> for GizmoMapper {
    fn register(registry: &mut OperationRegistry<MockSession>) {
        registry
            .register("selectAll", ParamShape::None, scripted("selectAll"))
            .register(
                "selectById",
                ParamShape::positional([ArgKind::Integer]),
                scripted("selectById"),
            );
    }
}

fn scripted(
    name: &'static str,
) -> impl for<'s> Fn(&'s mut MockSession, Params) -> OperationFuture<'s> + Send + Sync + 'static {
    move |session, _params| {
        let result = session.backend().response(name);
        Box::pin(async move { result })
    }
}

/// A mapper with no operations at all.
pub struct EmptyMapper;

impl Mapper<MockSession> for EmptyMapper {
    fn register(_registry: &mut OperationRegistry<MockSession>) {}
}

pub fn settings(environments: &[(&str, &str)]) -> GatewaySettings {
    let mut catalog = EnvironmentCatalog::new();
    for (name, url) in environments {
        catalog.insert(*name, *url);
    }
    GatewaySettings {
        environments: catalog,
        ..GatewaySettings::default()
    }
}

pub fn mock_cache(
    builder: MockBuilder,
    environments: &[(&str, &str)],
) -> Arc<SessionFactoryCache<MockBuilder>> {
    Arc::new(SessionFactoryCache::new(builder, settings(environments)))
}

//! Lazily built, never evicted session factories keyed by topology and tenant.
//!
//! Each map is guarded by its own `tokio::sync::Mutex` held across construction, so the first
//! caller for a key builds the factory while concurrent callers for the same map wait and then
//! observe it. A factory whose environment is unusable is built from the direct connection
//! properties instead, when allowed.

use crate::config::{EnvironmentConfig, GatewaySettings};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::session::{FactoryBuilder, SessionFactory};
use crate::models::{ConnectionTopology, DIRECT_ENVIRONMENT, FactoryKey, TenantFamily};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct SessionFactoryCache<B: FactoryBuilder> {
    builder: B,
    settings: GatewaySettings,
    single: Mutex<Option<Arc<B::Factory>>>,
    family_a: Mutex<HashMap<String, Arc<B::Factory>>>,
    family_b: Mutex<HashMap<String, Arc<B::Factory>>>,
}

impl<B: FactoryBuilder> SessionFactoryCache<B> {
    pub fn new(builder: B, settings: GatewaySettings) -> Self {
        Self {
            builder,
            settings,
            single: Mutex::new(None),
            family_a: Mutex::new(HashMap::new()),
            family_b: Mutex::new(HashMap::new()),
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Get the factory for a topology and tenant, building it on first use.
    ///
    /// Fails only with `GatewayError::Configuration`, in which case nothing is cached and the
    /// next call retries the build.
    pub async fn get_factory(
        &self,
        topology: ConnectionTopology,
        tenant: &str,
    ) -> GatewayResult<Arc<B::Factory>> {
        let key = topology.key(tenant);
        match &key {
            FactoryKey::Single => {
                let mut slot = self.single.lock().await;
                if let Some(factory) = slot.as_ref() {
                    return Ok(Arc::clone(factory));
                }
                let factory = Arc::new(self.build(&key).await?);
                *slot = Some(Arc::clone(&factory));
                Ok(factory)
            }
            FactoryKey::Tenant { family, tenant } => {
                let mut factories = self.family_map(*family).lock().await;
                if let Some(factory) = factories.get(tenant) {
                    return Ok(Arc::clone(factory));
                }
                let factory = Arc::new(self.build(&key).await?);
                factories.insert(tenant.clone(), Arc::clone(&factory));
                Ok(factory)
            }
        }
    }

    /// The global single-connection factory.
    pub async fn single(&self) -> GatewayResult<Arc<B::Factory>> {
        self.get_factory(ConnectionTopology::Single, "").await
    }

    pub async fn tenant_family_a(&self, tenant: &str) -> GatewayResult<Arc<B::Factory>> {
        self.get_factory(ConnectionTopology::TenantFamilyA, tenant)
            .await
    }

    pub async fn tenant_family_b(&self, tenant: &str) -> GatewayResult<Arc<B::Factory>> {
        self.get_factory(ConnectionTopology::TenantFamilyB, tenant)
            .await
    }

    /// Number of factories built so far.
    pub async fn len(&self) -> usize {
        let single = usize::from(self.single.lock().await.is_some());
        single + self.family_a.lock().await.len() + self.family_b.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every cached factory. Meant for process shutdown.
    pub async fn close_all(&self) {
        let mut closed = 0usize;
        if let Some(factory) = self.single.lock().await.take() {
            factory.close().await;
            closed += 1;
        }
        for map in [&self.family_a, &self.family_b] {
            let drained: Vec<_> = map.lock().await.drain().collect();
            for (_, factory) in drained {
                factory.close().await;
                closed += 1;
            }
        }
        info!(count = closed, "Closed session factories");
    }

    fn family_map(&self, family: TenantFamily) -> &Mutex<HashMap<String, Arc<B::Factory>>> {
        match family {
            TenantFamily::A => &self.family_a,
            TenantFamily::B => &self.family_b,
        }
    }

    /// Build from the named environment, falling back to direct properties once.
    async fn build(&self, key: &FactoryKey) -> GatewayResult<B::Factory> {
        let environment = key.environment_name();
        debug!(environment = %environment, "Building session factory");

        let primary = match self.settings.environments.resolve(&environment) {
            Ok(config) => self.build_from(&config).await,
            Err(e) => Err(e),
        };

        match primary {
            Ok(factory) => {
                info!(environment = %environment, "Session factory ready");
                Ok(factory)
            }
            Err(e) => {
                error!(
                    environment = %environment,
                    error = %e,
                    "Cannot build session factory from environment, trying direct connection"
                );
                self.build_direct(key).await
            }
        }
    }

    async fn build_direct(&self, key: &FactoryKey) -> GatewayResult<B::Factory> {
        let environment = key.environment_name();
        if !self.settings.allow_direct_connections {
            return Err(GatewayError::configuration(
                environment,
                "environment is unusable and direct connections are disabled",
                "Fix the environment or pass --allow-direct-connections outside production",
            ));
        }

        warn!(environment = %environment, "Using direct connection properties");
        let scope = key.direct_scope();
        let config = self.settings.direct.environment(scope.as_deref())?;
        info!(
            environment = %environment,
            url = %config.masked_connection_string(),
            db_type = %config.db_type,
            "Building direct session factory"
        );

        self.build_from(&config).await.map_err(|e| {
            error!(environment = %environment, error = %e, "Direct connection failed");
            match e {
                e @ GatewayError::Configuration { .. } => e,
                other => GatewayError::configuration(
                    DIRECT_ENVIRONMENT,
                    format!("direct connection for '{environment}' failed: {other}"),
                    other
                        .suggestion()
                        .unwrap_or("Check the direct connection properties")
                        .to_string(),
                ),
            }
        })
    }

    async fn build_from(&self, config: &EnvironmentConfig) -> GatewayResult<B::Factory> {
        let factory = self.builder.build(config).await?;
        debug!(environment = %factory.environment(), "Factory constructed");
        Ok(factory)
    }
}

impl<B: FactoryBuilder> std::fmt::Debug for SessionFactoryCache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactoryCache")
            .field("environments", &self.settings.environments.len())
            .field(
                "allow_direct_connections",
                &self.settings.allow_direct_connections,
            )
            .finish_non_exhaustive()
    }
}

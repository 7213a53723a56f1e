//! Session factory cache: lazy construction, tenant isolation and the direct fallback.

mod common;

use common::{MockBuilder, mock_cache, settings};
use persistence_gateway::gateway::{SessionFactory, SessionFactoryCache};
use persistence_gateway::models::ConnectionTopology;
use persistence_gateway::GatewayError;
use std::sync::Arc;
use std::time::Duration;

const PG: &str = "postgres://app@db:5432/main";

fn direct_settings(allow: bool, with_props: bool) -> persistence_gateway::config::GatewaySettings {
    let mut settings = settings(&[]);
    settings.allow_direct_connections = allow;
    if with_props {
        let direct = &mut settings.direct;
        direct.insert("database.direct.url", "postgres://{server}:{port}/{dbname}");
        direct.insert("database.direct.driver", "postgres");
        direct.insert("database.direct.server", "localhost");
        direct.insert("database.direct.port", "5432");
        direct.insert("database.direct.dbname", "main");
        direct.insert("acme-sdc.database.direct.server", "tenant-host");
        direct.insert("acme-sdc.database.direct.port", "6432");
        direct.insert("acme-sdc.database.direct.dbname", "acme");
        direct.insert("acme-sdc.database.direct.username", "acme_user");
    }
    settings
}

#[tokio::test]
async fn test_single_factory_built_once() {
    let builder = MockBuilder::new();
    let counters = Arc::clone(&builder.counters);
    let cache = mock_cache(builder, &[("single", PG)]);

    let first = cache.single().await.unwrap();
    let second = cache
        .get_factory(ConnectionTopology::Single, "ignored")
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.environment(), "single");
    assert_eq!(counters.constructions(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_builds_once() {
    let builder = MockBuilder::new().with_delay(Duration::from_millis(50));
    let counters = Arc::clone(&builder.counters);
    let cache = mock_cache(builder, &[("acme-sdc", PG)]);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.tenant_family_a("acme").await })
        })
        .collect();

    let mut factories = Vec::new();
    for task in tasks {
        factories.push(task.await.unwrap().unwrap());
    }

    assert_eq!(counters.constructions(), 1);
    assert_eq!(counters.build_attempts(), 1);
    assert!(factories.iter().all(|f| Arc::ptr_eq(f, &factories[0])));
}

#[tokio::test]
async fn test_tenants_and_families_are_isolated() {
    let builder = MockBuilder::new();
    let counters = Arc::clone(&builder.counters);
    let cache = mock_cache(
        builder,
        &[
            ("acme-sdc", "postgres://db/acme_a"),
            ("acme-cmd", "postgres://db/acme_b"),
            ("globex-sdc", "postgres://db/globex_a"),
        ],
    );

    let acme_a = cache.tenant_family_a("acme").await.unwrap();
    let acme_b = cache.tenant_family_b("acme").await.unwrap();
    let globex_a = cache.tenant_family_a("globex").await.unwrap();

    assert_eq!(acme_a.environment(), "acme-sdc");
    assert_eq!(acme_b.environment(), "acme-cmd");
    assert_eq!(globex_a.environment(), "globex-sdc");
    assert!(!Arc::ptr_eq(&acme_a, &acme_b));
    assert!(!Arc::ptr_eq(&acme_a, &globex_a));
    assert_eq!(acme_a.connection_string, "postgres://db/acme_a");
    assert_eq!(counters.constructions(), 3);
    assert_eq!(cache.len().await, 3);
}

#[tokio::test]
async fn test_missing_environment_without_direct_is_configuration_error() {
    let builder = MockBuilder::new();
    let counters = Arc::clone(&builder.counters);
    let cache = mock_cache(builder, &[("single", PG)]);

    let err = cache.tenant_family_b("nobody").await.unwrap_err();
    match err {
        GatewayError::Configuration { environment, .. } => assert_eq!(environment, "nobody-cmd"),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert_eq!(counters.constructions(), 0);
    assert!(cache.is_empty().await);

    // Nothing cached, so the next call tries again.
    assert!(cache.tenant_family_b("nobody").await.is_err());
}

#[tokio::test]
async fn test_direct_fallback_for_missing_environment() {
    let builder = MockBuilder::new();
    let cache = SessionFactoryCache::new(builder, direct_settings(true, true));

    let single = cache.single().await.unwrap();
    assert_eq!(single.environment(), "direct");
    assert_eq!(single.connection_string, "postgres://localhost:5432/main");

    let tenant = cache.tenant_family_a("acme").await.unwrap();
    assert_eq!(tenant.environment(), "direct");
    assert_eq!(
        tenant.connection_string,
        "postgres://acme_user@tenant-host:6432/acme"
    );

    // Cached under the tenant key.
    let again = cache.tenant_family_a("acme").await.unwrap();
    assert!(Arc::ptr_eq(&tenant, &again));
}

#[tokio::test]
async fn test_direct_fallback_requires_properties() {
    let cache = SessionFactoryCache::new(MockBuilder::new(), direct_settings(true, false));
    let err = cache.single().await.unwrap_err();
    assert!(matches!(err, GatewayError::Configuration { .. }));
    assert!(err.to_string().contains("database.direct.url"));
}

#[tokio::test]
async fn test_direct_fallback_disabled() {
    let cache = SessionFactoryCache::new(MockBuilder::new(), direct_settings(false, true));
    let err = cache.single().await.unwrap_err();
    assert!(matches!(err, GatewayError::Configuration { .. }));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_failed_build_falls_back_to_direct() {
    let builder = MockBuilder::new().failing("single");
    let counters = Arc::clone(&builder.counters);
    let mut settings = direct_settings(true, true);
    settings.environments.insert("single", PG);
    let cache = SessionFactoryCache::new(builder, settings);

    let factory = cache.single().await.unwrap();
    assert_eq!(factory.environment(), "direct");
    assert_eq!(counters.build_attempts(), 2);
    assert_eq!(counters.constructions(), 1);
}

#[tokio::test]
async fn test_failed_direct_build_is_configuration_error() {
    let builder = MockBuilder::new().failing("single").failing("direct");
    let mut settings = direct_settings(true, true);
    settings.environments.insert("single", PG);
    let cache = SessionFactoryCache::new(builder, settings);

    let err = cache.single().await.unwrap_err();
    assert!(matches!(err, GatewayError::Configuration { ref environment, .. } if environment == "direct"));
}

#[tokio::test]
async fn test_malformed_environment_goes_down_fallback() {
    let builder = MockBuilder::new();
    let mut settings = direct_settings(true, true);
    settings.environments.insert("single", "not a url");
    let cache = SessionFactoryCache::new(builder, settings);

    let factory = cache.single().await.unwrap();
    assert_eq!(factory.environment(), "direct");
}

#[tokio::test]
async fn test_close_all_closes_every_factory() {
    let builder = MockBuilder::new();
    let counters = Arc::clone(&builder.counters);
    let cache = mock_cache(builder, &[("single", PG), ("acme-sdc", PG), ("acme-cmd", PG)]);

    cache.single().await.unwrap();
    cache.tenant_family_a("acme").await.unwrap();
    cache.tenant_family_b("acme").await.unwrap();
    cache.close_all().await;

    assert_eq!(
        counters.factory_closes.load(std::sync::atomic::Ordering::SeqCst),
        3
    );
    assert!(cache.is_empty().await);
}

//! Persistence Gateway - diagnostic entry point.
//!
//! Resolves the session factory for one topology/tenant, opens a session and logs the
//! backend identity. Exits non-zero when no factory can be built.

use clap::Parser;
use persistence_gateway::config::Config;
use persistence_gateway::db::SqlFactoryBuilder;
use persistence_gateway::mappers::DiagnosticReport;
use persistence_gateway::models::ConnectionTopology;
use persistence_gateway::SessionFactoryCache;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    let settings = config.gateway_settings()?;
    if settings.environments.is_empty() && settings.direct.is_empty() {
        eprintln!("Error: No connection environment configured.");
        eprintln!();
        eprintln!("Usage: persistence-gateway --environment <name>=<url>");
        eprintln!("       persistence-gateway --topology sdc --tenant <tenant> --environment <tenant>-sdc=<url>");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  persistence-gateway --environment single=sqlite:data.db");
        eprintln!("  persistence-gateway --environment single=postgres://app:pw@localhost/main");
        eprintln!(
            "  persistence-gateway --topology cmd --tenant acme --environment acme-cmd=mysql://db/acme?username=app&password=pw"
        );
        eprintln!();
        eprintln!("Direct fallback (never in production):");
        eprintln!("  persistence-gateway --allow-direct-connections --properties direct.properties");
        std::process::exit(1);
    }

    let topology = ConnectionTopology::from_name(&config.topology);
    info!(
        topology = %topology,
        tenant = %config.tenant,
        environments = settings.environments.len(),
        "Starting persistence gateway diagnostics v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cache = SessionFactoryCache::new(SqlFactoryBuilder::new(), settings);

    let result = async {
        let factory = cache.get_factory(topology, &config.tenant).await?;
        DiagnosticReport::collect(&*factory).await
    }
    .await;

    cache.close_all().await;

    match result {
        Ok(report) => {
            info!(
                environment = %report.environment,
                server = %report.server,
                username = %report.username,
                session_id = %report.session_id,
                "Context loaded"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Context load failed");
            Err(e.into())
        }
    }
}

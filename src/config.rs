//! Configuration handling for the persistence gateway.
//!
//! Two sources feed the session factory cache: the environment catalog (named connection
//! URLs, parsed lazily) and the flat direct-connection properties used as a fallback. Both are
//! filled from CLI arguments and environment variables.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{DIRECT_ENVIRONMENT, DatabaseType, masked_connection_string};
use clap::Parser;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// Direct connection property keys
pub const DIRECT_URL_KEY: &str = "database.direct.url";
pub const DIRECT_DRIVER_KEY: &str = "database.direct.driver";
pub const DIRECT_SERVER_KEY: &str = "database.direct.server";
pub const DIRECT_PORT_KEY: &str = "database.direct.port";
pub const DIRECT_DBNAME_KEY: &str = "database.direct.dbname";
pub const DIRECT_USERNAME_KEY: &str = "database.direct.username";
pub const DIRECT_PASSWORD_KEY: &str = "database.direct.password";

/// Connection pool configuration options parsed from an environment URL.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        if let Some(min) = self.min_connections {
            if min == 0 {
                return Err("min_connections must be greater than 0".to_string());
            }
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({min}) cannot exceed max_connections ({max})"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A fully parsed connection environment: everything needed to build one session factory.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Environment name (`single`, `{tenant}-{family}` or `direct`).
    pub name: String,
    /// Full connection URL (sensitive - not logged).
    pub connection_string: String,
    pub db_type: DatabaseType,
    pub pool_options: PoolOptions,
}

impl EnvironmentConfig {
    /// Query keys consumed by the gateway and stripped before the URL reaches the driver.
    const OPTION_KEYS: &'static [&'static str] = &[
        "max_connections",
        "min_connections",
        "idle_timeout",
        "acquire_timeout",
        "test_before_acquire",
        "username",
        "password",
    ];

    /// Parse an environment from its connection URL.
    ///
    /// # Examples
    ///
    /// ```text
    /// postgres://app:secret@db:5432/acme?max_connections=20
    /// mysql://db:3306/acme?username=app&password=secret
    /// sqlite:/var/lib/gateway/single.db?mode=rwc
    /// ```
    pub fn parse(name: &str, url_str: &str) -> Result<Self, String> {
        let db_type = DatabaseType::from_connection_string(url_str)
            .ok_or_else(|| format!("Unknown database type in URL for environment '{name}'"))?;

        let mut url = Url::parse(url_str).map_err(|e| format!("Invalid URL: {e}"))?;
        let mut opts = extract_options(&mut url, Self::OPTION_KEYS);

        let pool_options = parse_pool_options(&mut opts);
        pool_options.validate()?;

        let username = opts.remove("username");
        let password = opts.remove("password");
        apply_credentials(&mut url, db_type, username.as_deref(), password.as_deref())?;

        Ok(Self {
            name: name.to_string(),
            connection_string: url.to_string(),
            db_type,
            pool_options,
        })
    }

    /// Build the synthetic `direct` environment from a driver name, URL and credentials.
    pub fn direct(
        driver: &str,
        url_str: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, String> {
        let driver_type = DatabaseType::from_driver(driver)
            .ok_or_else(|| format!("Unsupported driver '{driver}'"))?;

        let mut env = Self::parse(DIRECT_ENVIRONMENT, url_str)?;
        if env.db_type != driver_type {
            return Err(format!(
                "Driver '{driver}' does not match URL scheme ({})",
                env.db_type
            ));
        }

        let mut url = Url::parse(&env.connection_string).map_err(|e| format!("Invalid URL: {e}"))?;
        apply_credentials(&mut url, env.db_type, username, password)?;
        env.connection_string = url.to_string();
        Ok(env)
    }

    /// Connection string with the password masked, for logging.
    pub fn masked_connection_string(&self) -> String {
        masked_connection_string(&self.connection_string)
    }
}

/// Parse pool options from extracted URL query parameters.
fn parse_pool_options(opts: &mut HashMap<String, String>) -> PoolOptions {
    PoolOptions {
        max_connections: opts.remove("max_connections").and_then(|v| v.parse().ok()),
        min_connections: opts.remove("min_connections").and_then(|v| v.parse().ok()),
        idle_timeout_secs: opts.remove("idle_timeout").and_then(|v| v.parse().ok()),
        acquire_timeout_secs: opts.remove("acquire_timeout").and_then(|v| v.parse().ok()),
        test_before_acquire: opts.remove("test_before_acquire").and_then(|v| {
            if v.eq_ignore_ascii_case("true") {
                Some(true)
            } else if v.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None // Invalid value ignored
            }
        }),
    }
}

/// Extract gateway options from URL query params, keeping others for the driver.
fn extract_options(url: &mut Url, keys: &[&str]) -> HashMap<String, String> {
    let mut opts = HashMap::new();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            let key_lower = k.to_ascii_lowercase();
            if keys.contains(&key_lower.as_str()) {
                opts.insert(key_lower, v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }
    opts
}

/// Inject credentials into a server URL. SQLite URLs carry no credentials and are left alone.
fn apply_credentials(
    url: &mut Url,
    db_type: DatabaseType,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(), String> {
    if db_type == DatabaseType::SQLite {
        return Ok(());
    }
    if let Some(user) = username.filter(|u| !u.is_empty()) {
        url.set_username(user)
            .map_err(|_| "URL cannot carry a username".to_string())?;
    }
    if let Some(pass) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(pass))
            .map_err(|_| "URL cannot carry a password".to_string())?;
    }
    Ok(())
}

/// Split a `key=value` pair, trimming whitespace around both halves.
fn split_pair(entry: &str) -> Option<(String, String)> {
    let (key, value) = entry.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Named connection environments.
///
/// Entries are stored raw and only parsed when a factory is first built for them, so a
/// malformed entry sends that one environment down the direct fallback instead of failing
/// startup.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentCatalog {
    entries: HashMap<String, String>,
}

impl EnvironmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=url` entries. The name is split off at the first `=` before `://`.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, String> {
        let mut catalog = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let scheme_pos = entry.find("://").unwrap_or(entry.len());
            let idx = entry[..scheme_pos]
                .find('=')
                .ok_or_else(|| format!("Environment entry must be name=url, got '{}'", masked_connection_string(entry)))?;
            let name = entry[..idx].trim();
            if name.is_empty() {
                return Err("Environment name cannot be empty".to_string());
            }
            catalog.insert(name, &entry[idx + 1..]);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(name.into(), url.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve and parse the named environment.
    pub fn resolve(&self, name: &str) -> GatewayResult<EnvironmentConfig> {
        let url = self.entries.get(name).ok_or_else(|| {
            GatewayError::configuration(
                name,
                "environment is not configured",
                format!("Add --environment {name}=<url>"),
            )
        })?;
        EnvironmentConfig::parse(name, url).map_err(|message| {
            GatewayError::configuration(name, message, "Fix the environment URL")
        })
    }
}

/// Flat key/value properties for direct (fallback) connections.
///
/// Keys are stored with `-` folded to `_`: dotenv-style files cannot spell `acme-sdc.` tenant
/// prefixes, so `acme_sdc.database.direct.server` in a file and `acme-sdc.database.direct.server`
/// on the command line address the same property.
#[derive(Debug, Clone, Default)]
pub struct DirectProperties {
    values: HashMap<String, String>,
}

fn canonical_key(key: &str) -> String {
    key.replace('-', "_")
}

impl DirectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` entries as given on the command line.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, String> {
        let mut props = Self::new();
        for entry in entries {
            let (key, value) = split_pair(entry.as_ref())
                .ok_or_else(|| format!("Direct property must be key=value, got '{}'", entry.as_ref()))?;
            props.insert(key, value);
        }
        Ok(props)
    }

    /// Parse dotenv-formatted properties (`key=value` lines, `#` comments, optional quoting).
    pub fn parse_str(content: &str) -> Result<Self, String> {
        Self::from_pairs(dotenvy::from_read_iter(content.as_bytes()))
    }

    /// Load a dotenv-formatted properties file without touching the process environment.
    pub fn load_file(path: &Path) -> Result<Self, String> {
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
        Self::from_pairs(iter).map_err(|e| format!("{}: {e}", path.display()))
    }

    fn from_pairs<I>(pairs: I) -> Result<Self, String>
    where
        I: Iterator<Item = dotenvy::Result<(String, String)>>,
    {
        let mut props = Self::new();
        for pair in pairs {
            let (key, value) = pair.map_err(|e| format!("Invalid properties: {e}"))?;
            props.insert(key, value);
        }
        Ok(props)
    }

    /// Merge `other` into `self`; keys from `other` win.
    pub fn merge(&mut self, other: DirectProperties) {
        self.values.extend(other.values);
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values.insert(canonical_key(key.as_ref()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&canonical_key(key)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, key: &str) -> GatewayResult<&str> {
        self.get(key).filter(|v| !v.is_empty()).ok_or_else(|| {
            GatewayError::configuration(
                DIRECT_ENVIRONMENT,
                format!("missing direct connection property '{key}'"),
                format!("Add --direct-property {key}=<value>"),
            )
        })
    }

    /// Build the direct environment, optionally scoped to `{tenant}-{family}.` prefixed keys.
    ///
    /// The URL template and driver are shared; server, port, dbname and credentials are read
    /// from the scoped keys.
    pub fn environment(&self, scope: Option<&str>) -> GatewayResult<EnvironmentConfig> {
        let scoped = |key: &str| match scope {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        };

        let template = self.require(DIRECT_URL_KEY)?;
        let driver = self.require(DIRECT_DRIVER_KEY)?;
        let server = self.require(&scoped(DIRECT_SERVER_KEY))?;
        let port = self.require(&scoped(DIRECT_PORT_KEY))?;
        let dbname = self.require(&scoped(DIRECT_DBNAME_KEY))?;
        let username = self.get(&scoped(DIRECT_USERNAME_KEY));
        let password = self.get(&scoped(DIRECT_PASSWORD_KEY));

        let url = template
            .replace("{server}", server)
            .replace("{port}", port)
            .replace("{dbname}", dbname);

        EnvironmentConfig::direct(driver, &url, username, password).map_err(|message| {
            GatewayError::configuration(
                DIRECT_ENVIRONMENT,
                message,
                "Check database.direct.url and database.direct.driver",
            )
        })
    }
}

/// Everything the session factory cache needs to build factories.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub environments: EnvironmentCatalog,
    pub direct: DirectProperties,
    /// Non-production gate for the direct fallback path.
    pub allow_direct_connections: bool,
}

/// Configuration for the gateway diagnostic binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "persistence-gateway",
    about = "Resolve a gateway connection and report the backend identity",
    version,
    author
)]
pub struct Config {
    /// Named connection environments.
    /// Format: "name=url", e.g. "single=postgres://app:pw@db/main" or "acme-sdc=mysql://db/acme".
    /// Can be specified multiple times.
    #[arg(
        short = 'e',
        long = "environment",
        value_name = "NAME=URL",
        env = "GATEWAY_ENVIRONMENTS",
        value_delimiter = ','
    )]
    pub environments: Vec<String>,

    /// Direct connection properties used when an environment is unusable.
    /// Format: "key=value". Can be specified multiple times; values may contain commas.
    #[arg(
        short = 'p',
        long = "direct-property",
        value_name = "KEY=VALUE",
        env = "GATEWAY_DIRECT_PROPERTIES"
    )]
    pub direct_properties: Vec<String>,

    /// Properties file with direct connection settings (key=value lines)
    #[arg(long = "properties", value_name = "FILE", env = "GATEWAY_PROPERTIES_FILE")]
    pub properties_file: Option<std::path::PathBuf>,

    /// Allow building factories from direct connection properties (never in production)
    #[arg(long, env = "GATEWAY_ALLOW_DIRECT_CONNECTIONS")]
    pub allow_direct_connections: bool,

    /// Connection topology to check (single, sdc, cmd)
    #[arg(long, default_value = "single", env = "GATEWAY_TOPOLOGY")]
    pub topology: String,

    /// Tenant for per-tenant topologies
    #[arg(long, default_value = "", env = "GATEWAY_TENANT")]
    pub tenant: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            environments: Vec::new(),
            direct_properties: Vec::new(),
            properties_file: None,
            allow_direct_connections: false,
            topology: "single".to_string(),
            tenant: String::new(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Assemble the cache settings. Properties given on the command line override the file.
    pub fn gateway_settings(&self) -> Result<GatewaySettings, String> {
        let environments = EnvironmentCatalog::from_entries(&self.environments)?;

        let mut direct = match &self.properties_file {
            Some(path) => DirectProperties::load_file(path)?,
            None => DirectProperties::new(),
        };
        direct.merge(DirectProperties::from_entries(&self.direct_properties)?);

        Ok(GatewaySettings {
            environments,
            direct,
            allow_direct_connections: self.allow_direct_connections,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_props(entries: &[&str]) -> DirectProperties {
        DirectProperties::from_entries(entries).unwrap()
    }

    #[test]
    fn test_parse_pool_options_stripped_from_url() {
        let env = EnvironmentConfig::parse(
            "single",
            "postgres://app:pw@db:5432/main?max_connections=20&min_connections=2&sslmode=require",
        )
        .unwrap();
        assert_eq!(env.db_type, DatabaseType::PostgreSQL);
        assert_eq!(env.pool_options.max_connections, Some(20));
        assert_eq!(env.pool_options.min_connections, Some(2));
        assert!(!env.connection_string.contains("max_connections"));
        assert!(env.connection_string.contains("sslmode=require"));
    }

    #[test]
    fn test_parse_invalid_pool_options() {
        let err = EnvironmentConfig::parse(
            "single",
            "mysql://db/main?min_connections=5&max_connections=2",
        )
        .unwrap_err();
        assert!(err.contains("cannot exceed"));
    }

    #[test]
    fn test_parse_credentials_from_query() {
        let env = EnvironmentConfig::parse(
            "acme-sdc",
            "mysql://db:3306/acme?username=app&password=s3cret",
        )
        .unwrap();
        assert_eq!(env.connection_string, "mysql://app:s3cret@db:3306/acme");
        assert_eq!(env.masked_connection_string(), "mysql://app:****@db:3306/acme");
    }

    #[test]
    fn test_parse_unknown_scheme() {
        assert!(EnvironmentConfig::parse("single", "oracle://db/main").is_err());
    }

    #[test]
    fn test_pool_option_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(true), 1);
        assert_eq!(opts.max_connections_or_default(false), 10);
        assert_eq!(opts.acquire_timeout(), Duration::from_secs(30));
        assert!(opts.test_before_acquire_or_default());
    }

    #[test]
    fn test_catalog_from_entries() {
        let catalog = EnvironmentCatalog::from_entries(&[
            "single=postgres://db/main",
            "acme-sdc=mysql://db/acme",
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("acme-sdc"));
        assert_eq!(catalog.resolve("acme-sdc").unwrap().name, "acme-sdc");
    }

    #[test]
    fn test_catalog_requires_name() {
        assert!(EnvironmentCatalog::from_entries(&["postgres://db/main"]).is_err());
    }

    #[test]
    fn test_catalog_rejects_at_sign_before_scheme() {
        let err = EnvironmentCatalog::from_entries(&["user@host://db"]).unwrap_err();
        assert!(err.contains("name=url"));
        assert!(err.contains("user@host://db"));
    }

    #[test]
    fn test_catalog_missing_and_malformed_are_configuration_errors() {
        let mut catalog = EnvironmentCatalog::new();
        catalog.insert("broken", "not a url");

        let missing = catalog.resolve("single").unwrap_err();
        assert!(matches!(missing, GatewayError::Configuration { ref environment, .. } if environment == "single"));

        let malformed = catalog.resolve("broken").unwrap_err();
        assert!(matches!(malformed, GatewayError::Configuration { .. }));
    }

    #[test]
    fn test_direct_environment_single() {
        let props = direct_props(&[
            "database.direct.url=postgres://{server}:{port}/{dbname}",
            "database.direct.driver=postgres",
            "database.direct.server=localhost",
            "database.direct.port=5432",
            "database.direct.dbname=main",
            "database.direct.username=tester",
            "database.direct.password=pw",
        ]);
        let env = props.environment(None).unwrap();
        assert_eq!(env.name, DIRECT_ENVIRONMENT);
        assert_eq!(env.connection_string, "postgres://tester:pw@localhost:5432/main");
    }

    #[test]
    fn test_direct_environment_scoped_to_tenant() {
        let props = direct_props(&[
            "database.direct.url=mysql://{server}:{port}/{dbname}",
            "database.direct.driver=mysql",
            "database.direct.server=shared",
            "acme-cmd.database.direct.server=acme-host",
            "acme-cmd.database.direct.port=3307",
            "acme-cmd.database.direct.dbname=acme_cmd",
        ]);
        let env = props.environment(Some("acme-cmd")).unwrap();
        assert_eq!(env.connection_string, "mysql://acme-host:3307/acme_cmd");
    }

    #[test]
    fn test_direct_environment_missing_key() {
        let props = direct_props(&["database.direct.driver=postgres"]);
        let err = props.environment(None).unwrap_err();
        assert!(err.to_string().contains(DIRECT_URL_KEY));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_direct_environment_driver_mismatch() {
        let props = direct_props(&[
            "database.direct.url=postgres://{server}:{port}/{dbname}",
            "database.direct.driver=mysql",
            "database.direct.server=h",
            "database.direct.port=1",
            "database.direct.dbname=d",
        ]);
        assert!(props.environment(None).is_err());
    }

    #[test]
    fn test_properties_file_format() {
        let props = DirectProperties::parse_str(
            "# direct settings\n\
             database.direct.driver = sqlite\n\
             \n\
             database.direct.url=sqlite:{dbname}\n\
             database.direct.password='p,w#1'\n",
        )
        .unwrap();
        assert_eq!(props.get(DIRECT_DRIVER_KEY), Some("sqlite"));
        assert_eq!(props.get(DIRECT_URL_KEY), Some("sqlite:{dbname}"));
        assert_eq!(props.get(DIRECT_PASSWORD_KEY), Some("p,w#1"));
        assert!(DirectProperties::parse_str("no separator").is_err());
    }

    #[test]
    fn test_tenant_keys_from_file_match_cli_spelling() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "database.direct.url=postgres://{server}:{port}/{dbname}\n\
             database.direct.driver=postgres\n\
             acme_sdc.database.direct.server=acme-host\n\
             acme_sdc.database.direct.port=5433\n\
             acme_sdc.database.direct.dbname=acme\n",
        )
        .unwrap();

        let props = DirectProperties::load_file(file.path()).unwrap();
        assert_eq!(
            props.get("acme-sdc.database.direct.server"),
            Some("acme-host")
        );
        let env = props.environment(Some("acme-sdc")).unwrap();
        assert_eq!(env.connection_string, "postgres://acme-host:5433/acme");
    }

    #[test]
    fn test_load_missing_properties_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectProperties::load_file(&dir.path().join("absent.properties")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }

    #[test]
    fn test_direct_property_value_keeps_commas() {
        let config = Config::try_parse_from([
            "persistence-gateway",
            "--direct-property",
            "database.direct.password=a,b,c",
            "-p",
            "database.direct.driver=mysql",
        ])
        .unwrap();
        assert_eq!(config.direct_properties.len(), 2);
        let settings = config.gateway_settings().unwrap();
        assert_eq!(settings.direct.get(DIRECT_PASSWORD_KEY), Some("a,b,c"));
    }

    #[test]
    fn test_gateway_settings_cli_overrides_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "database.direct.driver=mysql\ndatabase.direct.port=3306\n")
            .unwrap();

        let config = Config {
            environments: vec!["single=sqlite:main.db".to_string()],
            direct_properties: vec!["database.direct.driver=postgres".to_string()],
            properties_file: Some(file.path().to_path_buf()),
            allow_direct_connections: true,
            ..Config::default()
        };
        let settings = config.gateway_settings().unwrap();
        assert!(settings.allow_direct_connections);
        assert!(settings.environments.contains("single"));
        assert_eq!(settings.direct.get(DIRECT_DRIVER_KEY), Some("postgres"));
        assert_eq!(settings.direct.get(DIRECT_PORT_KEY), Some("3306"));
    }
}

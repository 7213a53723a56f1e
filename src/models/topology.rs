//! Connection topologies and the cache keys / environment names they resolve to.

use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Environment name used by the global single connection.
pub const SINGLE_ENVIRONMENT: &str = "single";

/// Environment name bound to factories built from direct connection properties.
pub const DIRECT_ENVIRONMENT: &str = "direct";

/// Which family of connections a DAO talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionTopology {
    /// One process-wide connection, no tenant.
    #[default]
    Single,
    /// Per-tenant connection, family A (environment suffix `sdc`).
    TenantFamilyA,
    /// Per-tenant connection, family B (environment suffix `cmd`).
    TenantFamilyB,
}

/// A per-tenant connection family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantFamily {
    A,
    B,
}

impl TenantFamily {
    /// Suffix appended to the tenant to form the environment name.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::A => "sdc",
            Self::B => "cmd",
        }
    }
}

impl ConnectionTopology {
    /// Parse a topology name, falling back to `Single` for anything unrecognized.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(topology = %name, "Unrecognized connection topology, using single");
            Self::Single
        })
    }

    pub fn family(&self) -> Option<TenantFamily> {
        match self {
            Self::Single => None,
            Self::TenantFamilyA => Some(TenantFamily::A),
            Self::TenantFamilyB => Some(TenantFamily::B),
        }
    }

    /// Resolve the cache key for this topology. The tenant is ignored for `Single`.
    pub fn key(&self, tenant: &str) -> FactoryKey {
        match self.family() {
            None => FactoryKey::Single,
            Some(family) => FactoryKey::Tenant {
                family,
                tenant: tenant.to_string(),
            },
        }
    }
}

impl FromStr for ConnectionTopology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "sdc" | "tenant-family-a" | "family-a" => Ok(Self::TenantFamilyA),
            "cmd" | "tenant-family-b" | "family-b" => Ok(Self::TenantFamilyB),
            other => Err(format!("Unknown connection topology: {other}")),
        }
    }
}

impl fmt::Display for ConnectionTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::TenantFamilyA => write!(f, "sdc"),
            Self::TenantFamilyB => write!(f, "cmd"),
        }
    }
}

/// Identifies one cached session factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactoryKey {
    Single,
    Tenant { family: TenantFamily, tenant: String },
}

impl FactoryKey {
    /// Name of the configured environment this key is built from.
    pub fn environment_name(&self) -> String {
        match self {
            Self::Single => SINGLE_ENVIRONMENT.to_string(),
            Self::Tenant { family, tenant } => format!("{tenant}-{}", family.suffix()),
        }
    }

    /// Prefix scoping direct connection properties, `None` for the single connection.
    pub fn direct_scope(&self) -> Option<String> {
        match self {
            Self::Single => None,
            Self::Tenant { .. } => Some(self.environment_name()),
        }
    }
}

impl fmt::Display for FactoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.environment_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_ignores_tenant() {
        let key = ConnectionTopology::Single.key("acme");
        assert_eq!(key, FactoryKey::Single);
        assert_eq!(key.environment_name(), "single");
        assert_eq!(key.direct_scope(), None);
    }

    #[test]
    fn test_tenant_environment_names() {
        let a = ConnectionTopology::TenantFamilyA.key("acme");
        let b = ConnectionTopology::TenantFamilyB.key("acme");
        assert_eq!(a.environment_name(), "acme-sdc");
        assert_eq!(b.environment_name(), "acme-cmd");
        assert_eq!(b.direct_scope().as_deref(), Some("acme-cmd"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_topology() {
        assert_eq!(
            ConnectionTopology::from_name("SDC"),
            ConnectionTopology::TenantFamilyA
        );
        assert_eq!(
            ConnectionTopology::from_name("cmd"),
            ConnectionTopology::TenantFamilyB
        );
        assert_eq!(
            ConnectionTopology::from_name("single"),
            ConnectionTopology::Single
        );
    }

    #[test]
    fn test_unknown_topology_falls_back_to_single() {
        assert_eq!(
            ConnectionTopology::from_name("replica"),
            ConnectionTopology::Single
        );
        assert!("replica".parse::<ConnectionTopology>().is_err());
    }
}

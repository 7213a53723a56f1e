//! Connection-related data models.

use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Parse database type from a driver name as used by `database.direct.driver`.
    ///
    /// Accepts the bare driver name (`postgres`, `mysql`, `sqlite`) and a few common aliases.
    pub fn from_driver(driver: &str) -> Option<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Get a display-safe version of a connection string (password masked).
///
/// Only the authority after `scheme://` is inspected for `user:password@`.
pub fn masked_connection_string(connection_string: &str) -> String {
    let scheme_end = connection_string.find("://").map_or(0, |p| p + 3);
    let rest = &connection_string[scheme_end..];
    if let Some(at_pos) = rest.find('@') {
        if let Some(colon_pos) = rest[..at_pos].rfind(':') {
            let prefix = &connection_string[..scheme_end + colon_pos + 1];
            let suffix = &rest[at_pos..];
            return format!("{prefix}****{suffix}");
        }
    }
    connection_string.to_string()
}

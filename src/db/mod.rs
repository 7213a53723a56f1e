//! sqlx implementation of the gateway's session seams.
//!
//! Database-specific pools (MySqlPool, PgPool, SqlitePool) are used instead of AnyPool so
//! every column type decodes with full driver support.

pub(crate) mod params;
pub mod pool;
pub mod session;
pub mod types;

pub use pool::{DbPool, SqlFactoryBuilder, SqlSessionFactory};
pub use session::SqlSession;
pub use types::RowToJson;

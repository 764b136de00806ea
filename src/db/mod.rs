//! Database layer
//!
//! Supports SQLite (default, a single file next to the binary) and MySQL.
//! The driver is chosen by `database.driver` in the configuration.
//!
//! ```ignore
//! use leafblog::config::DatabaseConfig;
//! use leafblog::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Escape `%`, `_` and `\` so user text is matched literally by
/// `LIKE ? ESCAPE '\'`, then wrap it for a substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

//! Statically linked driver adapters, one per enabled cargo feature.
//!
//! The MariaDB/MySQL adapter is also packaged as a loadable driver module
//! (`modules/mysql`). ODBC has no adapter here and is reached only through
//! loadable driver modules (see [`crate::plugin`]).

use crate::registry::Registry;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mariadb")]
pub mod mariadb;

/// Register every adapter compiled into this build.
pub fn register_builtin(registry: &Registry) {
    #[cfg(feature = "sqlite")]
    registry.register(std::sync::Arc::new(sqlite::SqliteDriver));

    #[cfg(feature = "postgres")]
    registry.register(std::sync::Arc::new(postgres::PostgresDriver));

    #[cfg(feature = "mariadb")]
    registry.register(std::sync::Arc::new(mariadb::MariadbDriver));
}

/// Names of the adapters compiled into this build.
pub fn builtin_names() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "sqlite")]
    names.push("sqlite");
    #[cfg(feature = "postgres")]
    names.push("postgres");
    #[cfg(feature = "mariadb")]
    names.push("mariadb");
    names
}

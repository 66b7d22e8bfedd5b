//! sqlport - one SQL contract over several database engines
//!
//! Application code talks to [`Connection`], [`Statement`] and the result-set
//! traits; drivers adapt a native client library to them. SQLite,
//! PostgreSQL and MariaDB/MySQL adapters are compiled in behind cargo
//! features. Other engines plug in as loadable driver modules found through
//! the configured search path; `modules/mysql` packages the MariaDB adapter
//! that way.
//!
//! ```no_run
//! # fn main() -> sqlport::Result<()> {
//! sqlport::init()?;
//! let mut conn = sqlport::connect("sqlite::memory:")?;
//! conn.execute("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a')")?;
//!
//! let mut stmt = conn.prepare("SELECT name FROM t WHERE id = ?")?;
//! stmt.bind_int64(1, 1)?;
//! let rows = stmt.execute()?;
//! let mut it = rows.begin();
//! while it != rows.end() {
//!     println!("{}", it.get()?.get_value_string(0));
//!     it.advance()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! [`init`] registers the built-in drivers into the process-wide
//! [`Registry`] and applies the driver search path from [`Config`].
//! [`shutdown`] unregisters everything. Use [`Registry::new`] for an
//! isolated registry.

pub mod config;
pub mod connection;
pub mod cursor;
pub mod drivers;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod resultset;
pub mod row;
pub mod statement;
pub mod url;
pub mod value;

pub use config::{Config, DriverConfig};
pub use connection::Connection;
pub use cursor::{RowIter, RowSource, SharedCursor};
pub use error::{Error, Result};
pub use plugin::SQLPORT_ABI_VERSION;
pub use registry::{DriverFactory, Registry};
pub use resultset::{BufferedResultSet, BufferedTable, Cursor, CursorResultSet, StatsResult};
pub use row::{ColumnMetadata, OwnedRow, Row};
pub use statement::Statement;
pub use url::{Authority, ConnectionUrl};
pub use value::{Blob, Value, ValueKind};

/// Resolve [`Config`] (file, then environment, then defaults) and
/// initialize the global registry with it.
///
/// # Errors
///
/// Returns [`Error::Config`] if `.sqlport.json` exists but is invalid.
pub fn init() -> Result<()> {
    init_with(&Config::resolve()?);
    Ok(())
}

/// Initialize the global registry with an explicit configuration.
///
/// Safe to call repeatedly; built-in drivers are registered again and the
/// search path is replaced.
pub fn init_with(config: &Config) {
    let registry = Registry::global();
    registry.configure(&config.drivers);
    drivers::register_builtin(registry);
    tracing::info!(
        drivers = ?drivers::builtin_names(),
        search_paths = config.drivers.search_paths.len(),
        dynamic_loading = config.drivers.dynamic_loading,
        "sqlport initialized"
    );
}

/// Open a connection through the global registry.
pub fn connect(url: &str) -> Result<Box<dyn Connection>> {
    Registry::global().connect(url)
}

/// Unregister every driver from the global registry.
///
/// Loaded driver modules stay mapped until the process exits.
pub fn shutdown() {
    Registry::global().clear();
    tracing::info!("sqlport shut down");
}

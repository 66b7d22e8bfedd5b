//! Connection contract implemented by every driver.

use crate::error::Result;
use crate::resultset::StatsResult;
use crate::statement::Statement;

/// An open session with one database.
///
/// The connection exclusively owns its native handle and closes it on drop.
/// Statements borrow the connection, so none can outlive it.
pub trait Connection: Send {
    /// Name of the driver that opened this connection.
    fn driver_name(&self) -> &'static str;

    /// Run one or more `;`-separated statements directly.
    ///
    /// Intermediate results are drained and discarded. Affected rows are
    /// summed across all statements and the last non-zero generated id is
    /// kept.
    ///
    /// # Errors
    ///
    /// The first failing statement aborts the rest. When some statements
    /// already ran, the error is [`Error::Batch`](crate::Error::Batch) and
    /// carries their accounting.
    fn execute(&mut self, sql: &str) -> Result<StatsResult>;

    /// Compile a single parameterized statement.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>>;
}

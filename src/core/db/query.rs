/// Query Execution Module
///
/// Runs SQL against the connection owned by a `ConnectionManager`. The
/// runner performs no statement-type filtering; the shell puts the safety
/// gate in front of it.
use crate::core::db::{ConnectionManager, DbConnection, Driver, QueryResult};
use crate::core::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default per-statement time limit
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Query execution service that operates on a managed connection
pub struct QueryRunner<D: Driver> {
    connections: Arc<ConnectionManager<D>>,
    timeout: Option<Duration>,
}

impl<D: Driver> QueryRunner<D> {
    /// Creates a runner using the default time limit
    pub fn new(connections: Arc<ConnectionManager<D>>) -> Self {
        QueryRunner {
            connections,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Sets the per-statement time limit. `None` lets statements run unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<D>> {
        &self.connections
    }

    /// Executes a SQL statement and returns every row it produces
    ///
    /// # Errors
    ///
    /// - `WhisperError::Connection` if the connection cannot be (re)opened
    /// - `WhisperError::Query` if the database rejects the statement
    /// - `WhisperError::Timeout` if the statement outlives the time limit
    pub fn run_sql(&self, sql: &str) -> Result<QueryResult> {
        let mut connection = self.connections.get_connection()?;
        let started = Instant::now();

        match connection.query(sql, self.timeout) {
            Ok(result) => {
                info!(
                    rows = result.row_count(),
                    columns = result.columns().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query executed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query failed"
                );
                Err(e)
            }
        }
    }
}

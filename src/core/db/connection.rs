/// Connection Management Module
///
/// Holds the credentials for the current session and the single database
/// connection opened from them. The connection is opened lazily, reused for
/// every query and reopened transparently when the held handle reports
/// itself closed.
use crate::core::db::QueryResult;
use crate::core::{Result, WhisperError};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// A credential that must never be echoed or logged in cleartext.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Returns the cleartext value. Only drivers should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Parameters for opening a connection. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    database: String,
    user: String,
    password: Secret,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: Secret,
    ) -> Self {
        ConnectionConfig {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    /// Descriptive connection string for the given driver scheme.
    ///
    /// The password is never part of it, so the result is safe to log.
    pub fn url(&self, scheme: &str) -> String {
        format!(
            "{}://{}/{}?mode=rw&foreign_keys=on&timezone=UTC",
            scheme, self.host, self.database
        )
    }
}

/// Opens connections for one database engine.
pub trait Driver: Send + Sync {
    type Connection: DbConnection;

    /// URL scheme used when describing connections of this driver.
    fn scheme(&self) -> &'static str;

    /// Opens a new connection. Rejections become `WhisperError::Connection`.
    fn open(&self, config: &ConnectionConfig) -> Result<Self::Connection>;
}

/// A live database session.
pub trait DbConnection: Send {
    /// Whether the handle can no longer be used.
    fn is_closed(&self) -> bool;

    /// Executes `sql` and materializes every row before returning.
    ///
    /// Statement resources are released before this returns on every path.
    /// When `timeout` is set, a statement still running after it elapses is
    /// interrupted and `WhisperError::Timeout` is returned.
    fn query(&mut self, sql: &str, timeout: Option<Duration>) -> Result<QueryResult>;

    /// Releases the session.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

#[derive(Debug)]
struct ConnectionState<C> {
    config: Option<ConnectionConfig>,
    connection: Option<C>,
}

/// Exclusive access to the managed connection.
///
/// Holding the guard keeps the manager locked, so statements against the
/// shared connection never overlap.
pub type ConnectionGuard<'a, C> = MappedMutexGuard<'a, C>;

/// Connection manager for database operations
pub struct ConnectionManager<D: Driver> {
    driver: D,
    state: Mutex<ConnectionState<D::Connection>>,
}

impl<D: Driver> ConnectionManager<D> {
    /// Creates a manager with no credentials and no open connection
    pub fn new(driver: D) -> Self {
        ConnectionManager {
            driver,
            state: Mutex::new(ConnectionState {
                config: None,
                connection: None,
            }),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Stores the parameters used by the next open.
    ///
    /// Does not connect, and leaves an already open connection in place.
    pub fn set_credentials(&self, config: ConnectionConfig) {
        let mut state = self.state.lock();
        info!(
            url = %config.url(self.driver.scheme()),
            user = config.user(),
            "credentials updated"
        );
        state.config = Some(config);
    }

    /// Returns the live connection, opening one if none is held or the held
    /// one reports itself closed.
    ///
    /// # Errors
    ///
    /// `WhisperError::Connection` when no credentials were set or the driver
    /// rejects the open.
    pub fn get_connection(&self) -> Result<ConnectionGuard<'_, D::Connection>> {
        let mut state = self.state.lock();

        let needs_open = state
            .connection
            .as_ref()
            .map_or(true, |connection| connection.is_closed());

        if needs_open {
            let config = state.config.as_ref().ok_or_else(|| {
                WhisperError::Connection("no credentials have been set".to_string())
            })?;
            let url = config.url(self.driver.scheme());
            info!(url = %url, "opening connection");
            let connection = self.driver.open(config).map_err(|e| {
                warn!(url = %url, error = %e, "connection attempt rejected");
                e
            })?;
            // A replaced handle already reported itself closed.
            state.connection = Some(connection);
        }

        MutexGuard::try_map(state, |state| state.connection.as_mut())
            .map_err(|_| WhisperError::Connection("connection is unavailable".to_string()))
    }

    /// Closes the open connection, if any.
    ///
    /// Errors raised while closing are logged and swallowed.
    pub fn close(&self) {
        let connection = self.state.lock().connection.take();
        if let Some(connection) = connection {
            match connection.close() {
                Ok(()) => info!("connection closed"),
                Err(e) => warn!(error = %e, "error while closing connection"),
            }
        }
    }

    /// Checks if there's an open connection
    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .connection
            .as_ref()
            .map_or(false, |connection| !connection.is_closed())
    }

    /// Redacted description of the configured target, if credentials are set.
    pub fn describe(&self) -> Option<String> {
        let state = self.state.lock();
        state.config.as_ref().map(|config| {
            format!("{} as {}", config.url(self.driver.scheme()), config.user())
        })
    }
}

impl<D: Driver> Drop for ConnectionManager<D> {
    fn drop(&mut self) {
        self.close();
    }
}

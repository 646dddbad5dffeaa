//! Credential collection.
//!
//! Prompts for host, database, user and password until a connection opens or
//! the user cancels. Empty required fields and rejected connections are
//! reported and the prompts start over.

use crate::config::ConnectionDefaults;
use crate::core::db::{ConnectionConfig, ConnectionManager, Driver, Secret};
use crate::core::{Result, WhisperError};
use crate::input::LineSource;
use std::io::Write;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Cancelled,
}

/// Reads one field, substituting `default` for an empty answer.
fn prompt_field<I: LineSource>(
    input: &mut I,
    label: &str,
    default: Option<&str>,
) -> Result<Option<String>> {
    let prompt = match default {
        Some(default) => format!("{} [{}]:", label, default),
        None => format!("{}:", label),
    };
    let answer = match input.read_line(&prompt)? {
        Some(answer) => answer.trim().to_string(),
        None => return Ok(None),
    };
    Ok(Some(match (answer.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => answer,
    }))
}

/// Builds a config from the answers, refusing empty required fields.
pub fn validate_credentials(
    host: &str,
    database: &str,
    user: &str,
    password: Secret,
) -> Result<ConnectionConfig> {
    let missing: Vec<&str> = [("host", host), ("database", database), ("user", user)]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(WhisperError::InputValidation(format!(
            "Please fill all fields (missing: {})",
            missing.join(", ")
        )));
    }
    Ok(ConnectionConfig::new(host.trim(), database.trim(), user.trim(), password))
}

/// Runs the credential dialog against `manager`.
///
/// Returns `Cancelled` when input ends or the user aborts a prompt; only
/// terminal I/O failures are returned as errors.
pub fn authenticate<D, I, W>(
    manager: &ConnectionManager<D>,
    defaults: &ConnectionDefaults,
    input: &mut I,
    out: &mut W,
) -> Result<AuthOutcome>
where
    D: Driver,
    I: LineSource,
    W: Write,
{
    writeln!(out, "Database Authentication")?;
    loop {
        let host = match prompt_field(input, "Host", Some(defaults.host.as_str()))? {
            Some(value) => value,
            None => return Ok(AuthOutcome::Cancelled),
        };
        let database = match prompt_field(input, "Database", Some(defaults.database.as_str()))? {
            Some(value) => value,
            None => return Ok(AuthOutcome::Cancelled),
        };
        let user = match prompt_field(input, "Username", defaults.user.as_deref())? {
            Some(value) => value,
            None => return Ok(AuthOutcome::Cancelled),
        };
        let password = match input.read_secret("Password:")? {
            Some(value) => Secret::new(value),
            None => return Ok(AuthOutcome::Cancelled),
        };

        let config = match validate_credentials(&host, &database, &user, password) {
            Ok(config) => config,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        manager.set_credentials(config);
        match manager.get_connection() {
            Ok(_) => {
                info!(user = %user, "authenticated");
                writeln!(out, "Connected to {} as {}.", database, user)?;
                return Ok(AuthOutcome::Authenticated);
            }
            Err(e) => {
                writeln!(out, "Connection failed: {}", e)?;
            }
        }
    }
}

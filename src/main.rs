use crossterm::tty::IsTty;
use datawhisper::auth::{authenticate, AuthOutcome};
use datawhisper::config::{default_config_path, resolve_config, Config};
use datawhisper::core::db::{ConnectionManager, SqliteDriver};
use datawhisper::core::{Result, WhisperError};
use datawhisper::input::{BufReadInput, LineSource, TerminalInput};
use datawhisper::logging::init_logging;
use datawhisper::repl::{run_shell, Session};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, PartialEq)]
enum CliAction {
    Run { config: Option<PathBuf> },
    Help,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<CliAction> {
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-c" | "--config" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => {
                    return Err(WhisperError::InputValidation(
                        "--config needs a path".to_string(),
                    ))
                }
            },
            other => {
                return Err(WhisperError::InputValidation(format!(
                    "unknown argument '{}'",
                    other
                )))
            }
        }
    }
    Ok(CliAction::Run { config })
}

fn print_usage() {
    println!("datawhisper - ask a SQL database questions in plain English");
    println!();
    println!("Usage: datawhisper [--config <path>]");
    println!();
    println!("Options:");
    println!("  -c, --config <path>  Read settings from this TOML file");
    println!("  -h, --help           Show this message");
    if let Some(path) = default_config_path() {
        println!();
        println!("Default config file: {}", path.display());
    }
}

fn run<I: LineSource>(config: &Config, input: &mut I) -> Result<()> {
    let manager = Arc::new(ConnectionManager::new(SqliteDriver));
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if authenticate(&manager, &config.connection, input, &mut out)? == AuthOutcome::Cancelled {
        info!("authentication cancelled");
        return Ok(());
    }

    let mut session = Session::from_config(config, Arc::clone(&manager))?;
    let outcome = run_shell(&mut session, input, &mut out);
    manager.close();
    outcome
}

fn main() -> ExitCode {
    let config_path = match parse_args(std::env::args().skip(1)) {
        Ok(CliAction::Help) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Run { config }) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try 'datawhisper --help'.");
            return ExitCode::from(2);
        }
    };

    let config = match resolve_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting datawhisper...");
    let stdin = io::stdin();
    let outcome = if stdin.is_tty() {
        run(&config, &mut TerminalInput::new())
    } else {
        run(&config, &mut BufReadInput::new(stdin.lock()))
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "datawhisper stopped");
            eprintln!("{}: {}", e.title(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(args(&[])).unwrap(), CliAction::Run { config: None });
        assert_eq!(
            parse_args(args(&["--config", "dw.toml"])).unwrap(),
            CliAction::Run {
                config: Some(PathBuf::from("dw.toml"))
            }
        );
        assert_eq!(parse_args(args(&["-c", "a", "--help"])).unwrap(), CliAction::Help);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["school.db"])).is_err());
    }
}

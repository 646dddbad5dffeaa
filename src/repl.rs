use crate::config::Config;
use crate::core::db::{ConnectionManager, Driver, QueryResult, QueryRunner};
use crate::core::{Result, WhisperError};
use crate::history::{HistoryEntry, HistoryOutcome, QueryHistory};
use crate::input::LineSource;
use crate::results_grid::ResultsGrid;
use crate::safety::SafetyGate;
use crate::translator::QueryTranslator;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const PROMPT: &str = "datawhisper>";

/// Represents a parsed REPL command.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Natural-language question to translate
    Ask(String),
    Run,
    /// Replace the pending SQL with the user's own statement
    Sql(String),
    Show,
    Hist,
    Export(String),
    Reconnect,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parses a user input string into a corresponding `Command`.
///
/// If the input starts with a colon (`:`), it is interpreted as a command.
/// Otherwise, it is treated as a natural-language question.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Empty;
    }
    let Some(body) = input.strip_prefix(':') else {
        return Command::Ask(input.to_string());
    };
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    match name {
        "run" | "r" => Command::Run,
        "sql" | "edit" => Command::Sql(rest.to_string()),
        "show" => Command::Show,
        "hist" | "history" => Command::Hist,
        "export" if !rest.is_empty() => Command::Export(rest.to_string()),
        "reconnect" => Command::Reconnect,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Whether the shell keeps reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone)]
struct PendingQuery {
    sql: String,
    question: Option<String>,
}

/// State of one interactive session: the pipeline components plus the
/// pending SQL buffer, the last result and the session history.
pub struct Session<D: Driver> {
    translator: QueryTranslator,
    gate: SafetyGate,
    runner: QueryRunner<D>,
    history: QueryHistory,
    pending: Option<PendingQuery>,
    last_result: Option<QueryResult>,
    max_rows: usize,
    auto_run: bool,
}

impl<D: Driver> Session<D> {
    pub fn new(
        translator: QueryTranslator,
        gate: SafetyGate,
        runner: QueryRunner<D>,
        history: QueryHistory,
    ) -> Self {
        Session {
            translator,
            gate,
            runner,
            history,
            pending: None,
            last_result: None,
            max_rows: 50,
            auto_run: false,
        }
    }

    /// Builds a session from validated configuration.
    pub fn from_config(config: &Config, connections: Arc<ConnectionManager<D>>) -> Result<Self> {
        let translator = QueryTranslator::from_config(&config.translator)?;
        let runner = QueryRunner::new(connections).with_timeout(config.query.timeout());
        let mut session = Session::new(
            translator,
            SafetyGate::new(config.safety.policy),
            runner,
            QueryHistory::new(config.history.max_entries),
        );
        session.max_rows = config.ui.max_rows.max(1);
        session.auto_run = config.query.auto_run;
        Ok(session)
    }

    pub fn with_auto_run(mut self, auto_run: bool) -> Self {
        self.auto_run = auto_run;
        self
    }

    pub fn pending_sql(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.sql.as_str())
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    /// Translates a question and makes the SQL the pending statement.
    pub fn translate(&mut self, question: &str) -> &str {
        let sql = self.translator.convert_nl_to_sql(question);
        let pending = self.pending.insert(PendingQuery {
            sql,
            question: Some(question.to_string()),
        });
        &pending.sql
    }

    /// Replaces the pending statement with the user's SQL.
    pub fn edit(&mut self, sql: &str) -> Result<()> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(WhisperError::InputValidation(
                "Please enter a SQL statement.".to_string(),
            ));
        }
        self.pending = Some(PendingQuery {
            sql: sql.to_string(),
            question: None,
        });
        Ok(())
    }

    /// Passes the pending statement through the safety gate and runs it.
    ///
    /// Every attempt is recorded in the session history; refused statements
    /// never reach the runner.
    pub fn run_pending(&mut self) -> Result<&QueryResult> {
        let PendingQuery { sql, question } = self.pending.clone().ok_or_else(|| {
            WhisperError::InputValidation("Please generate SQL first.".to_string())
        })?;
        let started = Instant::now();

        if let Err(e) = self.gate.check(&sql) {
            self.history.record(HistoryEntry::new(
                question,
                sql,
                started.elapsed(),
                HistoryOutcome::Rejected(e.to_string()),
            ));
            return Err(e);
        }

        match self.runner.run_sql(&sql) {
            Ok(result) => {
                self.history.record(HistoryEntry::new(
                    question,
                    sql,
                    started.elapsed(),
                    HistoryOutcome::Rows(result.row_count()),
                ));
                Ok(&*self.last_result.insert(result))
            }
            Err(e) => {
                self.history.record(HistoryEntry::new(
                    question,
                    sql,
                    started.elapsed(),
                    HistoryOutcome::Failed(e.to_string()),
                ));
                Err(e)
            }
        }
    }

    /// Executes one command, reporting recoverable errors to `out`.
    pub fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        debug!(command = ?command, "handling command");
        match command {
            Command::Empty => report(
                out,
                WhisperError::InputValidation(
                    "Please enter a natural language query.".to_string(),
                ),
            )?,
            Command::Ask(question) => {
                let sql = self.translate(&question).to_string();
                writeln!(out, "SQL: {}", sql)?;
                if self.auto_run {
                    self.run_and_render(out)?;
                } else {
                    writeln!(out, "Type :run to execute it, or :sql <statement> to edit it.")?;
                }
            }
            Command::Run => self.run_and_render(out)?,
            Command::Sql(sql) => match self.edit(&sql) {
                Ok(()) => writeln!(out, "SQL updated.")?,
                Err(e) => report(out, e)?,
            },
            Command::Show => match self.pending_sql() {
                Some(sql) => writeln!(out, "SQL: {}", sql)?,
                None => writeln!(out, "No SQL yet. Ask a question first.")?,
            },
            Command::Hist => {
                if self.history.is_empty() {
                    writeln!(out, "No queries run yet.")?;
                } else {
                    write!(out, "{}", self.history.render())?;
                }
            }
            Command::Export(format) => match &self.last_result {
                Some(result) => match ResultsGrid::new(result).export(&format) {
                    Ok(text) => {
                        write!(out, "{}", text)?;
                        if !text.ends_with('\n') {
                            writeln!(out)?;
                        }
                    }
                    Err(e) => report(out, e)?,
                },
                None => report(
                    out,
                    WhisperError::InputValidation("Run a query first.".to_string()),
                )?,
            },
            Command::Reconnect => {
                let connections = self.runner.connections();
                connections.close();
                match connections.get_connection() {
                    Ok(_) => writeln!(out, "Reconnected.")?,
                    Err(e) => report(out, e)?,
                }
            }
            Command::Help => print_help(out)?,
            Command::Quit => return Ok(Flow::Exit),
            Command::Unknown(input) => {
                writeln!(out, "Unknown command: {}. Type :help for a list.", input)?
            }
        }
        Ok(Flow::Continue)
    }

    fn run_and_render<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let max_rows = self.max_rows;
        match self.run_pending() {
            Ok(result) if result.is_empty() => writeln!(out, "No results found.")?,
            Ok(result) => write!(out, "{}", ResultsGrid::new(result).render(max_rows))?,
            Err(e) => report(out, e)?,
        }
        Ok(())
    }
}

/// Writes a recoverable error for the user; anything else is returned.
pub fn report<W: Write>(out: &mut W, error: WhisperError) -> Result<()> {
    if !error.is_recoverable() {
        return Err(error);
    }
    writeln!(out, "{}: {}", error.title(), error)?;
    Ok(())
}

fn print_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Available commands:")?;
    writeln!(out, "  <question>          - Translate a plain-English question into SQL")?;
    writeln!(out, "  :run                - Run the pending SQL (SELECT only)")?;
    writeln!(out, "  :sql <statement>    - Replace the pending SQL with your own")?;
    writeln!(out, "  :show               - Show the pending SQL")?;
    writeln!(out, "  :hist               - Show queries run in this session")?;
    writeln!(out, "  :export <format>    - Export the last result (csv, json, markdown)")?;
    writeln!(out, "  :reconnect          - Close and reopen the database connection")?;
    writeln!(out, "  :help               - List all available commands")?;
    writeln!(out, "  :quit               - Exit")?;
    Ok(())
}

/// Reads commands until `:quit` or end of input.
pub fn run_shell<D, I, W>(session: &mut Session<D>, input: &mut I, out: &mut W) -> Result<()>
where
    D: Driver,
    I: LineSource,
    W: Write,
{
    writeln!(
        out,
        "Ask a question in plain English, or type :help. Type :quit to exit."
    )?;
    loop {
        out.flush()?;
        let line = match input.read_line(PROMPT)? {
            Some(line) => line,
            None => break,
        };
        if session.handle(parse_command(&line), out)? == Flow::Exit {
            break;
        }
    }
    Ok(())
}

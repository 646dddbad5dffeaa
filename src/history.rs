//! Session query history.
//!
//! Entries live only as long as the process; nothing is written to disk.
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    /// Executed and returned this many rows
    Rows(usize),
    /// Refused by the safety gate
    Rejected(String),
    /// The database reported an error
    Failed(String),
}

impl fmt::Display for HistoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryOutcome::Rows(1) => write!(f, "1 row"),
            HistoryOutcome::Rows(n) => write!(f, "{} rows", n),
            HistoryOutcome::Rejected(reason) => write!(f, "rejected: {}", reason),
            HistoryOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The question that produced the SQL, if it came from the translator
    pub natural_language: Option<String>,
    pub sql: String,
    pub executed_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: HistoryOutcome,
}

impl HistoryEntry {
    pub fn new(
        natural_language: Option<String>,
        sql: String,
        duration: Duration,
        outcome: HistoryOutcome,
    ) -> Self {
        HistoryEntry {
            natural_language,
            sql,
            executed_at: Utc::now(),
            duration,
            outcome,
        }
    }
}

/// Bounded ring of recent executions, oldest first.
#[derive(Debug)]
pub struct QueryHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        QueryHistory {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a query execution to history, evicting the oldest entry when full
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        debug!(sql = %entry.sql, outcome = %entry.outcome, "recorded history entry");
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// One line per entry, numbered from 1.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for (index, entry) in self.entries.iter().enumerate() {
            output.push_str(&format!(
                "{:>3}. [{}] {} ({}, {} ms)\n",
                index + 1,
                entry.executed_at.format("%H:%M:%S"),
                entry.sql,
                entry.outcome,
                entry.duration.as_millis()
            ));
            if let Some(question) = &entry.natural_language {
                output.push_str(&format!("     asked: {}\n", question));
            }
        }
        output
    }
}

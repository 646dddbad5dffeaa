//! Read-only statement gate.
//!
//! Sits between translator output (or the user's edits) and the query
//! runner. Statements it refuses never reach the database.

use crate::core::{Result, WhisperError};
use serde::Deserialize;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::warn;

/// Keywords the keyword policy refuses anywhere in the statement.
pub const FORBIDDEN_KEYWORDS: [&str; 5] = ["INSERT", "UPDATE", "DELETE", "DROP", "ALTER"];

/// How statements are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyPolicy {
    /// Parse the SQL and require exactly one read-only query.
    #[default]
    Parser,
    /// Textual filter: starts with SELECT and names no write keyword.
    Keyword,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate {
    policy: SafetyPolicy,
}

impl SafetyGate {
    pub fn new(policy: SafetyPolicy) -> Self {
        SafetyGate { policy }
    }

    pub fn policy(&self) -> SafetyPolicy {
        self.policy
    }

    /// Accepts `sql` or explains why it was refused.
    pub fn check(&self, sql: &str) -> Result<()> {
        let verdict = match self.policy {
            SafetyPolicy::Parser => check_parsed(sql),
            SafetyPolicy::Keyword => check_keywords(sql),
        };
        verdict.map_err(|reason| {
            warn!(policy = ?self.policy, reason = %reason, "statement rejected");
            WhisperError::SafetyRejection(reason)
        })
    }

    pub fn is_safe(&self, sql: &str) -> bool {
        self.check(sql).is_ok()
    }
}

/// Textual check: uppercased and trimmed, the statement must start with
/// SELECT and contain none of the forbidden keywords as substrings.
pub fn is_safe_by_keywords(sql: &str) -> bool {
    check_keywords(sql).is_ok()
}

fn check_keywords(sql: &str) -> std::result::Result<(), String> {
    let upper = sql.trim().to_uppercase();
    if !upper.starts_with("SELECT") {
        return Err("Only SELECT queries are allowed".to_string());
    }
    match FORBIDDEN_KEYWORDS.iter().find(|keyword| upper.contains(*keyword)) {
        Some(keyword) => Err(format!("statement mentions {}", keyword)),
        None => Ok(()),
    }
}

fn check_parsed(sql: &str) -> std::result::Result<(), String> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| {
            format!(
                "statement is not supported by the SQL parser ({}); \
                 set [safety] policy = \"keyword\" to use the keyword filter instead",
                e
            )
        })?;

    match statements.as_slice() {
        [] => Err("no statement given".to_string()),
        [Statement::Query(query)] if is_read_only(&query.body) => Ok(()),
        [Statement::Query(_)] => Err("query body modifies data".to_string()),
        [_] => Err("Only SELECT queries are allowed".to_string()),
        _ => Err(format!(
            "expected a single statement, found {}",
            statements.len()
        )),
    }
}

fn is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) => true,
        SetExpr::Query(query) => is_read_only(&query.body),
        SetExpr::SetOperation { left, right, .. } => is_read_only(left) && is_read_only(right),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_accepts_plain_select() {
        let gate = SafetyGate::default();
        assert!(gate.is_safe("select * from t"));
        assert!(gate.is_safe("SELECT * FROM students;"));
        assert!(gate.is_safe(
            "SELECT s.id, s.name, s.age, AVG(m.marks) as marks FROM students s JOIN marks m \
             ON s.id = m.student_id WHERE m.marks > 80 GROUP BY s.id, s.name, s.age;"
        ));
        assert!(gate.is_safe("SELECT name FROM a UNION SELECT name FROM b"));
    }

    #[test]
    fn test_parser_rejects_writes_and_stacked_statements() {
        let gate = SafetyGate::default();
        for sql in [
            "SELECT * FROM t; DROP TABLE t;",
            "UPDATE t SET x=1",
            "DELETE FROM students",
            "DROP TABLE students",
            "INSERT INTO t VALUES (1)",
            "",
            "SELEC * FROM t",
        ] {
            match gate.check(sql) {
                Err(WhisperError::SafetyRejection(_)) => {}
                other => panic!("{:?} should be rejected, got {:?}", sql, other),
            }
        }
    }

    #[test]
    fn test_parser_allows_keywords_inside_literals() {
        let gate = SafetyGate::new(SafetyPolicy::Parser);
        let sql = "SELECT * FROM log_entries WHERE kind = 'UPDATE'";
        assert!(gate.is_safe(sql));
        assert!(!SafetyGate::new(SafetyPolicy::Keyword).is_safe(sql));
    }

    #[test]
    fn test_keyword_policy() {
        let gate = SafetyGate::new(SafetyPolicy::Keyword);
        assert!(gate.is_safe("select * from t"));
        assert!(gate.is_safe("   SELECT AVG(marks) FROM students;  "));
        assert!(!gate.is_safe("SELECT * FROM t; DROP TABLE t;"));
        assert!(!gate.is_safe("UPDATE t SET x=1"));
        assert!(!gate.is_safe("WITH x AS (SELECT 1) SELECT * FROM x"));
        // Substring match: a column named updated_at is refused too.
        assert!(!gate.is_safe("SELECT updated_at FROM t"));
    }

    #[test]
    fn test_rejection_message() {
        let err = SafetyGate::default().check("UPDATE t SET x=1").unwrap_err();
        assert_eq!(err.title(), "Security Warning");
        assert!(err.to_string().contains("Only SELECT queries are allowed"));
    }

    #[test]
    fn test_unparseable_select_is_reported_as_unsupported() {
        let err = SafetyGate::default()
            .check("SELECT * FROM students WHERE name GLOB 'A*'")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("not supported by the SQL parser"));
        assert!(message.contains("policy = \"keyword\""));
        assert!(!message.contains("Only SELECT queries are allowed"));
        assert!(SafetyGate::new(SafetyPolicy::Keyword)
            .is_safe("SELECT * FROM students WHERE name GLOB 'A*'"));
    }
}

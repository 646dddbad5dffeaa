//! Natural-language to SQL translation.
//!
//! Input is lowercased and trimmed, then checked against an ordered rule
//! table. The first rule whose matcher accepts the text decides the SQL, even
//! when a later rule would also match. Text no rule accepts gets the fallback
//! statement.

use crate::config::{RuleConfig, TranslatorConfig};
use crate::core::{Result, WhisperError};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Statement produced when no rule matches.
pub const DEFAULT_FALLBACK: &str = "SELECT * FROM students;";

static DEFAULT_RULES: Lazy<Vec<TranslationRule>> = Lazy::new(|| {
    vec![
        TranslationRule::new(
            Matcher::all(["show all students", "marks above 80"]),
            "SELECT s.id, s.name, s.age, AVG(m.marks) as marks FROM students s \
             JOIN marks m ON s.id = m.student_id WHERE m.marks > 80 \
             GROUP BY s.id, s.name, s.age;",
        ),
        TranslationRule::new(
            Matcher::any(["show all students", "list all students"]),
            "SELECT * FROM students;",
        ),
        TranslationRule::new(
            Matcher::any(["students with high marks"]),
            "SELECT * FROM students WHERE marks > 90;",
        ),
        TranslationRule::new(
            Matcher::any(["average marks"]),
            "SELECT AVG(marks) FROM students;",
        ),
    ]
});

/// Predicate over lowercased input text.
///
/// Accepts when every `all` phrase is contained, at least one `any` phrase is
/// contained (if any are listed) and the optional pattern matches.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    all: Vec<String>,
    any: Vec<String>,
    pattern: Option<Regex>,
}

impl Matcher {
    pub fn all<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Matcher {
            all: lowercase(phrases),
            ..Matcher::default()
        }
    }

    pub fn any<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Matcher {
            any: lowercase(phrases),
            ..Matcher::default()
        }
    }

    /// Case-insensitive regular expression matcher.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| WhisperError::Config(format!("invalid rule pattern '{}': {}", pattern, e)))?;
        Ok(Matcher {
            pattern: Some(regex),
            ..Matcher::default()
        })
    }

    fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty() && self.pattern.is_none()
    }

    /// `text` must already be lowercased.
    pub fn matches(&self, text: &str) -> bool {
        self.all.iter().all(|phrase| text.contains(phrase.as_str()))
            && (self.any.is_empty() || self.any.iter().any(|phrase| text.contains(phrase.as_str())))
            && self.pattern.as_ref().map_or(true, |regex| regex.is_match(text))
    }
}

fn lowercase<I, S>(phrases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    phrases
        .into_iter()
        .map(|phrase| phrase.as_ref().to_lowercase())
        .collect()
}

/// One entry of the ordered rule table.
#[derive(Debug, Clone)]
pub struct TranslationRule {
    matcher: Matcher,
    sql: String,
}

impl TranslationRule {
    pub fn new(matcher: Matcher, sql: impl Into<String>) -> Self {
        TranslationRule {
            matcher,
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Builds a rule from its TOML form.
    pub fn from_config(rule: &RuleConfig) -> Result<Self> {
        let mut matcher = match rule.pattern.as_deref() {
            Some(pattern) => Matcher::pattern(pattern)?,
            None => Matcher::default(),
        };
        matcher.all = lowercase(&rule.all);
        matcher.any = lowercase(&rule.any);

        if matcher.is_empty() {
            return Err(WhisperError::Config(format!(
                "rule for '{}' needs at least one of `all`, `any` or `pattern`",
                rule.sql
            )));
        }
        if rule.sql.trim().is_empty() {
            return Err(WhisperError::Config("rule has an empty `sql`".to_string()));
        }
        Ok(TranslationRule::new(matcher, rule.sql.trim()))
    }
}

/// Rule-based translator. Read-only once built.
#[derive(Debug, Clone)]
pub struct QueryTranslator {
    rules: Vec<TranslationRule>,
    fallback: String,
}

impl Default for QueryTranslator {
    fn default() -> Self {
        QueryTranslator::new()
    }
}

impl QueryTranslator {
    /// Translator with the built-in rule table and fallback.
    pub fn new() -> Self {
        QueryTranslator {
            rules: DEFAULT_RULES.clone(),
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    /// Translator with configured rules ahead of (or instead of) the built-in ones.
    pub fn from_config(config: &TranslatorConfig) -> Result<Self> {
        let mut rules = config
            .rules
            .iter()
            .map(TranslationRule::from_config)
            .collect::<Result<Vec<_>>>()?;
        if !config.replace_defaults {
            rules.extend(DEFAULT_RULES.iter().cloned());
        }

        let fallback = match config.fallback.as_deref().map(str::trim) {
            Some("") => {
                return Err(WhisperError::Config(
                    "translator fallback must not be empty".to_string(),
                ))
            }
            Some(fallback) => fallback.to_string(),
            None => DEFAULT_FALLBACK.to_string(),
        };

        Ok(QueryTranslator { rules, fallback })
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Maps natural-language text to SQL. Never fails and never returns an
    /// empty string.
    pub fn convert_nl_to_sql(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let sql = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(&lowered))
            .map_or(self.fallback.as_str(), |rule| rule.sql.as_str());
        debug!(input = %text, sql = %sql, "translated natural language query");
        sql.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOINED: &str = "SELECT s.id, s.name, s.age, AVG(m.marks) as marks FROM students s JOIN marks m ON s.id = m.student_id WHERE m.marks > 80 GROUP BY s.id, s.name, s.age;";

    #[test]
    fn test_default_rules() {
        let translator = QueryTranslator::new();
        assert_eq!(
            translator.convert_nl_to_sql("Show all students with marks above 80"),
            JOINED
        );
        assert_eq!(
            translator.convert_nl_to_sql("list all students"),
            "SELECT * FROM students;"
        );
        assert_eq!(
            translator.convert_nl_to_sql("which are the Students With High Marks?"),
            "SELECT * FROM students WHERE marks > 90;"
        );
        assert_eq!(
            translator.convert_nl_to_sql("what are the average marks"),
            "SELECT AVG(marks) FROM students;"
        );
    }

    #[test]
    fn test_phrase_order_does_not_matter() {
        let translator = QueryTranslator::new();
        assert_eq!(
            translator.convert_nl_to_sql("marks above 80: show all students"),
            JOINED
        );
    }

    #[test]
    fn test_first_match_wins() {
        let translator = QueryTranslator::new();
        // Matches both the "show all students" rule and the "average marks" rule.
        assert_eq!(
            translator.convert_nl_to_sql("show all students and their average marks"),
            "SELECT * FROM students;"
        );
    }

    #[test]
    fn test_fallback() {
        let translator = QueryTranslator::new();
        assert_eq!(translator.convert_nl_to_sql(""), DEFAULT_FALLBACK);
        assert_eq!(translator.convert_nl_to_sql("   "), DEFAULT_FALLBACK);
        assert_eq!(translator.convert_nl_to_sql("how is the weather"), DEFAULT_FALLBACK);
    }

    #[test]
    fn test_configured_rules_come_first() {
        let config = TranslatorConfig {
            rules: vec![RuleConfig {
                any: vec!["Show All Students".to_string()],
                sql: "SELECT name FROM students ORDER BY name;".to_string(),
                ..RuleConfig::default()
            }],
            ..TranslatorConfig::default()
        };
        let translator = QueryTranslator::from_config(&config).unwrap();
        assert_eq!(
            translator.convert_nl_to_sql("show all students"),
            "SELECT name FROM students ORDER BY name;"
        );
        // Built-in rules remain behind the configured ones.
        assert_eq!(
            translator.convert_nl_to_sql("average marks"),
            "SELECT AVG(marks) FROM students;"
        );
    }

    #[test]
    fn test_replace_defaults_and_custom_fallback() {
        let config = TranslatorConfig {
            rules: vec![RuleConfig {
                pattern: Some(r"\bolder than \d+".to_string()),
                sql: "SELECT * FROM students WHERE age > 21;".to_string(),
                ..RuleConfig::default()
            }],
            replace_defaults: true,
            fallback: Some("SELECT name FROM students;".to_string()),
        };
        let translator = QueryTranslator::from_config(&config).unwrap();
        assert_eq!(translator.rules().len(), 1);
        assert_eq!(
            translator.convert_nl_to_sql("students OLDER THAN 21"),
            "SELECT * FROM students WHERE age > 21;"
        );
        assert_eq!(
            translator.convert_nl_to_sql("average marks"),
            "SELECT name FROM students;"
        );
    }

    #[test]
    fn test_invalid_rules_are_rejected() {
        let no_matcher = TranslatorConfig {
            rules: vec![RuleConfig {
                sql: "SELECT 1;".to_string(),
                ..RuleConfig::default()
            }],
            ..TranslatorConfig::default()
        };
        assert!(matches!(
            QueryTranslator::from_config(&no_matcher),
            Err(WhisperError::Config(_))
        ));

        let bad_pattern = TranslatorConfig {
            rules: vec![RuleConfig {
                pattern: Some("(unclosed".to_string()),
                sql: "SELECT 1;".to_string(),
                ..RuleConfig::default()
            }],
            ..TranslatorConfig::default()
        };
        assert!(matches!(
            QueryTranslator::from_config(&bad_pattern),
            Err(WhisperError::Config(_))
        ));

        let empty_fallback = TranslatorConfig {
            fallback: Some("  ".to_string()),
            ..TranslatorConfig::default()
        };
        assert!(matches!(
            QueryTranslator::from_config(&empty_fallback),
            Err(WhisperError::Config(_))
        ));
    }
}

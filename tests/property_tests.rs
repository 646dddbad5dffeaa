//! Property-based tests for translation and statement classification
//!
//! These tests verify that:
//! - Rule matching ignores case, word order and surrounding text
//! - Text no rule accepts always gets the fallback statement
//! - The keyword policy agrees with a plain substring scan
//! - The parser policy refuses every write statement

#[cfg(test)]
mod tests {
    use datawhisper::safety::{SafetyGate, SafetyPolicy, FORBIDDEN_KEYWORDS};
    use datawhisper::translator::{QueryTranslator, DEFAULT_FALLBACK};
    use proptest::prelude::*;

    const JOINED: &str = "SELECT s.id, s.name, s.age, AVG(m.marks) as marks FROM students s JOIN marks m ON s.id = m.student_id WHERE m.marks > 80 GROUP BY s.id, s.name, s.age;";

    fn arb_filler() -> impl Strategy<Value = String> {
        "[a-z ]{0,20}".prop_map(|s: String| s)
    }

    fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}".prop_map(|s: String| format!("t_{}", s))
    }

    proptest! {
        #[test]
        fn test_both_phrases_pick_joined_query(
            before in arb_filler(),
            between in arb_filler(),
            after in arb_filler(),
            reversed in any::<bool>(),
            shout in any::<bool>(),
        ) {
            let (first, second) = if reversed {
                ("marks above 80", "show all students")
            } else {
                ("show all students", "marks above 80")
            };
            let mut text = format!("{} {} {} {} {}", before, first, between, second, after);
            if shout {
                text = text.to_uppercase();
            }
            prop_assert_eq!(QueryTranslator::new().convert_nl_to_sql(&text), JOINED);
        }

        #[test]
        fn test_unmatched_text_gets_fallback(text in "[0-9 .,?!]{0,60}") {
            prop_assert_eq!(QueryTranslator::new().convert_nl_to_sql(&text), DEFAULT_FALLBACK);
        }

        #[test]
        fn test_translation_never_empty(text in ".{0,80}") {
            let sql = QueryTranslator::new().convert_nl_to_sql(&text);
            prop_assert!(!sql.trim().is_empty());
        }

        #[test]
        fn test_keyword_policy_matches_substring_scan(
            lead in prop_oneof![Just(""), Just("select "), Just("  SeLeCt ")],
            text in "[A-Za-z ;,*=]{0,60}",
        ) {
            let sql = format!("{}{}", lead, text);
            let upper = sql.trim().to_uppercase();
            let expected = upper.starts_with("SELECT")
                && !FORBIDDEN_KEYWORDS.iter().any(|keyword| upper.contains(keyword));
            prop_assert_eq!(SafetyGate::new(SafetyPolicy::Keyword).is_safe(&sql), expected);
        }

        #[test]
        fn test_parser_policy_accepts_plain_selects(
            table in arb_identifier(),
            column in arb_identifier(),
            limit in 0u32..1000,
        ) {
            let sql = format!("SELECT {} FROM {} LIMIT {}", column, table, limit);
            prop_assert!(SafetyGate::default().is_safe(&sql));
        }

        #[test]
        fn test_parser_policy_refuses_writes(
            table in arb_identifier(),
            column in arb_identifier(),
            value in any::<i32>(),
        ) {
            let gate = SafetyGate::default();
            let writes = [
                format!("INSERT INTO {} ({}) VALUES ({})", table, column, value),
                format!("UPDATE {} SET {} = {}", table, column, value),
                format!("DELETE FROM {} WHERE {} = {}", table, column, value),
                format!("DROP TABLE {}", table),
                format!("SELECT {} FROM {}; DROP TABLE {}", column, table, table),
            ];
            for sql in &writes {
                prop_assert!(!gate.is_safe(sql), "accepted {}", sql);
            }
        }
    }
}

//! Results Grid Module
//!
//! Renders a `QueryResult` as an aligned text table for the terminal and
//! exports it as CSV, JSON or Markdown.
use crate::core::db::{CellValue, QueryResult};
use crate::core::{Result, WhisperError};
use serde::Serialize;

#[derive(Serialize)]
struct JsonExport<'a> {
    columns: &'a [String],
    rows: &'a [Vec<CellValue>],
}

/// Tabular view over one query result.
#[derive(Debug, Clone)]
pub struct ResultsGrid<'a> {
    result: &'a QueryResult,
}

impl<'a> ResultsGrid<'a> {
    pub fn new(result: &'a QueryResult) -> Self {
        ResultsGrid { result }
    }

    /// Column widths in characters, wide enough for the header and every
    /// cell among the first `max_rows` rows.
    fn widths(&self, max_rows: usize) -> Vec<usize> {
        self.result
            .columns()
            .iter()
            .enumerate()
            .map(|(index, header)| {
                self.result
                    .rows()
                    .iter()
                    .take(max_rows)
                    .filter_map(|row| row.get(index))
                    .map(|cell| cell.to_string().chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Renders headers, a separator and at most `max_rows` rows, followed by
    /// a row count footer. Numbers are right-aligned.
    pub fn render(&self, max_rows: usize) -> String {
        let widths = self.widths(max_rows);
        let mut output = String::new();

        let header: Vec<String> = self
            .result
            .columns()
            .iter()
            .zip(&widths)
            .map(|(name, width)| pad(name, *width, false))
            .collect();
        push_line(&mut output, &header.join(" | "));

        let underline: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        push_line(&mut output, &underline.join("-+-"));

        for row in self.result.rows().iter().take(max_rows) {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| pad(&cell.to_string(), *width, cell.is_numeric()))
                .collect();
            push_line(&mut output, &cells.join(" | "));
        }

        let total = self.result.row_count();
        if total > max_rows {
            output.push_str(&format!("... {} more rows not shown\n", total - max_rows));
        }
        output.push_str(&match total {
            1 => "(1 row)\n".to_string(),
            n => format!("({} rows)\n", n),
        });
        output
    }

    /// Exports the grid data to a specified format.
    /// Supported formats: CSV, JSON, Markdown.
    pub fn export(&self, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "csv" => Ok(self.export_to_csv()),
            "json" => self.export_to_json(),
            "markdown" | "md" => Ok(self.export_to_markdown()),
            _ => Err(WhisperError::Export(format!(
                "Unsupported export format: '{}'. Supported formats: csv, json, markdown",
                format
            ))),
        }
    }

    fn export_to_csv(&self) -> String {
        let mut output = String::new();
        let header: Vec<String> = self.result.columns().iter().map(|c| csv_field(c)).collect();
        output.push_str(&header.join(","));
        output.push('\n');
        for row in self.result.rows() {
            let fields: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    CellValue::Null => String::new(),
                    other => csv_field(&other.to_string()),
                })
                .collect();
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }

    /// `{"columns": [...], "rows": [[...], ...]}`, keeping column order and
    /// repeated column names.
    fn export_to_json(&self) -> Result<String> {
        let document = JsonExport {
            columns: self.result.columns(),
            rows: self.result.rows(),
        };
        Ok(serde_json::to_string(&document)?)
    }

    fn export_to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("| {} |\n", self.result.columns().join(" | ")));
        let underline: Vec<&str> = self.result.columns().iter().map(|_| "---").collect();
        output.push_str(&format!("| {} |\n", underline.join(" | ")));
        for row in self.result.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.to_string().replace('|', "\\|"))
                .collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output
    }
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    if right_align {
        format!("{:>width$}", text, width = width)
    } else {
        format!("{:<width$}", text, width = width)
    }
}

fn push_line(output: &mut String, line: &str) {
    output.push_str(line.trim_end());
    output.push('\n');
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["id".to_string(), "name".to_string(), "marks".to_string()],
            vec![
                vec![CellValue::Integer(1), CellValue::from("Ann"), CellValue::Float(92.5)],
                vec![CellValue::Integer(22), CellValue::from("Bo, Jr."), CellValue::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_render_with_headers_and_rows() {
        let result = sample();
        let rendered = ResultsGrid::new(&result).render(10);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id | name    | marks");
        assert_eq!(lines[1], "---+---------+------");
        assert_eq!(lines[2], " 1 | Ann     |  92.5");
        assert_eq!(lines[3], "22 | Bo, Jr. | NULL");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_render_truncates() {
        let result = sample();
        let rendered = ResultsGrid::new(&result).render(1);
        assert!(rendered.contains(" 1 | Ann"));
        assert!(!rendered.contains("Bo, Jr."));
        assert!(rendered.contains("... 1 more rows not shown"));
        assert!(rendered.ends_with("(2 rows)\n"));
    }

    #[test]
    fn test_export_to_csv() {
        let result = sample();
        let csv = ResultsGrid::new(&result).export("csv").unwrap();
        assert_eq!(csv, "id,name,marks\n1,Ann,92.5\n22,\"Bo, Jr.\",\n");
    }

    #[test]
    fn test_export_to_json() {
        let result = sample();
        let json = ResultsGrid::new(&result).export("JSON").unwrap();
        assert_eq!(
            json,
            r#"{"columns":["id","name","marks"],"rows":[[1,"Ann",92.5],[22,"Bo, Jr.",null]]}"#
        );
    }

    #[test]
    fn test_export_to_json_keeps_repeated_columns() {
        let result = QueryResult::new(
            vec![
                "id".to_string(),
                "name".to_string(),
                "id".to_string(),
                "subject".to_string(),
            ],
            vec![vec![
                CellValue::Integer(1),
                CellValue::from("Ann"),
                CellValue::Integer(7),
                CellValue::from("math"),
            ]],
        )
        .unwrap();
        let json = ResultsGrid::new(&result).export("json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["columns"], serde_json::json!(["id", "name", "id", "subject"]));
        assert_eq!(parsed["rows"][0], serde_json::json!([1, "Ann", 7, "math"]));
    }

    #[test]
    fn test_export_to_markdown() {
        let result = sample();
        let markdown = ResultsGrid::new(&result).export("markdown").unwrap();
        let expected = "| id | name | marks |\n| --- | --- | --- |\n| 1 | Ann | 92.5 |\n| 22 | Bo, Jr. | NULL |\n";
        assert_eq!(markdown, expected);
    }

    #[test]
    fn test_export_unsupported_format() {
        let result = sample();
        match ResultsGrid::new(&result).export("xml") {
            Err(WhisperError::Export(msg)) => {
                assert!(msg.contains("Unsupported export format"));
                assert!(msg.contains("xml"));
            }
            other => panic!("Expected Export error, got {:?}", other),
        }
    }
}

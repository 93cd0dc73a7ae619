//! Console reporter
//!
//! Prints failing tests, and optionally passing ones, with enough detail to
//! find the failing assertion.

use anyhow::Result;
use std::fmt::Write as _;

use super::style::Palette;
use super::Reporter;
use crate::executor::{Run, Suite, TestCase};
use crate::models::{AssertionError, AssertionRecord, CaseResult, FailureKind, SetResult};

const INDENT: usize = 3;
const HEADER: &str = "==================== Results ====================";

/// Operator row is placed near the vertical middle of the box, capped here
const MAX_OPERATOR_ROW: usize = 10;

pub struct ConsoleReporter {
    show_passed: bool,
    palette: Palette,
}

impl ConsoleReporter {
    pub fn new(show_passed: bool, palette: Palette) -> Self {
        Self {
            show_passed,
            palette,
        }
    }

    /// Render the report for a finished run. Empty when the run passed and
    /// passing tests are hidden.
    pub fn render(&self, run: &Run) -> String {
        let passed = run.summary().map(|s| s.passed).unwrap_or(false);
        if passed && !self.show_passed {
            return String::new();
        }

        let mut out = String::new();
        out.push('\n');
        out.push_str(&self.palette.bold(HEADER));
        out.push('\n');

        for suite in run.suites() {
            self.render_suite(&mut out, suite);
        }
        out
    }

    fn render_suite(&self, out: &mut String, suite: &Suite) {
        match suite.result() {
            SetResult::Passed if !self.show_passed => {}
            SetResult::Passed | SetResult::Failed => {
                out.push('\n');
                out.push_str(&self.palette.bold(suite.name()));
                out.push('\n');
                for test in suite.tests() {
                    match test.result() {
                        CaseResult::Passed if self.show_passed => {
                            out.push_str(&self.passed_test(test, INDENT));
                            out.push('\n');
                        }
                        CaseResult::Failed => out.push_str(&self.failed_test(test, INDENT)),
                        _ => {}
                    }
                }
            }
            SetResult::LoadError => {
                out.push_str(&self.palette.bold_red(suite.name()));
                out.push('\n');
                out.push_str(&pad(INDENT));
                out.push_str("an error occurred while loading this file:\n");
                if let Some(error) = suite.load_error() {
                    out.push_str(&indent_lines(&format!("{error:?}"), INDENT * 3));
                    out.push('\n');
                }
            }
            SetResult::NoTests | SetResult::Untested => {}
        }
    }

    fn passed_test(&self, test: &TestCase, indent: usize) -> String {
        format!("{}{} : {}", pad(indent), self.palette.green("Pass"), test.name())
    }

    fn failed_test(&self, test: &TestCase, indent: usize) -> String {
        let mut out = format!(
            "{}{} : {}\n",
            pad(indent),
            self.palette.bold_red("FAIL"),
            test.name()
        );

        match test.failure() {
            Some(FailureKind::GeneralError | FailureKind::SetupTeardownError) => {
                out.push_str(&self.general_error(test, indent + INDENT));
            }
            Some(FailureKind::AssertionFail) => {
                out.push_str(&self.assertion_failures(test, indent + INDENT));
            }
            Some(FailureKind::AssertionCount) => {
                out.push_str(&self.count_mismatch(test, indent + INDENT));
            }
            None => {}
        }
        out
    }

    fn general_error(&self, test: &TestCase, indent: usize) -> String {
        let Some(general) = test.general_error() else {
            return String::new();
        };
        let what = if general.uncaught {
            self.palette.bold_red("uncaught error")
        } else {
            "error".to_string()
        };
        format!(
            "{}an {} occurred during {}:\n{}\n",
            pad(indent),
            what,
            general.phase,
            indent_lines(&format!("{:?}", general.error), indent + INDENT)
        )
    }

    fn assertion_failures(&self, test: &TestCase, indent: usize) -> String {
        test.assertions()
            .iter()
            .filter_map(|record| {
                record
                    .error
                    .as_ref()
                    .map(|error| self.assertion_failure(record, error, indent))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn assertion_failure(&self, record: &AssertionRecord, error: &AssertionError, indent: usize) -> String {
        let mut out = format!("{}AssertionError at {}", pad(indent), self.location(record));
        if error.message.is_empty() {
            out.push_str("\n\n");
        } else {
            let _ = write!(out, ": {}\n\n", error.message);
        }

        if let (Some(operator), Some(actual), Some(expected)) =
            (&error.operator, &error.actual, &error.expected)
        {
            out.push_str(&self.side_by_side(operator, actual, expected, indent + INDENT));
        }
        out
    }

    fn location(&self, record: &AssertionRecord) -> String {
        match (record.location.file(), record.location.line()) {
            (Some(file), Some(line)) => format!("{} line {}", file, self.palette.bold(&line.to_string())),
            _ => record.location.to_string(),
        }
    }

    /// Actual and expected as text boxes with the operator between them
    fn side_by_side(&self, operator: &str, actual: &str, expected: &str, indent: usize) -> String {
        let actual = TextBox::new(actual);
        let expected = TextBox::new(expected);
        let height = actual.rows().max(expected.rows());
        let operator_row = ((height as f64 / 2.1).floor() as usize).min(MAX_OPERATOR_ROW);
        let operator = format!("   {operator}   ");

        let mut out = String::new();
        for row in 0..height {
            out.push_str(&pad(indent));
            out.push_str(&actual.row(row));
            if row == operator_row {
                out.push_str(&self.palette.bold(&operator));
            } else {
                out.push_str(&pad(operator.chars().count()));
            }
            out.push_str(&expected.row(row));
            out.push('\n');
        }
        out
    }

    fn count_mismatch(&self, test: &TestCase, indent: usize) -> String {
        let found = test.assertions();
        let expected = test
            .expected_assertions()
            .map(|n| n.to_string())
            .unwrap_or_default();

        let mut out = format!(
            "{}expected {} assertions, found {}:\n",
            pad(indent),
            self.palette.bold(&expected),
            self.palette.bold(&found.len().to_string())
        );
        for record in found {
            let _ = writeln!(out, "{}{}", pad(indent + INDENT), self.location(record));
        }
        out
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "Console"
    }

    fn report(&self, run: &Run) -> Result<()> {
        let output = self.render(run);
        if !output.is_empty() {
            println!("{output}");
        }
        Ok(())
    }
}

/// Multi-line text padded to a rectangle
struct TextBox {
    lines: Vec<String>,
    cols: usize,
}

impl TextBox {
    fn new(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        Self { lines, cols }
    }

    fn rows(&self) -> usize {
        self.lines.len()
    }

    fn row(&self, index: usize) -> String {
        match self.lines.get(index) {
            Some(line) => format!("{line}{}", pad(self.cols - line.chars().count())),
            None => pad(self.cols),
        }
    }
}

fn pad(width: usize) -> String {
    " ".repeat(width)
}

fn indent_lines(text: &str, indent: usize) -> String {
    text.lines()
        .map(|line| format!("{}{}", pad(indent), line))
        .collect::<Vec<_>>()
        .join("\n")
}

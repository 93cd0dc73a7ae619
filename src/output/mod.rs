//! Output reporting module
//!
//! Reporters render a finished run for people (console) or tools (JUnit XML).

mod console;
mod junit;
mod style;

use anyhow::{bail, Result};
use std::path::PathBuf;

pub use console::ConsoleReporter;
pub use junit::{escape, JunitReporter};
pub use style::Palette;

use crate::executor::Run;
use crate::models::SetSummary;

/// Renders a finished run
pub trait Reporter {
    fn name(&self) -> &'static str;
    fn report(&self, run: &Run) -> Result<()>;
}

/// Reporter selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReporterKind {
    Console,
    Junit,
}

impl ReporterKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" => Some(ReporterKind::Console),
            "junit" => Some(ReporterKind::Junit),
            _ => None,
        }
    }
}

/// Options shared by all reporters
#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub show_passed: bool,
    pub palette: Palette,
    pub junit_output: PathBuf,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            show_passed: false,
            palette: Palette::default(),
            junit_output: PathBuf::from("testlog.xml"),
        }
    }
}

pub fn build_reporter(kind: ReporterKind, options: &ReportOptions) -> Box<dyn Reporter> {
    match kind {
        ReporterKind::Console => Box::new(ConsoleReporter::new(options.show_passed, options.palette)),
        ReporterKind::Junit => Box::new(JunitReporter::new(options.junit_output.clone())),
    }
}

/// Build reporters from their names, failing on the first unknown one
pub fn build_reporters(names: &[String], options: &ReportOptions) -> Result<Vec<Box<dyn Reporter>>> {
    let mut reporters = Vec::with_capacity(names.len());
    for name in names {
        match ReporterKind::from_str(name) {
            Some(kind) => reporters.push(build_reporter(kind, options)),
            None => bail!("Unknown reporter: {}. Use 'console' or 'junit'", name),
        }
    }
    Ok(reporters)
}

/// One-line verdict printed after every run
pub fn status_line(summary: &SetSummary, palette: &Palette) -> String {
    if summary.passed {
        palette.green(&format!(
            "All tests PASSED ({} tests, {} assertions)",
            summary.tests.total, summary.assertions.total
        ))
    } else if summary.aborted {
        palette.bold_red("FAILED : aborted run after setup/teardown failure")
    } else {
        palette.bold_red(&format!(
            "FAILED ({} of {} tests)",
            summary.unsuccessful(),
            summary.tests.total
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssertionCounts, TestCounts};

    #[test]
    fn test_reporter_kind_from_str() {
        assert_eq!(ReporterKind::from_str("console"), Some(ReporterKind::Console));
        assert_eq!(ReporterKind::from_str("JUnit"), Some(ReporterKind::Junit));
        assert_eq!(ReporterKind::from_str("tap"), None);
    }

    #[test]
    fn test_build_reporters() {
        let names = vec!["console".to_string(), "junit".to_string()];
        let reporters = build_reporters(&names, &ReportOptions::default()).unwrap();
        let built: Vec<_> = reporters.iter().map(|r| r.name()).collect();
        assert_eq!(built, ["Console", "JUnit"]);

        let err = build_reporters(&["tap".to_string()], &ReportOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("tap"));
    }

    #[test]
    fn test_status_line() {
        let palette = Palette::plain();
        let mut summary = SetSummary {
            tests: TestCounts {
                total: 4,
                ..Default::default()
            },
            assertions: AssertionCounts {
                total: 9,
                failed: 0,
            },
            ..SetSummary::for_run()
        };
        assert_eq!(status_line(&summary, &palette), "All tests PASSED (4 tests, 9 assertions)");

        summary.passed = false;
        summary.tests.failed = 1;
        summary.tests.errored = 1;
        assert_eq!(status_line(&summary, &palette), "FAILED (2 of 4 tests)");

        summary.aborted = true;
        assert_eq!(
            status_line(&summary, &palette),
            "FAILED : aborted run after setup/teardown failure"
        );
    }
}

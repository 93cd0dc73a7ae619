//! JUnit reporter
//!
//! Writes the run as a JUnit XML document for CI servers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Reporter;
use crate::executor::{Run, Suite, TestCase};
use crate::models::{CaseResult, SetResult};

pub struct JunitReporter {
    output: PathBuf,
    timestamp: DateTime<Utc>,
}

impl JunitReporter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            timestamp: Utc::now(),
        }
    }

    /// Fix the timestamp stamped on every suite
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn render(&self, run: &Run) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<testsuites>\n");
        for suite in run.suites() {
            self.render_suite(&mut xml, suite);
        }
        xml.push_str("</testsuites>\n");
        xml
    }

    fn render_suite(&self, xml: &mut String, suite: &Suite) {
        if suite.result() == SetResult::Untested {
            return;
        }
        let Some(summary) = suite.summary() else {
            return;
        };

        let _ = writeln!(
            xml,
            "    <testsuite name=\"{}\" errors=\"{}\" failures=\"{}\" skipped=\"{}\" tests=\"{}\" time=\"{:.3}\" timestamp=\"{}\">",
            escape(suite.name()),
            summary.tests.errored,
            summary.tests.failed,
            summary.tests.skipped,
            summary.tests.total,
            suite.duration().as_secs_f64(),
            self.timestamp.format("%Y-%m-%dT%H:%M:%S")
        );

        for test in suite.tests() {
            render_case(xml, test);
        }
        if let Some(error) = suite.load_error() {
            let _ = writeln!(xml, "        <system-err>{}</system-err>", escape(&format!("{error:#}")));
        }

        xml.push_str("    </testsuite>\n");
    }
}

fn render_case(xml: &mut String, test: &TestCase) {
    if test.result() == CaseResult::Untested {
        return;
    }

    let _ = writeln!(
        xml,
        "        <testcase name=\"{}\" time=\"{:.3}\">",
        escape(test.name()),
        test.duration().as_secs_f64()
    );

    for record in test.assertions() {
        if let Some(error) = &record.error {
            let message = format!("{}: {}", record.location, error);
            let _ = writeln!(xml, "            <failure message=\"{}\" />", escape(&message));
        }
    }
    if let Some(general) = test.general_error() {
        let message = format!("{} (during {})", general, general.phase);
        let _ = writeln!(xml, "            <failure message=\"{}\" />", escape(&message));
    }
    if test.result() == CaseResult::Skipped {
        xml.push_str("            <skipped />\n");
    }

    xml.push_str("        </testcase>\n");
}

/// Escape text for use inside a double-quoted XML attribute
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Reporter for JunitReporter {
    fn name(&self) -> &'static str {
        "JUnit"
    }

    fn report(&self, run: &Run) -> Result<()> {
        let path = if self.output.is_absolute() {
            self.output.clone()
        } else {
            env::current_dir()
                .context("Failed to resolve working directory")?
                .join(&self.output)
        };

        fs::write(&path, self.render(run))
            .with_context(|| format!("failed to write to file \"{}\"", path.display()))?;

        debug!("JUnit report written to {}", path.display());
        println!("\nwrote JUnit output to {}", path.display());
        Ok(())
    }
}

//! Assertion records
//!
//! One record per assertion call, owned by the ledger that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Where an assertion was made
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    Resolved { file: String, line: u32 },
    /// Frame text that could not be parsed into a file and line
    Raw(String),
}

impl CallSite {
    /// Capture the call site of the nearest caller not marked `#[track_caller]`.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        Self::parse(&format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ))
    }

    /// Parse a `path/to/file.rs:line:column` frame, optionally wrapped as
    /// `at symbol (path:line:column)`. Keeps the raw text when it does not fit.
    pub fn parse(frame: &str) -> Self {
        let trimmed = frame.trim().trim_end_matches(')');
        let mut parts = trimmed.rsplitn(3, ':');

        if let (Some(column), Some(line), Some(path)) = (parts.next(), parts.next(), parts.next())
        {
            if let (Ok(_), Ok(line)) = (column.parse::<u32>(), line.parse::<u32>()) {
                let file = path
                    .rsplit(|c: char| c == '/' || c == '\\' || c == '(' || c.is_whitespace())
                    .next()
                    .unwrap_or(path);
                if !file.is_empty() {
                    return CallSite::Resolved {
                        file: file.to_string(),
                        line,
                    };
                }
            }
        }

        CallSite::Raw(frame.to_string())
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            CallSite::Resolved { file, .. } => Some(file),
            CallSite::Raw(_) => None,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            CallSite::Resolved { line, .. } => Some(*line),
            CallSite::Raw(_) => None,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSite::Resolved { file, line } => write!(f, "{file} line {line}"),
            CallSite::Raw(frame) => write!(f, "{frame}"),
        }
    }
}

/// Which assertion method produced a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Ok,
    Fail,
    Equal,
    NotEqual,
    StrictEqual,
    NotStrictEqual,
    DeepEqual,
    NotDeepEqual,
    Throws,
    DoesNotThrow,
    IfError,
    Rejects,
}

impl AssertionKind {
    /// Operator shown between actual and expected values
    pub fn operator(&self) -> &'static str {
        match self {
            AssertionKind::Ok => "==",
            AssertionKind::Fail => "fail",
            AssertionKind::Equal => "==",
            AssertionKind::NotEqual => "!=",
            AssertionKind::StrictEqual => "===",
            AssertionKind::NotStrictEqual => "!==",
            AssertionKind::DeepEqual => "deepEqual",
            AssertionKind::NotDeepEqual => "notDeepEqual",
            AssertionKind::Throws => "throws",
            AssertionKind::DoesNotThrow => "doesNotThrow",
            AssertionKind::IfError => "ifError",
            AssertionKind::Rejects => "rejects",
        }
    }
}

/// A failed assertion
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
    pub operator: Option<String>,
    pub actual: Option<String>,
    pub expected: Option<String>,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            operator: None,
            actual: None,
            expected: None,
        }
    }

    /// Failure of a binary comparison; the message defaults to `actual op expected`.
    pub fn comparison<A, B>(operator: &str, actual: &A, expected: &B) -> Self
    where
        A: fmt::Debug + ?Sized,
        B: fmt::Debug + ?Sized,
    {
        let actual = format!("{actual:?}");
        let expected = format!("{expected:?}");
        Self {
            message: format!("{actual} {operator} {expected}"),
            operator: Some(operator.to_string()),
            actual: Some(actual),
            expected: Some(expected),
        }
    }

    /// Failure caused by an error value (a rejected operand or validator fault)
    pub fn from_fault(fault: &anyhow::Error) -> Self {
        Self::new(format!("{fault:#}"))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Outcome of the user validator attached to a `rejects` assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    Accepted,
    Rejected(String),
}

/// One assertion call and its settled outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub location: CallSite,
    pub kind: AssertionKind,
    pub error: Option<AssertionError>,
    pub validation: Option<Validation>,
}

impl AssertionRecord {
    pub fn new(location: CallSite, kind: AssertionKind, error: Option<AssertionError>) -> Self {
        Self {
            location,
            kind,
            error,
            validation: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_frame() {
        let site = CallSite::parse("src/ledger/mod.rs:42:9");
        assert_eq!(
            site,
            CallSite::Resolved {
                file: "mod.rs".to_string(),
                line: 42
            }
        );
    }

    #[test]
    fn test_parse_wrapped_frame() {
        let site = CallSite::parse("    at check (/home/ci/tests/math_test.rs:7:13)");
        assert_eq!(site.file(), Some("math_test.rs"));
        assert_eq!(site.line(), Some(7));
    }

    #[test]
    fn test_parse_windows_frame() {
        let site = CallSite::parse(r"C:\work\suite\io_test.rs:118:5");
        assert_eq!(site.file(), Some("io_test.rs"));
        assert_eq!(site.line(), Some(118));
    }

    #[test]
    fn test_unparseable_frame_kept_raw() {
        let site = CallSite::parse("<anonymous>");
        assert_eq!(site, CallSite::Raw("<anonymous>".to_string()));
        assert_eq!(site.file(), None);
        assert_eq!(site.to_string(), "<anonymous>");

        assert!(matches!(CallSite::parse("file.rs:x:1"), CallSite::Raw(_)));
    }

    #[test]
    fn test_caller_points_here() {
        let here = line!() + 1;
        let site = CallSite::caller();
        assert_eq!(site.file(), Some("assertion.rs"));
        assert_eq!(site.line(), Some(here));
    }

    #[test]
    fn test_comparison_message() {
        let err = AssertionError::comparison("!=!", &1, &2);
        assert_eq!(err.to_string(), "1 !=! 2");
        assert_eq!(err.actual.as_deref(), Some("1"));
        assert_eq!(err.expected.as_deref(), Some("2"));

        let err = err.with_message("your message");
        assert_eq!(err.to_string(), "your message");
        assert_eq!(err.operator.as_deref(), Some("!=!"));
    }
}

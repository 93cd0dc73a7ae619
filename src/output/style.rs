//! Terminal styling
//!
//! ANSI color codes for console output, switched off for plain output.

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const GREY: &str = "\x1b[90m";

/// Wraps text in ANSI codes when enabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    colorize: bool,
}

impl Palette {
    pub fn new(colorize: bool) -> Self {
        Self { colorize }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.colorize
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.colorize {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    pub fn grey(&self, text: &str) -> String {
        self.paint(GREY, text)
    }

    pub fn bold_red(&self, text: &str) -> String {
        self.paint(&format!("{BOLD}{RED}"), text)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(true)
    }
}

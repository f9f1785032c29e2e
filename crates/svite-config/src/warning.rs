//! Compiler diagnostics and the handler they are forwarded to.
//!
//! The compiler reports warnings and errors in the same shape. Both are handed
//! to a [`WarningHandler`]; when the caller does not configure one, the
//! resolver installs [`LogWarningHandler`], which reports through `tracing`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::options::LogLevel;

/// Code the compiler uses for selectors that match nothing in the template.
pub const CSS_UNUSED_SELECTOR: &str = "css-unused-selector";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A warning or error reported by the compiler or a preprocessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Location>,
    /// Source excerpt with `line: text` prefixes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

impl CompilerDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, filename: impl Into<String>, start: Location) -> Self {
        self.filename = Some(filename.into());
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: Location) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// The text between `start` and `end` on the start line of the frame.
    pub fn offender(&self) -> Option<&str> {
        extract_offender(self.frame.as_deref()?, self.start?, self.end)
    }
}

impl fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.filename, self.start) {
            (Some(filename), Some(start)) => write!(
                f,
                "{}({}:{}) {}",
                filename, start.line, start.column, self.message
            ),
            _ => f.write_str(&self.message),
        }
    }
}

fn extract_offender(frame: &str, start: Location, end: Option<Location>) -> Option<&str> {
    let (line, offset) = frame.lines().find_map(|line| {
        let colon = line.find(": ")?;
        let number = line[..colon].trim().parse::<usize>().ok()?;
        (number == start.line).then_some((line, colon + 2))
    })?;
    let from = offset + start.column;
    let to = match end {
        Some(end) if end.line == start.line => offset + end.column,
        _ => line.len(),
    };
    if to <= from {
        return None;
    }
    line.get(from..to.min(line.len()))
}

/// Receives warnings and errors produced while compiling modules.
pub trait WarningHandler: Send + Sync + fmt::Debug {
    fn warn(&self, diagnostic: &CompilerDiagnostic);

    fn error(&self, diagnostic: &CompilerDiagnostic) {
        tracing::error!(target: "svite", "{}", diagnostic);
    }
}

pub type SharedWarningHandler = Arc<dyn WarningHandler>;

/// Default handler, reporting through `tracing` at the session's log level.
///
/// During development unused-selector warnings are dropped and everything
/// else is a warning. In production builds warnings are escalated to errors,
/// except unused selectors, which stay warnings and show the offending
/// selector instead of the frame.
#[derive(Debug, Clone, Copy)]
pub struct LogWarningHandler {
    level: LogLevel,
    production: bool,
}

impl LogWarningHandler {
    pub fn new(level: LogLevel, production: bool) -> Self {
        Self { level, production }
    }

    /// The level and message a warning is reported with, if it is reported.
    pub fn render(&self, diagnostic: &CompilerDiagnostic) -> Option<(Level, String)> {
        let unused_selector = diagnostic.is_code(CSS_UNUSED_SELECTOR);
        if !self.production && unused_selector {
            return None;
        }

        let (level, message) = if self.production && unused_selector {
            let message = match diagnostic.offender() {
                Some(offender) if !offender.is_empty() => format!("{}: {}", diagnostic, offender),
                _ => diagnostic.to_string(),
            };
            (Level::WARN, message)
        } else {
            let level = if self.production { Level::ERROR } else { Level::WARN };
            (level, with_frame(diagnostic))
        };

        self.level.enabled(level).then_some((level, message))
    }
}

fn with_frame(diagnostic: &CompilerDiagnostic) -> String {
    match &diagnostic.frame {
        Some(frame) => format!("{}\n{}", diagnostic, frame),
        None => diagnostic.to_string(),
    }
}

impl WarningHandler for LogWarningHandler {
    fn warn(&self, diagnostic: &CompilerDiagnostic) {
        if let Some((level, message)) = self.render(diagnostic) {
            if level == Level::ERROR {
                tracing::error!(target: "svite", "{}", message);
            } else {
                tracing::warn!(target: "svite", "{}", message);
            }
        }
    }

    fn error(&self, diagnostic: &CompilerDiagnostic) {
        if self.level.enabled(Level::ERROR) {
            tracing::error!(target: "svite", "{}", with_frame(diagnostic));
        }
    }
}

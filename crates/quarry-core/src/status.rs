//! Hierarchical outcome records.

use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warning,
    Error,
    Cancel,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Cancel => "CANCEL",
        };
        f.write_str(label)
    }
}

/// Machine-readable reason attached to a status node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    NotFound,
    Transfer,
    MirrorRetry,
    Cancelled,
}

/// Outcome of an operation, with the outcomes that led to it as children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub severity: Severity,
    pub message: String,
    pub code: Option<StatusCode>,
    pub cause: Option<String>,
    pub children: Vec<Status>,
}

impl Status {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            code: None,
            cause: None,
            children: Vec::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Severity::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn cancel(message: impl Into<String>) -> Self {
        Self::new(Severity::Cancel, message).with_code(StatusCode::Cancelled)
    }

    pub fn with_code(mut self, code: StatusCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<Status>) -> Self {
        self.children = children;
        self
    }

    /// Ok or Warning: the operation achieved its goal.
    pub fn is_success(&self) -> bool {
        matches!(self.severity, Severity::Ok | Severity::Warning)
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    pub fn is_cancelled(&self) -> bool {
        self.severity == Severity::Cancel
    }

    /// Number of children with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.children
            .iter()
            .filter(|child| child.severity == severity)
            .count()
    }

    /// Logs the tree at the level matching its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Ok => info!("{}", self),
            Severity::Warning | Severity::Cancel => warn!("{}", self),
            Severity::Error => error!("{}", self),
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(f, "{indent}[{}] {}", self.severity, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        for child in &self.children {
            writeln!(f)?;
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

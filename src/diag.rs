//! Diagnostics are plain values, accumulated in flat lists and merged across
//! phases. Every fallible operation in the core returns its result alongside
//! a [`Diagnostics`] so that callers can keep analysing a broken
//! configuration instead of stopping at the first problem.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A location hint for a diagnostic. The underlying HCL library does not
/// expose byte ranges, so the subject carries the source file (when known)
/// and a short rendered snippet of the offending construct instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub file: Option<PathBuf>,
    pub snippet: String,
}

impl Subject {
    pub fn new(snippet: impl Into<String>) -> Self {
        Subject {
            file: None,
            snippet: snippet.into(),
        }
    }

    pub fn in_file(file: impl Into<PathBuf>, snippet: impl Into<String>) -> Self {
        Subject {
            file: Some(file.into()),
            snippet: snippet.into(),
        }
    }

    /// Renders an expression as a subject snippet, truncated so that a huge
    /// expression does not flood the terminal.
    pub fn for_expr(expr: &hcl::Expression) -> Self {
        let mut snippet = expr.to_string();
        if snippet.len() > 80 {
            snippet.truncate(77);
            snippet.push_str("...");
        }
        Subject::new(snippet)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}", file.display(), self.snippet),
            None => write!(f, "{}", self.snippet),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub subject: Option<Subject>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_expr(self, expr: &hcl::Expression) -> Self {
        self.with_subject(Subject::for_expr(expr))
    }

    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        let file = file.as_ref().to_path_buf();
        match &mut self.subject {
            Some(subject) => subject.file = Some(file),
            None => {
                self.subject = Some(Subject {
                    file: Some(file),
                    snippet: String::new(),
                })
            }
        }
        self
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics(Vec::new())
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Diagnostics(vec![diag])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Diagnostics(iter.into_iter().collect())
    }
}

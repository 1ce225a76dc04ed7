//! Diagnostics collected over a single compilation.
//!
//! Every stage appends to the same [`ErrorManager`]. Errors are never
//! deduplicated and are reported in discovery order.

use itertools::Itertools;
use strum::Display;
use thiserror::Error;

/// Printed by [`ErrorManager::report`] when nothing was recorded
pub const NO_ERRORS_SENTINEL: &str = "No se encontraron errores.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    Lexical,
    Syntactic,
    Semantic,
}

/// A single categorized diagnostic. The `Display` form is the line used in
/// the diagnostics report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error(linea {line}, columna {column}) \"{details}\"")]
pub struct CompilationError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub details: String,
}

impl CompilationError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        line: usize,
        column: usize,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            column,
            details: details.into(),
        }
    }

    pub fn lexical(line: usize, column: usize, message: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lexical, message, line, column, details)
    }

    pub fn syntactic(
        line: usize,
        column: usize,
        message: &str,
        details: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::Syntactic, message, line, column, details)
    }

    pub fn semantic(line: usize, column: usize, message: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Semantic, message, line, column, details)
    }
}

/// Append-only collector of diagnostics for one compilation
#[derive(Debug, Default)]
pub struct ErrorManager {
    errors: Vec<CompilationError>,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything recorded so far. Called at the start of every
    /// compilation.
    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn add(&mut self, error: CompilationError) {
        log::debug!("{} error recorded: {error}", error.kind);
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[CompilationError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_errors_of(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &CompilationError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub fn into_errors(self) -> Vec<CompilationError> {
        self.errors
    }

    /// One `Error(linea ..., columna ...) "..."` line per error, or the
    /// sentinel when nothing was recorded.
    pub fn report(&self) -> String {
        render_report(&self.errors)
    }
}

pub fn render_report<'a>(errors: impl IntoIterator<Item = &'a CompilationError>) -> String {
    let report = errors.into_iter().join("\n");

    if report.is_empty() {
        NO_ERRORS_SENTINEL.to_owned()
    } else {
        report
    }
}

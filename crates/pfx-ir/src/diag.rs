//! Accumulated analysis diagnostics.
//!
//! Recoverable findings are collected here rather than raised: the analyzer
//! keeps going past an error with a placeholder type so later problems in
//! the same file still surface. Only malformed-tree conditions abort a
//! compile through `Result`.

use std::fmt;

use crate::span::Span;

/// Numeric diagnostic codes. The 22xx range covers semantic analysis.
pub mod code {
    pub const UNKNOWN_TYPE: u32 = 2201;
    pub const UNKNOWN_VARIABLE: u32 = 2202;
    pub const UNKNOWN_FUNCTION: u32 = 2203;
    pub const REDEFINITION: u32 = 2204;
    pub const SHADOWED_NAME: u32 = 2205;
    pub const INVALID_BINARY_OPERANDS: u32 = 2206;
    pub const INVALID_UNARY_OPERAND: u32 = 2207;
    pub const NON_BOOL_CONDITION: u32 = 2208;
    pub const MISSING_RETURN: u32 = 2209;
    pub const RETURN_TYPE_MISMATCH: u32 = 2210;
    pub const NOT_WRITABLE: u32 = 2211;
    pub const NOT_READABLE: u32 = 2212;
    pub const UNKNOWN_FIELD: u32 = 2213;
    pub const INVALID_INDEX: u32 = 2214;
    pub const INVALID_CONSTRUCTOR: u32 = 2215;
    pub const VOID_VALUE: u32 = 2216;
    pub const AUTO_UNRESOLVED: u32 = 2217;
    pub const ARRAY_LENGTH_NOT_CONST: u32 = 2218;
    pub const RECURSIVE_FUNCTION: u32 = 2219;
    pub const BLACKLISTED_CALL: u32 = 2220;
    pub const VERTEX_STAGE_MISMATCH: u32 = 2221;
    pub const PIXEL_STAGE_MISMATCH: u32 = 2222;
    pub const ENTRY_NOT_COMPILABLE: u32 = 2223;
    pub const INVALID_QUALIFIER: u32 = 2224;
    pub const INVALID_INITIALIZER: u32 = 2225;
    pub const UNKNOWN_ATTRIBUTE: u32 = 2226;
}

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One finding: numeric code, severity, optional source range, rendered
/// message.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub code: u32,
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// The ordered collection of diagnostics for one compile.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticReport {
    pub file: Option<String>,
    diagnostics: Vec<Diagnostic>,
    errors: usize,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn error(&mut self, code: u32, span: impl Into<Option<Span>>, message: impl Into<String>) {
        self.errors += 1;
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Error,
            span: span.into(),
            message: message.into(),
        });
    }

    /// Records a warning.
    pub fn warning(
        &mut self,
        code: u32,
        span: impl Into<Option<Span>>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Warning,
            span: span.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Diagnostics carrying a given code, for targeted assertions.
    pub fn with_code(&self, code: u32) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    /// Orders the report by source position; unspanned entries sort first.
    pub fn sort_by_position(&mut self) {
        self.diagnostics
            .sort_by_key(|d| d.span.map_or(0, |s| s.start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_errors_not_warnings() {
        let mut report = DiagnosticReport::new();
        report.warning(code::SHADOWED_NAME, None, "x shadows an outer x");
        assert!(!report.has_errors());
        report.error(code::UNKNOWN_TYPE, Span::new(3, 8), "unknown type 'flaot'");
        assert!(report.has_errors());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn sort_orders_by_span_start() {
        let mut report = DiagnosticReport::new();
        report.error(code::UNKNOWN_VARIABLE, Span::new(40, 41), "later");
        report.error(code::UNKNOWN_VARIABLE, Span::new(10, 11), "earlier");
        report.sort_by_position();
        let spans: Vec<_> = report.iter().map(|d| d.span.unwrap().start).collect();
        assert_eq!(spans, vec![10, 40]);
    }

    #[test]
    fn with_code_filters() {
        let mut report = DiagnosticReport::new();
        report.error(code::RECURSIVE_FUNCTION, None, "f calls itself");
        report.error(code::UNKNOWN_TYPE, None, "unknown");
        assert_eq!(report.with_code(code::RECURSIVE_FUNCTION).count(), 1);
    }
}

//! Parse-error reporting collaborator.
//!
//! Rule materialization never aborts a batch on one bad line: the offending
//! line is handed to a reporter together with its file and line context, and
//! processing continues. The reporter is a passed capability rather than
//! ambient state so tests can capture diagnostics instead of printing them.

/// Receives one diagnostic per skipped rule line.
pub trait ParseErrorReport {
    /// Report a malformed line: source file name, line number, the raw line
    /// text and a parse-error detail.
    fn parse_error(&mut self, file: &str, line: u32, text: &str, detail: &str);
}

/// Default reporter: renders through `tracing::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReport;

impl ParseErrorReport for TracingReport {
    fn parse_error(&mut self, file: &str, line: u32, text: &str, detail: &str) {
        tracing::warn!("Invalid line in {}({}): {:?}\n    {}", file, line, text, detail);
    }
}

/// Test reporter: accumulates diagnostics for inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectedReport {
    /// Collected (file, line, text, detail) tuples
    pub entries: Vec<(String, u32, String, String)>,
}

impl CollectedReport {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParseErrorReport for CollectedReport {
    fn parse_error(&mut self, file: &str, line: u32, text: &str, detail: &str) {
        self.entries
            .push((file.to_string(), line, text.to_string(), detail.to_string()));
    }
}

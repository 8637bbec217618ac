//! Toolchain failures and the diagnostics parsed out of them.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::bridge::BRIDGE_FILE_NAME;

/// A failed `go build`.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,

    /// Combined stdout and stderr of the toolchain.
    pub output: String,

    /// Located diagnostics found in `output`.
    pub diagnostics: Vec<Diagnostic>,
}

/// One `file:line:col: message` line of toolchain output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File as printed by the toolchain, relative to the build directory.
    pub file: String,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,

    pub message: String,

    /// Whether the location is inside the synthesized bridge file.
    pub generated: bool,
}

fn diagnostic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<file>[^\s:][^:]*\.go):(?P<line>\d+):(?P<col>\d+): (?P<msg>.*)$")
            .unwrap_or_else(|e| unreachable!("diagnostic pattern is valid: {e}"))
    })
}

impl CompileError {
    /// Build an error from the toolchain's exit code and output.
    pub fn new(status: Option<i32>, output: impl Into<String>) -> Self {
        let output = output.into();
        let diagnostics = parse_diagnostics(&output);
        Self {
            status,
            output,
            diagnostics,
        }
    }

    /// Format the error for terminal display.
    pub fn format_terminal(&self) -> String {
        if self.diagnostics.is_empty() {
            return format!("\x1b[1;31merror\x1b[0m: {}\n", self.summary());
        }

        let mut output = String::new();
        for diag in &self.diagnostics {
            output.push_str(&format!("\x1b[1;31merror\x1b[0m: {}\n", diag.message));
            output.push_str(&format!(
                "  \x1b[1;34m-->\x1b[0m {}:{}:{}",
                diag.file, diag.line, diag.column
            ));
            if diag.generated {
                output.push_str(" \x1b[2m(generated bridge)\x1b[0m");
            }
            output.push('\n');
        }
        output
    }

    /// Format the error for JSON output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "output": self.output,
            "diagnostics": self.diagnostics.iter().map(|d| {
                serde_json::json!({
                    "file": d.file,
                    "line": d.line,
                    "column": d.column,
                    "message": d.message,
                    "generated": d.generated,
                })
            }).collect::<Vec<_>>(),
        })
    }

    fn summary(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let output = self.output.trim();
        if output.is_empty() {
            format!("go build failed ({})", status)
        } else {
            format!("go build failed ({}):\n{}", status, output)
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for CompileError {}

/// Extract located diagnostics from toolchain output.
///
/// Package headers (`# command-line-arguments`) and continuation lines are
/// skipped.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let caps = diagnostic_pattern().captures(line.trim_end())?;
            let file = caps["file"].to_string();
            let generated = file
                .rsplit(['/', '\\'])
                .next()
                .is_some_and(|name| name == BRIDGE_FILE_NAME);

            Some(Diagnostic {
                line: caps["line"].parse().ok()?,
                column: caps["col"].parse().ok()?,
                message: caps["msg"].to_string(),
                generated,
                file,
            })
        })
        .collect()
}

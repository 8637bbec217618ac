//! Handler resolution through an external analysis program.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{HandlerResolver, Resolution};
use crate::error::{Error, Result};

/// Runs `program [args...] <source>` and reads the handler name from stdout.
///
/// One non-empty line is the handler; no output means the file exports
/// nothing; several lines are competing names.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandResolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments passed before the source path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl HandlerResolver for CommandResolver {
    fn resolve(&self, source: &Path) -> Result<Resolution> {
        tracing::debug!(
            program = %self.program.display(),
            source = %source.display(),
            "running handler resolver"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .output()
            .map_err(|e| {
                Error::HandlerResolution(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(Error::HandlerResolution(format!(
                "{} exited with {} for {}: {}",
                self.program.display(),
                output.status,
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let names = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Resolution::from_names(names))
    }
}

//! Bridge entry file generation.
//!
//! A candidate declares a handler function but no `main`. The bridge file is
//! written next to it and supplies a `main` that hands the handler to the
//! runtime's entry contract.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Reserved file name of the bridge inside a candidate's directory.
///
/// A source file of the same name in a candidate's directory is silently
/// overwritten by the bridge. Source trees must not use this name.
pub const BRIDGE_FILE_NAME: &str = "main__lambdakit__bridge__.go";

/// Placeholder replaced by the handler name.
pub const HANDLER_PLACEHOLDER: &str = "__LAMBDAKIT_HANDLER_FUNC_NAME";

const DEFAULT_TEMPLATE: &str = "// Code generated by lambdakit. DO NOT EDIT.

package main

import \"github.com/aws/aws-lambda-go/lambda\"

func main() {
\tlambda.Start(__LAMBDAKIT_HANDLER_FUNC_NAME)
}
";

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

/// A written bridge file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Renders the bridge template and writes it beside a candidate.
#[derive(Debug, Clone)]
pub struct BridgeSynthesizer {
    template: String,
}

impl Default for BridgeSynthesizer {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl BridgeSynthesizer {
    /// Synthesizer using the built-in `lambda.Start` template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesizer using a caller-supplied template.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the template lacks the placeholder.
    pub fn with_template(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(HANDLER_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "bridge template must contain {}",
                HANDLER_PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }

    /// Render the template for `handler_name`.
    pub fn render(&self, handler_name: &str) -> String {
        self.template.replace(HANDLER_PLACEHOLDER, handler_name)
    }

    /// Write the bridge for `handler_name` into `target_dir`.
    ///
    /// Writing twice with the same name yields the same file.
    ///
    /// # Errors
    /// Returns [`Error::Synthesis`] if the name is not a Go identifier or the
    /// file cannot be written.
    pub fn synthesize(&self, handler_name: &str, target_dir: &Path) -> Result<BridgeFile> {
        let path = target_dir.join(BRIDGE_FILE_NAME);

        if !is_go_identifier(handler_name) {
            return Err(Error::Synthesis {
                path,
                message: format!("{:?} is not a valid Go identifier", handler_name),
            });
        }

        let contents = self.render(handler_name);
        fs::write(&path, &contents).map_err(|e| Error::Synthesis {
            path: path.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!(handler = %handler_name, path = %path.display(), "wrote bridge file");
        Ok(BridgeFile { path, contents })
    }
}

fn is_go_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && name != "_"
        && !GO_KEYWORDS.contains(&name)
}

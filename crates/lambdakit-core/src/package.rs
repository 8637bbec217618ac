//! Artifact packaging.
//!
//! Turns a candidate's output subtree into a [`Lambda`]: the file listing a
//! bundler needs plus the fixed runtime metadata.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::request::{file_mode, to_logical};

/// Entry point name the runtime invokes.
pub const HANDLER_NAME: &str = "handler";

/// Runtime tag of every artifact.
pub const RUNTIME: &str = "go1.x";

/// A file of the output subtree, referenced in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFsRef {
    pub fs_path: PathBuf,
    pub mode: u32,
}

/// A compiled, deployable lambda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lambda {
    /// Output files keyed by path relative to the output subtree.
    pub files: BTreeMap<String, FileFsRef>,

    pub handler: String,

    pub runtime: String,

    pub environment: BTreeMap<String, String>,

    /// Absolute path of the compiled binary.
    pub binary: PathBuf,
}

/// Package the compiled output of one candidate.
///
/// # Errors
/// Returns [`Error::Packaging`] if the binary is missing or the subtree
/// cannot be listed.
pub fn package(output_subtree: &Path, binary_path: &Path) -> Result<Lambda> {
    if !binary_path.is_file() {
        return Err(Error::Packaging(format!(
            "compiled binary {} not found",
            binary_path.display()
        )));
    }

    let mut files = BTreeMap::new();
    let walker = WalkBuilder::new(output_subtree)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| Error::Packaging(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(output_subtree)
            .map_err(|e| Error::Packaging(format!("{}: {}", entry.path().display(), e)))?;
        let metadata = entry
            .metadata()
            .map_err(|e| Error::Packaging(e.to_string()))?;

        files.insert(
            to_logical(relative),
            FileFsRef {
                fs_path: entry.path().to_path_buf(),
                mode: file_mode(&metadata),
            },
        );
    }

    tracing::debug!(
        subtree = %output_subtree.display(),
        files = files.len(),
        "packaged lambda"
    );

    Ok(Lambda {
        files,
        handler: HANDLER_NAME.to_string(),
        runtime: RUNTIME.to_string(),
        environment: BTreeMap::new(),
        binary: binary_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_package_single_binary() {
        let temp = TempDir::new().unwrap();
        let subtree = temp.path().join("api/cmd/users");
        fs::create_dir_all(&subtree).unwrap();
        let binary = subtree.join("handler");
        fs::write(&binary, b"\x7fELF").unwrap();

        let lambda = package(&subtree, &binary).unwrap();

        assert_eq!(lambda.handler, "handler");
        assert_eq!(lambda.runtime, "go1.x");
        assert!(lambda.environment.is_empty());
        assert_eq!(lambda.binary, binary);
        assert_eq!(lambda.files.keys().collect::<Vec<_>>(), vec!["handler"]);
        assert_eq!(lambda.files["handler"].fs_path, binary);
    }

    #[test]
    fn test_package_lists_nested_files() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("handler");
        fs::write(&binary, "bin").unwrap();
        fs::create_dir_all(temp.path().join("assets")).unwrap();
        fs::write(temp.path().join("assets/.config"), "x").unwrap();

        let lambda = package(temp.path(), &binary).unwrap();
        assert_eq!(
            lambda.files.keys().collect::<Vec<_>>(),
            vec!["assets/.config", "handler"]
        );
    }

    #[test]
    fn test_package_missing_binary() {
        let temp = TempDir::new().unwrap();
        let result = package(temp.path(), &temp.path().join("handler"));
        assert!(matches!(result, Err(Error::Packaging(_))));
    }

    #[test]
    fn test_lambda_serializes() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("handler");
        fs::write(&binary, "bin").unwrap();

        let json = serde_json::to_value(package(temp.path(), &binary).unwrap()).unwrap();
        assert_eq!(json["handler"], "handler");
        assert_eq!(json["runtime"], "go1.x");
        assert!(json["files"]["handler"]["fs_path"].is_string());
    }
}

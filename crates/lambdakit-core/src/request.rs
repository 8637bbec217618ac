//! Build request types: the file set, the entrypoint and the lambda options.
//!
//! Logical paths are `/`-separated and relative to the root of the uploaded
//! source tree, independent of where the files end up on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default directory, beneath the entrypoint's directory, searched for lambdas.
pub const DEFAULT_LAMBDA_BASE_DIR: &str = "cmd";

/// Default file name identifying a lambda source file.
pub const DEFAULT_LAMBDA_FILE_NAME: &str = "lambda.go";

const DEFAULT_FILE_MODE: u32 = 0o644;

/// Where the content of one file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    /// Content held in memory.
    Bytes { data: Vec<u8>, mode: u32 },
    /// Content read from a file on disk at materialization time.
    Fs { path: PathBuf, mode: u32 },
}

impl FileRef {
    /// In-memory content with the default mode.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// Content read from `path` with the default mode.
    pub fn fs(path: impl Into<PathBuf>) -> Self {
        Self::Fs {
            path: path.into(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// Replace the unix mode.
    pub fn with_mode(self, mode: u32) -> Self {
        match self {
            Self::Bytes { data, .. } => Self::Bytes { data, mode },
            Self::Fs { path, .. } => Self::Fs { path, mode },
        }
    }

    /// Unix mode applied when the file is materialized.
    pub fn mode(&self) -> u32 {
        match self {
            Self::Bytes { mode, .. } | Self::Fs { mode, .. } => *mode,
        }
    }
}

/// The set of source files handed to a build, keyed by logical path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: BTreeMap<String, FileRef>,
}

impl FileSet {
    /// Create an empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every regular file beneath `root`.
    ///
    /// Hidden entries (including `.git`) are skipped. Files are referenced,
    /// not read, so large trees stay cheap until materialization.
    pub fn from_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "source directory {} not found",
                root.display()
            )));
        }

        let mut files = Self::new();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(true)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| Error::Discovery(e.to_string()))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|e| {
                Error::Discovery(format!("{}: {}", entry.path().display(), e))
            })?;
            let logical = to_logical(relative);
            let mode = file_mode(&entry.metadata().map_err(|e| Error::Discovery(e.to_string()))?);

            files.insert(logical, FileRef::fs(entry.path()).with_mode(mode));
        }

        Ok(files)
    }

    /// Add or replace a file.
    pub fn insert(&mut self, logical_path: impl Into<String>, file: FileRef) -> &mut Self {
        self.files.insert(logical_path.into(), file);
        self
    }

    /// Builder-style [`FileSet::insert`] for in-memory content.
    pub fn with_file(mut self, logical_path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(logical_path, FileRef::bytes(data));
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileRef)> {
        self.files.iter()
    }
}

/// Options controlling where lambdas are looked for.
///
/// Deserializes from the camelCase keys used in build configs; omitted keys
/// fall back to the defaults and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LambdaConfig {
    /// Directory beneath the entrypoint's directory searched for candidates.
    pub lambda_base_dir: String,

    /// File name (or glob) identifying a candidate lambda source file.
    pub lambda_file_name: String,
}

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            lambda_base_dir: DEFAULT_LAMBDA_BASE_DIR.to_string(),
            lambda_file_name: DEFAULT_LAMBDA_FILE_NAME.to_string(),
        }
    }
}

impl LambdaConfig {
    /// Parse a JSON config object.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("malformed lambda config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot describe a location inside the source tree.
    pub fn validate(&self) -> Result<()> {
        if self.lambda_file_name.trim().is_empty() {
            return Err(Error::Config("lambdaFileName must not be empty".to_string()));
        }
        if self.lambda_file_name.contains('/') {
            return Err(Error::Config(format!(
                "lambdaFileName must be a file name, not a path: {}",
                self.lambda_file_name
            )));
        }
        normalize_logical(&self.lambda_base_dir).map_err(|_| {
            Error::Config(format!(
                "lambdaBaseDir must be a relative directory inside the source tree: {}",
                self.lambda_base_dir
            ))
        })?;
        Ok(())
    }
}

/// Immutable input of a build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub files: FileSet,
    /// Logical path of the entrypoint; its directory anchors lambda discovery.
    pub entrypoint: String,
    pub config: LambdaConfig,
}

impl BuildRequest {
    /// Create a request with the default lambda config.
    pub fn new(files: FileSet, entrypoint: impl Into<String>) -> Self {
        Self {
            files,
            entrypoint: entrypoint.into(),
            config: LambdaConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LambdaConfig) -> Self {
        self.config = config;
        self
    }
}

/// Normalize a logical path: drop `.` and empty segments, resolve `..`.
///
/// Absolute paths and paths escaping the root are rejected.
pub fn normalize_logical(path: &str) -> Result<String> {
    if path.starts_with('/') {
        return Err(Error::Config(format!("absolute path not allowed: {}", path)));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::Config(format!("path escapes the source root: {}", path)));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// Directory part of a logical path (`""` for top-level files).
pub fn logical_dirname(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join logical path segments, skipping empty ones.
pub fn logical_join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a relative filesystem path to a logical path.
pub(crate) fn to_logical(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
pub(crate) fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(crate) fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        DEFAULT_FILE_MODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = LambdaConfig::from_json("{}").unwrap();
        assert_eq!(config.lambda_base_dir, "cmd");
        assert_eq!(config.lambda_file_name, "lambda.go");
    }

    #[test]
    fn test_config_partial_override() {
        let config =
            LambdaConfig::from_json(r#"{"lambdaBaseDir": "functions", "maxLambdaSize": "10mb"}"#)
                .unwrap();
        assert_eq!(config.lambda_base_dir, "functions");
        assert_eq!(config.lambda_file_name, "lambda.go");
    }

    #[test]
    fn test_config_rejects_malformed() {
        assert!(matches!(
            LambdaConfig::from_json(r#"{"lambdaBaseDir": 3}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            LambdaConfig::from_json(r#"{"lambdaBaseDir": "../outside"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            LambdaConfig::from_json(r#"{"lambdaFileName": ""}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_normalize_logical() {
        assert_eq!(normalize_logical("./api//cmd/a/../lambda.go").unwrap(), "api/cmd/lambda.go");
        assert_eq!(normalize_logical(".").unwrap(), "");
        assert!(normalize_logical("/etc/passwd").is_err());
        assert!(normalize_logical("api/../../x").is_err());
    }

    #[test]
    fn test_logical_dirname_and_join() {
        assert_eq!(logical_dirname("api/main.go"), "api");
        assert_eq!(logical_dirname("main.go"), "");
        assert_eq!(logical_join(&["", "cmd", "a/lambda.go"]), "cmd/a/lambda.go");
        assert_eq!(logical_join(&["api", "cmd/", "lambda.go"]), "api/cmd/lambda.go");
    }

    #[test]
    fn test_file_set_from_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("api/cmd")).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join("api/main.go"), "package main").unwrap();
        fs::write(temp.path().join("api/cmd/lambda.go"), "package main").unwrap();
        fs::write(temp.path().join(".git/HEAD"), "ref").unwrap();

        let files = FileSet::from_dir(temp.path()).unwrap();
        let keys: Vec<_> = files.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["api/cmd/lambda.go", "api/main.go"]);
    }

    #[test]
    fn test_file_set_from_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = FileSet::from_dir(&temp.path().join("missing"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

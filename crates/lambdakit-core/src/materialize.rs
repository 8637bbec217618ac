//! Source materialization.
//!
//! Writes the request's file set into the workspace so the toolchain can see
//! it. The returned map is the only record of where each logical path lives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::request::{normalize_logical, FileRef, FileSet};

/// A logical path bound to its location inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub logical_path: String,
    pub fs_path: PathBuf,
    pub mode: u32,
}

/// Write every file of `files` beneath `root`.
///
/// Relative structure is preserved and the result is keyed by normalized
/// logical path. The first failure aborts; files written before it are left
/// in place for the caller to discard with the workspace.
///
/// # Errors
/// - [`Error::Config`] for absolute logical paths or paths escaping `root`
/// - [`Error::Materialize`] if a file cannot be read or written
pub fn materialize(files: &FileSet, root: &Path) -> Result<BTreeMap<String, MaterializedFile>> {
    let mut materialized = BTreeMap::new();

    for (logical_path, file) in files.iter() {
        let normalized = normalize_logical(logical_path)?;
        if normalized.is_empty() {
            return Err(Error::Config(format!("invalid file path: {:?}", logical_path)));
        }

        let fs_path = root.join(&normalized);
        write_file(file, &fs_path).map_err(|e| Error::Materialize {
            path: logical_path.clone(),
            message: e.to_string(),
        })?;

        materialized.insert(
            normalized,
            MaterializedFile {
                logical_path: logical_path.clone(),
                fs_path,
                mode: file.mode(),
            },
        );
    }

    tracing::debug!(count = materialized.len(), root = %root.display(), "materialized files");
    Ok(materialized)
}

fn write_file(file: &FileRef, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match file {
        FileRef::Bytes { data, .. } => fs::write(dest, data)?,
        FileRef::Fs { path, .. } => {
            fs::copy(path, dest)?;
        }
    }

    set_mode(dest, file.mode())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_materialize_preserves_structure() {
        let temp = TempDir::new().unwrap();
        let files = FileSet::new()
            .with_file("api/main.go", "package main")
            .with_file("api/cmd/users/lambda.go", "package main\n");

        let out = materialize(&files, temp.path()).unwrap();

        assert_eq!(out.len(), 2);
        let lambda = &out["api/cmd/users/lambda.go"];
        assert_eq!(lambda.fs_path, temp.path().join("api/cmd/users/lambda.go"));
        assert_eq!(fs::read_to_string(&lambda.fs_path).unwrap(), "package main\n");
    }

    #[test]
    fn test_materialize_keys_are_normalized() {
        let temp = TempDir::new().unwrap();
        let files = FileSet::new().with_file("./api//cmd/../main.go", "package main");

        let out = materialize(&files, temp.path()).unwrap();
        let main = &out["api/main.go"];
        assert_eq!(main.logical_path, "./api//cmd/../main.go");
        assert_eq!(main.fs_path, temp.path().join("api/main.go"));
    }

    #[test]
    fn test_materialize_copies_fs_refs() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin.go");
        fs::write(&origin, "package handler").unwrap();

        let mut files = FileSet::new();
        files.insert("pkg/handler.go", FileRef::fs(&origin));

        let root = temp.path().join("root");
        let out = materialize(&files, &root).unwrap();
        assert_eq!(
            fs::read_to_string(&out["pkg/handler.go"].fs_path).unwrap(),
            "package handler"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_materialize_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let mut files = FileSet::new();
        files.insert("bin/tool", FileRef::bytes("#!/bin/sh\n").with_mode(0o755));

        let out = materialize(&files, temp.path()).unwrap();
        let mode = fs::metadata(&out["bin/tool"].fs_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_materialize_rejects_escape() {
        let temp = TempDir::new().unwrap();
        let files = FileSet::new().with_file("../evil.go", "package main");

        let result = materialize(&files, &temp.path().join("root"));
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!temp.path().join("evil.go").exists());
    }

    #[test]
    fn test_materialize_missing_source_aborts() {
        let temp = TempDir::new().unwrap();
        let mut files = FileSet::new();
        files.insert("a.go", FileRef::fs(temp.path().join("missing.go")));

        let result = materialize(&files, temp.path());
        assert!(matches!(result, Err(Error::Materialize { path, .. }) if path == "a.go"));
    }
}

//! Toolchain acquisition.
//!
//! Obtaining a `go` binary and a `git` helper that work on the build host is
//! outside the core; the orchestrator asks a [`ToolchainProvider`] for them.
//! [`HostToolchain`] is the default provider and uses whatever is installed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// A version-control helper made available to the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHelper {
    /// Directory containing a `git` executable; prepended to `PATH`.
    pub bin_dir: PathBuf,

    /// Value for `GIT_EXEC_PATH`.
    pub exec_path: PathBuf,
}

/// Supplies toolchain binaries for a build.
pub trait ToolchainProvider: Send + Sync {
    /// Path to a `go` binary suitable for the build host.
    fn go_binary(&self) -> Result<PathBuf>;

    /// Install or locate a `git` helper inside `git_dir`.
    fn git_helper(&self, git_dir: &Path) -> Result<GitHelper>;
}

/// Uses the toolchain installed on the host.
#[derive(Debug, Clone, Default)]
pub struct HostToolchain {
    /// Explicit `go` binary; looked up on `PATH` when unset.
    go: Option<PathBuf>,

    /// Explicit `git` binary; looked up on `PATH` when unset.
    git: Option<PathBuf>,
}

impl HostToolchain {
    /// Create a provider that looks everything up on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `go` binary.
    pub fn with_go(mut self, path: impl Into<PathBuf>) -> Self {
        self.go = Some(path.into());
        self
    }

    /// Use a specific `git` binary.
    pub fn with_git(mut self, path: impl Into<PathBuf>) -> Self {
        self.git = Some(path.into());
        self
    }

    fn locate(explicit: Option<&PathBuf>, name: &str) -> Result<PathBuf> {
        match explicit {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(Error::Provision(format!(
                "{} binary not found at {}",
                name,
                path.display()
            ))),
            None => which::which(name)
                .map_err(|_| Error::Provision(format!("{} not found in PATH", name))),
        }
    }

    /// Get the toolchain version string.
    fn go_version(go: &Path) -> Result<String> {
        let output = Command::new(go)
            .arg("version")
            .output()
            .map_err(|e| Error::Provision(format!("failed to run {}: {}", go.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Provision(format!(
                "`{} version` failed: {}",
                go.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn git_exec_path(git: &Path) -> Result<PathBuf> {
        let output = Command::new(git)
            .arg("--exec-path")
            .output()
            .map_err(|e| Error::Provision(format!("failed to run {}: {}", git.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Provision(format!(
                "`{} --exec-path` failed",
                git.display()
            )));
        }

        Ok(PathBuf::from(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }
}

impl ToolchainProvider for HostToolchain {
    fn go_binary(&self) -> Result<PathBuf> {
        let go = Self::locate(self.go.as_ref(), "go")?;
        let version = Self::go_version(&go)?;
        tracing::info!(go = %go.display(), %version, "using go toolchain");
        Ok(go)
    }

    fn git_helper(&self, git_dir: &Path) -> Result<GitHelper> {
        let git = Self::locate(self.git.as_ref(), "git")?;
        let exec_path = Self::git_exec_path(&git)?;

        // Expose the binary from git_dir so PATH only gains one directory
        let link = git_dir.join(git.file_name().unwrap_or(OsStr::new("git")));
        if !link.exists() {
            link_binary(&git, &link).map_err(|e| {
                Error::Provision(format!("cannot install git into {}: {}", git_dir.display(), e))
            })?;
        }

        tracing::debug!(git = %git.display(), exec_path = %exec_path.display(), "using git helper");
        Ok(GitHelper {
            bin_dir: git_dir.to_path_buf(),
            exec_path,
        })
    }
}

#[cfg(unix)]
fn link_binary(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_binary(target: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(target, link).map(|_| ())
}

//! Environment provisioning.
//!
//! Creates the build directories, acquires the toolchain and freezes the
//! compiler environment. Nothing here touches the ambient process
//! environment: [`GoEnv`] is a value that is applied to each command.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::compile::{GitHelper, ToolchainProvider};
use crate::error::{Error, Result};
use crate::paths::BuildDirs;

/// Fixed target operating system.
pub const TARGET_OS: &str = "linux";

/// Fixed target architecture.
pub const TARGET_ARCH: &str = "amd64";

/// Environment overlay for every toolchain invocation of a build.
///
/// Immutable once provisioned; shared between workers behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoEnv {
    vars: BTreeMap<String, OsString>,
}

impl GoEnv {
    /// Build the overlay for a GOPATH and git helper.
    ///
    /// `PATH` is resolved here, once, from the current process `PATH` with
    /// the helper's directory in front.
    pub fn new(go_path: &Path, git: &GitHelper) -> Result<Self> {
        let mut vars = BTreeMap::new();
        vars.insert("GOOS".to_string(), OsString::from(TARGET_OS));
        vars.insert("GOARCH".to_string(), OsString::from(TARGET_ARCH));
        vars.insert("GOPATH".to_string(), go_path.as_os_str().to_owned());
        vars.insert("CGO_ENABLED".to_string(), OsString::from("0"));
        vars.insert("GO111MODULE".to_string(), OsString::from("on"));
        vars.insert("GIT_EXEC_PATH".to_string(), git.exec_path.as_os_str().to_owned());

        let mut search_path = vec![git.bin_dir.clone()];
        if let Some(current) = std::env::var_os("PATH") {
            search_path.extend(std::env::split_paths(&current));
        }
        let path = std::env::join_paths(search_path)
            .map_err(|e| Error::Provision(format!("invalid PATH for git helper: {}", e)))?;
        vars.insert("PATH".to_string(), path);

        Ok(Self { vars })
    }

    /// Look up one variable of the overlay.
    pub fn get(&self, key: &str) -> Option<&OsString> {
        self.vars.get(key)
    }

    /// Overlay the variables onto a command's inherited environment.
    pub fn apply(&self, command: &mut Command) {
        command.envs(&self.vars);
    }
}

/// Everything a build needs from provisioning, read-only afterwards.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    pub dirs: BuildDirs,
    pub go_binary: PathBuf,
    pub go_env: Arc<GoEnv>,
}

impl BuildEnvironment {
    /// Provision a fresh environment.
    ///
    /// # Arguments
    /// * `toolchain` - Supplies the `go` binary and the `git` helper
    /// * `work_root` - Parent for the build directories; the system temp dir if `None`
    ///
    /// # Errors
    /// Returns [`Error::Provision`] if a directory cannot be created or a
    /// toolchain binary cannot be obtained.
    pub fn provision(toolchain: &dyn ToolchainProvider, work_root: Option<&Path>) -> Result<Self> {
        let dirs = BuildDirs::create(work_root)?;
        tracing::debug!(
            go_path = %dirs.go_path.display(),
            git_dir = %dirs.git_dir.display(),
            out_dir = %dirs.out_dir.display(),
            "created build directories"
        );

        match Self::acquire(toolchain, &dirs) {
            Ok((go_binary, go_env)) => Ok(Self {
                dirs,
                go_binary,
                go_env: Arc::new(go_env),
            }),
            Err(e) => {
                if let Err(cleanup) = dirs.remove() {
                    tracing::warn!("failed to remove build directories: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn acquire(toolchain: &dyn ToolchainProvider, dirs: &BuildDirs) -> Result<(PathBuf, GoEnv)> {
        tracing::info!("acquiring go binary");
        let go_binary = toolchain.go_binary()?;

        tracing::info!("acquiring git helper");
        let git = toolchain.git_helper(&dirs.git_dir)?;

        let go_env = GoEnv::new(&dirs.go_path, &git)?;
        Ok((go_binary, go_env))
    }

    /// Root under which source files are materialized.
    pub fn src_root(&self) -> PathBuf {
        self.dirs.src_root()
    }
}

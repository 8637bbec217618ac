//! Build directory management.
//!
//! Every build gets three fresh, unrelated directories:
//!
//! ```text
//! lambdakit-gopath-XXXX/   # GOPATH
//! ├── bin/
//! ├── pkg/linux_amd64/
//! └── src/lambda/          # materialized sources
//! lambdakit-git-XXXX/      # version-control helper
//! lambdakit-out-XXXX/      # compiled binaries, one subtree per lambda
//! ```
//!
//! The directories outlive the build: artifacts reference files inside the
//! output directory, so removing them is left to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::provision::{TARGET_ARCH, TARGET_OS};

/// Directories provisioned for one build.
#[derive(Debug, Clone)]
pub struct BuildDirs {
    /// Toolchain workspace root (`GOPATH`).
    pub go_path: PathBuf,

    /// Directory holding the version-control helper.
    pub git_dir: PathBuf,

    /// Root of the compiled output.
    pub out_dir: PathBuf,
}

impl BuildDirs {
    /// Create the three build directories.
    ///
    /// Nothing is left behind if any of them cannot be created.
    ///
    /// # Arguments
    /// * `work_root` - Parent for the directories; the system temp dir if `None`
    ///
    /// # Errors
    /// Returns [`Error::Provision`] if any directory cannot be created.
    pub fn create(work_root: Option<&Path>) -> Result<Self> {
        let parent = match work_root {
            Some(root) => root.to_path_buf(),
            None => std::env::temp_dir(),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            Error::Provision(format!("cannot create work root {}: {}", parent.display(), e))
        })?;

        // Removed on drop until every step succeeded
        let git_dir = make_dir(&parent, "lambdakit-git-")?;
        let go_path = make_dir(&parent, "lambdakit-gopath-")?;
        let out_dir = make_dir(&parent, "lambdakit-out-")?;
        create_go_path_tree(go_path.path())?;

        Ok(Self {
            go_path: go_path.keep(),
            git_dir: git_dir.keep(),
            out_dir: out_dir.keep(),
        })
    }

    /// Root under which source files are materialized.
    pub fn src_root(&self) -> PathBuf {
        self.go_path.join("src").join("lambda")
    }

    /// Remove all build directories.
    pub fn remove(&self) -> Result<()> {
        for dir in [&self.go_path, &self.git_dir, &self.out_dir] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

/// Lay out `bin/` and `pkg/<os>_<arch>/` as `go help gopath` describes.
///
/// Without them the toolchain does not recognize the GOPATH.
fn create_go_path_tree(go_path: &Path) -> Result<()> {
    let pkg = go_path
        .join("pkg")
        .join(format!("{}_{}", TARGET_OS, TARGET_ARCH));

    for dir in [go_path.join("bin"), pkg, go_path.join("src").join("lambda")] {
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Provision(format!("cannot create {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

fn make_dir(parent: &Path, prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map_err(|e| {
            Error::Provision(format!(
                "cannot create {}* in {}: {}",
                prefix,
                parent.display(),
                e
            ))
        })
}

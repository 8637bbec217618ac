//! Lambda discovery.
//!
//! Finds candidate handler files beneath the lambda base directory and
//! derives the logical entrypoint each artifact is keyed by.

use std::collections::BTreeMap;
use std::path::Path;

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;

use crate::error::{Error, Result};
use crate::request::{logical_dirname, logical_join, normalize_logical, to_logical, LambdaConfig};

/// A discovered lambda source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LambdaCandidate {
    /// Path relative to the lambda base directory.
    pub relative_path: String,

    /// Logical path `dirname(entrypoint)/lambdaBaseDir/relative_path`.
    pub entrypoint: String,
}

impl LambdaCandidate {
    /// Logical directory of the candidate, which also names its output subtree.
    pub fn dir(&self) -> &str {
        logical_dirname(&self.entrypoint)
    }
}

/// Find files matching `file_pattern` anywhere beneath `entrypoint_dir/base_dir`.
///
/// Returns paths relative to the base directory, `/`-separated and sorted,
/// so repeated runs over the same tree yield the same list. No match is an
/// empty list.
///
/// # Errors
/// - [`Error::Config`] if the base directory does not exist or the pattern is invalid
/// - [`Error::Discovery`] if the tree cannot be read
pub fn discover(entrypoint_dir: &Path, base_dir: &str, file_pattern: &str) -> Result<Vec<String>> {
    let lambdas_dir = entrypoint_dir.join(base_dir);
    tracing::info!(
        pattern = %file_pattern,
        dir = %lambdas_dir.display(),
        "finding lambdas"
    );

    if !lambdas_dir.is_dir() {
        return Err(Error::Config(format!(
            "lambda directory {} not found",
            lambdas_dir.display()
        )));
    }

    let mut builder = OverrideBuilder::new(&lambdas_dir);
    builder
        .add(&format!("**/{}", file_pattern))
        .map_err(|e| Error::Config(format!("invalid lambdaFileName {:?}: {}", file_pattern, e)))?;
    let matcher = builder
        .build()
        .map_err(|e| Error::Config(format!("invalid lambdaFileName {:?}: {}", file_pattern, e)))?;

    let walker = WalkBuilder::new(&lambdas_dir).standard_filters(false).build();

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| Error::Discovery(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&lambdas_dir)
            .map_err(|e| Error::Discovery(format!("{}: {}", entry.path().display(), e)))?;

        if matcher.matched(relative, false).is_whitelist() {
            found.push(to_logical(relative));
        }
    }

    found.sort();
    Ok(found)
}

/// Pair discovered relative paths with their derived entrypoints.
pub fn derive_candidates(
    entrypoint: &str,
    config: &LambdaConfig,
    relative_paths: Vec<String>,
) -> Result<Vec<LambdaCandidate>> {
    let base = logical_join(&[logical_dirname(entrypoint), &config.lambda_base_dir]);

    relative_paths
        .into_iter()
        .map(|relative_path| {
            let entrypoint = normalize_logical(&logical_join(&[&base, &relative_path]))?;
            Ok(LambdaCandidate {
                relative_path,
                entrypoint,
            })
        })
        .collect()
}

/// Reject candidates whose directories are not disjoint.
///
/// Candidates in one directory would write the same bridge file and the
/// same output subtree. A candidate below another one's directory would
/// land inside the other's output subtree and end up in its artifact.
pub fn check_directory_conflicts(candidates: &[LambdaCandidate]) -> Result<()> {
    let mut by_dir: BTreeMap<&str, &LambdaCandidate> = BTreeMap::new();

    for candidate in candidates {
        if let Some(previous) = by_dir.insert(candidate.dir(), candidate) {
            return Err(Error::Config(format!(
                "lambdas {} and {} share the directory {:?}; each lambda needs its own directory",
                previous.entrypoint,
                candidate.entrypoint,
                candidate.dir()
            )));
        }
    }

    for (dir, candidate) in &by_dir {
        let mut parent = *dir;
        while !parent.is_empty() {
            parent = logical_dirname(parent);
            if let Some(outer) = by_dir.get(parent) {
                return Err(Error::Config(format!(
                    "lambda {} is nested in the directory {:?} of lambda {}; lambda directories must not contain each other",
                    candidate.entrypoint, parent, outer.entrypoint
                )));
            }
        }
    }

    Ok(())
}

/// Discover, derive and check the candidates of a tree rooted at `root`.
///
/// `root` is the directory logical paths are relative to; `entrypoint` is the
/// logical path of the build entrypoint beneath it.
pub fn find_lambdas(root: &Path, entrypoint: &str, config: &LambdaConfig) -> Result<Vec<LambdaCandidate>> {
    let entrypoint = normalize_logical(entrypoint)?;
    let entrypoint_dir = root.join(logical_dirname(&entrypoint));

    let found = discover(&entrypoint_dir, &config.lambda_base_dir, &config.lambda_file_name)?;
    let candidates = derive_candidates(&entrypoint, config, found)?;
    check_directory_conflicts(&candidates)?;

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "package main\n").unwrap();
    }

    #[test]
    fn test_discover_nested() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "cmd/lambda.go");
        touch(temp.path(), "cmd/users/lambda.go");
        touch(temp.path(), "cmd/users/store.go");
        touch(temp.path(), "cmd/orders/v2/lambda.go");
        touch(temp.path(), "internal/lambda.go");

        let found = discover(temp.path(), "cmd", "lambda.go").unwrap();
        assert_eq!(
            found,
            vec!["lambda.go", "orders/v2/lambda.go", "users/lambda.go"]
        );
    }

    #[test]
    fn test_discover_is_deterministic() {
        let temp = TempDir::new().unwrap();
        for name in ["zeta", "alpha", "mid", "beta"] {
            touch(temp.path(), &format!("cmd/{}/lambda.go", name));
        }

        let first = discover(temp.path(), "cmd", "lambda.go").unwrap();
        let second = discover(temp.path(), "cmd", "lambda.go").unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], "alpha/lambda.go");
    }

    #[test]
    fn test_discover_glob_pattern() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "cmd/a/handler_get.go");
        touch(temp.path(), "cmd/b/handler_put.go");
        touch(temp.path(), "cmd/b/util.go");

        let found = discover(temp.path(), "cmd", "handler_*.go").unwrap();
        assert_eq!(found, vec!["a/handler_get.go", "b/handler_put.go"]);
    }

    #[test]
    fn test_discover_no_match_is_empty() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "cmd/a/lambda.go");

        let found = discover(temp.path(), "cmd", "function.go").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_discover_missing_base_dir() {
        let temp = TempDir::new().unwrap();
        let result = discover(temp.path(), "cmd", "lambda.go");
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_derive_candidates() {
        let config = LambdaConfig::default();
        let candidates = derive_candidates(
            "api/main.go",
            &config,
            vec!["lambda.go".to_string(), "users/lambda.go".to_string()],
        )
        .unwrap();

        assert_eq!(candidates[0].entrypoint, "api/cmd/lambda.go");
        assert_eq!(candidates[1].entrypoint, "api/cmd/users/lambda.go");
        assert_eq!(candidates[1].dir(), "api/cmd/users");

        let top_level = derive_candidates("main.go", &config, vec!["x/lambda.go".to_string()]).unwrap();
        assert_eq!(top_level[0].entrypoint, "cmd/x/lambda.go");
    }

    #[test]
    fn test_directory_conflict_rejected() {
        let config = LambdaConfig {
            lambda_file_name: "*.go".to_string(),
            ..LambdaConfig::default()
        };
        let candidates = derive_candidates(
            "main.go",
            &config,
            vec!["a/get.go".to_string(), "a/put.go".to_string(), "b/get.go".to_string()],
        )
        .unwrap();

        let result = check_directory_conflicts(&candidates);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("share the directory")));

        assert!(check_directory_conflicts(&candidates[1..]).is_ok());
    }

    #[test]
    fn test_nested_directory_rejected() {
        let candidates = derive_candidates(
            "api/main.go",
            &LambdaConfig::default(),
            vec!["lambda.go".to_string(), "users/v2/lambda.go".to_string()],
        )
        .unwrap();

        let result = check_directory_conflicts(&candidates);
        assert!(matches!(
            result,
            Err(Error::Config(msg)) if msg.contains("api/cmd/users/v2/lambda.go") && msg.contains("is nested")
        ));

        // Siblings sharing a name prefix are disjoint
        let siblings = derive_candidates(
            "main.go",
            &LambdaConfig::default(),
            vec!["users/lambda.go".to_string(), "users-v2/lambda.go".to_string()],
        )
        .unwrap();
        assert!(check_directory_conflicts(&siblings).is_ok());
    }

    #[test]
    fn test_find_lambdas() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "api/main.go");
        touch(temp.path(), "api/cmd/users/lambda.go");
        touch(temp.path(), "api/cmd/orders/lambda.go");

        let candidates = find_lambdas(temp.path(), "api/main.go", &LambdaConfig::default()).unwrap();
        let entrypoints: Vec<_> = candidates.iter().map(|c| c.entrypoint.as_str()).collect();
        assert_eq!(entrypoints, vec!["api/cmd/orders/lambda.go", "api/cmd/users/lambda.go"]);
    }
}

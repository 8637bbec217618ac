//! Discover command implementation for lambdakit CLI.
//!
//! Lists the lambdas a build of the same tree would compile, without
//! provisioning a toolchain.

use std::path::Path;

use lambdakit_core::{find_lambdas, LambdaConfig};

use crate::colors;

/// List the lambdas beneath the entrypoint of `src_dir`.
pub fn execute(src_dir: &Path, entrypoint: &str, config: &LambdaConfig, json: bool) -> anyhow::Result<()> {
    if !src_dir.is_dir() {
        anyhow::bail!("Source directory not found: {}", src_dir.display());
    }

    let candidates = find_lambdas(src_dir, entrypoint, config)?;

    if json {
        let entrypoints: Vec<&str> = candidates.iter().map(|c| c.entrypoint.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&entrypoints)?);
        return Ok(());
    }

    if candidates.is_empty() {
        eprintln!(
            "{}No lambdas matching {} found beneath {}{}",
            colors::YELLOW,
            config.lambda_file_name,
            config.lambda_base_dir,
            colors::RESET
        );
        return Ok(());
    }

    for candidate in &candidates {
        println!("{}", candidate.entrypoint);
    }

    Ok(())
}

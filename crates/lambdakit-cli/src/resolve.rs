//! Resolve command implementation for lambdakit CLI.

use std::path::Path;

use lambdakit_core::{CommandResolver, GoSourceResolver, HandlerResolver, Resolution};

/// Print the handler function of a Go source file.
pub fn execute(file: &Path, resolver_cmd: Option<&Path>) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let resolution = match resolver_cmd {
        Some(program) => CommandResolver::new(program).resolve(file)?,
        None => GoSourceResolver::new().resolve(file)?,
    };

    match resolution {
        Resolution::Found(name) => {
            println!("{}", name);
            Ok(())
        }
        Resolution::NotFound => {
            anyhow::bail!("{} declares no exported top-level function", file.display())
        }
        Resolution::Ambiguous(names) => anyhow::bail!(
            "{} declares several exported functions: {}",
            file.display(),
            names.join(", ")
        ),
    }
}

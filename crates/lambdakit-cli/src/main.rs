//! lambdakit CLI - Build Go handlers into serverless function artifacts.

mod build;
mod colors;
mod discover;
mod resolve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lambdakit_core::LambdaConfig;

#[derive(Parser)]
#[command(name = "lambdakit")]
#[command(about = "Build Go handlers into serverless function artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every lambda beneath the entrypoint
    Build {
        /// Root of the source tree
        src_dir: PathBuf,

        #[command(flatten)]
        lambdas: LambdaArgs,

        /// Lambdas built at once (0 = one per CPU)
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Abort the build after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Parent directory for build directories (default: system temp dir)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Keep build directories when the build fails
        #[arg(long)]
        keep_failed: bool,

        /// External program printing the handler name of a Go file
        #[arg(long)]
        resolver_cmd: Option<PathBuf>,

        /// Go file replacing the built-in bridge; must contain __LAMBDAKIT_HANDLER_FUNC_NAME
        #[arg(long)]
        bridge_template: Option<PathBuf>,

        /// Go binary to use (default: `go` on PATH)
        #[arg(long)]
        go: Option<PathBuf>,

        /// Git binary to use (default: `git` on PATH)
        #[arg(long)]
        git: Option<PathBuf>,

        /// Print the artifacts as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the lambdas a build would compile
    Discover {
        /// Root of the source tree
        src_dir: PathBuf,

        #[command(flatten)]
        lambdas: LambdaArgs,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the handler function of a Go file
    Resolve {
        /// Path to the Go source file
        file: PathBuf,

        /// External program printing the handler name of a Go file
        #[arg(long)]
        resolver_cmd: Option<PathBuf>,
    },
}

/// Where to look for lambdas.
#[derive(Args)]
struct LambdaArgs {
    /// Entrypoint, relative to the source root; its directory anchors discovery
    #[arg(short, long)]
    entrypoint: String,

    /// JSON file with `lambdaBaseDir` / `lambdaFileName`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory beneath the entrypoint's directory to search [default: cmd]
    #[arg(long)]
    lambda_base_dir: Option<String>,

    /// File name (or glob) of lambda sources [default: lambda.go]
    #[arg(long)]
    lambda_file_name: Option<String>,
}

impl LambdaArgs {
    /// Config file values, overridden by flags.
    fn config(&self) -> anyhow::Result<LambdaConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("cannot read config {}: {}", path.display(), e)
                })?;
                LambdaConfig::from_json(&json)?
            }
            None => LambdaConfig::default(),
        };

        if let Some(dir) = &self.lambda_base_dir {
            config.lambda_base_dir = dir.clone();
        }
        if let Some(name) = &self.lambda_file_name {
            config.lambda_file_name = name.clone();
        }
        config.validate()?;

        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format lambdakit-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<lambdakit_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Build {
            src_dir,
            lambdas,
            jobs,
            timeout,
            work_dir,
            keep_failed,
            resolver_cmd,
            bridge_template,
            go,
            git,
            json,
        } => {
            let bridge_template = bridge_template
                .map(|path| {
                    std::fs::read_to_string(&path).map_err(|e| {
                        anyhow::anyhow!("cannot read bridge template {}: {}", path.display(), e)
                    })
                })
                .transpose()?;
            let args = build::BuildArgs {
                src_dir,
                entrypoint: lambdas.entrypoint.clone(),
                config: lambdas.config().map_err(format_error)?,
                jobs,
                timeout,
                work_dir,
                keep_failed,
                resolver_cmd,
                bridge_template,
                go,
                git,
                json,
            };
            build::execute(args).map_err(format_error)?;
        }

        Commands::Discover {
            src_dir,
            lambdas,
            json,
        } => {
            let config = lambdas.config().map_err(format_error)?;
            discover::execute(&src_dir, &lambdas.entrypoint, &config, json).map_err(format_error)?;
        }

        Commands::Resolve { file, resolver_cmd } => {
            resolve::execute(&file, resolver_cmd.as_deref()).map_err(format_error)?;
        }
    }

    Ok(())
}

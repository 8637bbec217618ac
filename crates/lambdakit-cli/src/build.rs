//! Build command implementation for lambdakit CLI.
//!
//! Loads a source tree from disk and compiles every lambda in it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use lambdakit_core::{
    BuildCallback, BuildOptions, BuildRequest, CommandResolver, Error, FileSet, GoSourceResolver,
    HostToolchain, LambdaBuilder, LambdaConfig, Stage,
};

use crate::colors;

/// Result type for CLI operations.
pub type CliResult = anyhow::Result<()>;

/// Parsed arguments of `lambdakit build`.
pub struct BuildArgs {
    pub src_dir: PathBuf,
    pub entrypoint: String,
    pub config: LambdaConfig,
    pub jobs: usize,
    pub timeout: Option<u64>,
    pub work_dir: Option<PathBuf>,
    pub keep_failed: bool,
    pub resolver_cmd: Option<PathBuf>,
    pub bridge_template: Option<String>,
    pub go: Option<PathBuf>,
    pub git: Option<PathBuf>,
    pub json: bool,
}

/// Prints progress to stderr so stdout stays machine-readable.
struct ProgressPrinter;

impl BuildCallback for ProgressPrinter {
    fn on_stage(&self, stage: Stage) {
        eprintln!("{}  ◆ {}{}", colors::BLUE, stage, colors::RESET);
    }

    fn on_candidates_discovered(&self, entrypoints: &[String]) {
        if entrypoints.is_empty() {
            eprintln!("{}  ! no lambdas found{}", colors::YELLOW, colors::RESET);
        } else {
            eprintln!(
                "{}  ◆ found {} lambda(s){}",
                colors::BLUE,
                entrypoints.len(),
                colors::RESET
            );
        }
    }

    fn on_candidate_started(&self, entrypoint: &str) {
        eprintln!("{}    building{} {}", colors::DIM, colors::RESET, entrypoint);
    }

    fn on_candidate_completed(&self, entrypoint: &str) {
        eprintln!("{}    ✓{} {}", colors::GREEN, colors::RESET, entrypoint);
    }

    fn on_candidate_failed(&self, entrypoint: &str, _error: &Error) {
        eprintln!("{}    ✗{} {}", colors::RED, colors::RESET, entrypoint);
    }
}

/// Build every lambda of a source tree.
pub fn execute(args: BuildArgs) -> CliResult {
    let start = Instant::now();

    if !args.json {
        eprintln!(
            "\n{}lambdakit{} - Building {}{}{}\n",
            colors::BOLD,
            colors::RESET,
            colors::CYAN,
            args.src_dir.display(),
            colors::RESET
        );
    }

    let files = FileSet::from_dir(&args.src_dir)?;
    let request = BuildRequest::new(files, args.entrypoint.as_str()).with_config(args.config.clone());

    let mut toolchain = HostToolchain::new();
    if let Some(go) = &args.go {
        toolchain = toolchain.with_go(go);
    }
    if let Some(git) = &args.git {
        toolchain = toolchain.with_git(git);
    }

    let options = BuildOptions {
        jobs: args.jobs,
        deadline: args.timeout.map(Duration::from_secs),
        work_root: args.work_dir.clone(),
        bridge_template: args.bridge_template.clone(),
        keep_failed: args.keep_failed,
    };

    let mut builder = match &args.resolver_cmd {
        Some(program) => LambdaBuilder::new(toolchain, CommandResolver::new(program)),
        None => LambdaBuilder::new(toolchain, GoSourceResolver::new()),
    }
    .with_options(options);
    if !args.json {
        builder.set_callback(ProgressPrinter);
    }

    let lambdas = match builder.build(&request) {
        Ok(lambdas) => lambdas,
        Err(err) => {
            report_failure(&err, args.json);
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&lambdas)?);
        return Ok(());
    }

    println!();
    for (entrypoint, lambda) in &lambdas {
        println!(
            "{}Built:{} {} {}->{} {}",
            colors::GREEN,
            colors::RESET,
            entrypoint,
            colors::DIM,
            colors::RESET,
            lambda.binary.display()
        );
    }
    println!(
        "{}Lambdas:{} {}",
        colors::DIM,
        colors::RESET,
        lambdas.len()
    );
    println!(
        "{}Time:{} {:.2}s",
        colors::DIM,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Show compiler diagnostics, or the failure as JSON on stdout.
fn report_failure(err: &Error, json: bool) {
    let compile = match err.root() {
        Error::Compile(compile) => Some(compile),
        _ => None,
    };

    if json {
        let report = serde_json::json!({
            "error": err.root().to_string(),
            "stage": err.stage().map(|s| s.to_string()),
            "entrypoint": err.entrypoint(),
            "compile": compile.map(|c| c.to_json()),
        });
        println!("{}", report);
    } else if let Some(compile) = compile {
        eprintln!();
        eprint!("{}", compile.format_terminal());
    }
}

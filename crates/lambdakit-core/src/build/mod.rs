//! Build orchestration.
//!
//! [`LambdaBuilder`] drives a request through the build stages:
//!
//! ```text
//! provisioning ─► materializing ─► discovering ─┬─► resolving ─► synthesizing ─► compiling ─► packaging
//!                                               ├─► ...                                (one chain per
//!                                               └─► ...                                 candidate)
//! ```
//!
//! The first three stages run once. The per-candidate chains are independent
//! and run on a bounded pool. Any failure ends the whole build: no partial
//! result is returned.

mod context;
mod pool;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use context::{AbortHandle, BuildCallback, Cancellation};
use pool::run_bounded;

use crate::compile::{BridgeSynthesizer, GoCompiler, ToolchainProvider};
use crate::discover::{find_lambdas, LambdaCandidate};
use crate::error::{Error, Result, Stage};
use crate::materialize::materialize;
use crate::package::{package, Lambda, HANDLER_NAME};
use crate::provision::BuildEnvironment;
use crate::request::{logical_dirname, normalize_logical, BuildRequest};
use crate::resolve::{HandlerResolver, Resolution};

/// Tuning knobs for a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum candidates built at once; `0` uses the host's parallelism.
    pub jobs: usize,

    /// Limit on the whole build, measured from the call to [`LambdaBuilder::build`].
    pub deadline: Option<Duration>,

    /// Parent of the build directories; the system temp dir if `None`.
    pub work_root: Option<PathBuf>,

    /// Bridge template replacing the built-in one.
    pub bridge_template: Option<String>,

    /// Keep the build directories when the build fails.
    pub keep_failed: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            deadline: None,
            work_root: None,
            bridge_template: None,
            keep_failed: false,
        }
    }
}

/// Compiles every lambda of a source tree.
pub struct LambdaBuilder {
    toolchain: Arc<dyn ToolchainProvider>,
    resolver: Arc<dyn HandlerResolver>,
    options: BuildOptions,
    abort: Option<AbortHandle>,
    callback: Option<Arc<dyn BuildCallback>>,
}

/// Shared, read-only state of the per-candidate stages.
struct CandidateContext<'a> {
    src_root: PathBuf,
    out_dir: &'a Path,
    compiler: GoCompiler,
    synthesizer: &'a BridgeSynthesizer,
    cancel: &'a Cancellation,
}

impl LambdaBuilder {
    /// Create a builder with default options.
    pub fn new(
        toolchain: impl ToolchainProvider + 'static,
        resolver: impl HandlerResolver + 'static,
    ) -> Self {
        Self {
            toolchain: Arc::new(toolchain),
            resolver: Arc::new(resolver),
            options: BuildOptions::default(),
            abort: None,
            callback: None,
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Cancel the build through `handle`.
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Set the progress callback.
    pub fn set_callback(&mut self, callback: impl BuildCallback + 'static) {
        self.callback = Some(Arc::new(callback));
    }

    /// Build every lambda found beneath the request's entrypoint.
    ///
    /// Returns one [`Lambda`] per candidate, keyed by the candidate's logical
    /// entrypoint. Finding no candidate is an empty map.
    ///
    /// # Errors
    /// The first failure, attributed to its candidate and stage when it
    /// happened in a per-candidate stage. Build directories are removed on
    /// failure unless [`BuildOptions::keep_failed`] is set.
    pub fn build(&self, request: &BuildRequest) -> Result<BTreeMap<String, Lambda>> {
        let cancel = Cancellation::new(
            self.abort.clone(),
            self.options.deadline.map(|limit| Instant::now() + limit),
        );

        request.config.validate()?;
        let entrypoint = normalize_logical(&request.entrypoint)?;
        let synthesizer = match &self.options.bridge_template {
            Some(template) => BridgeSynthesizer::with_template(template.clone())?,
            None => BridgeSynthesizer::new(),
        };

        cancel.check()?;
        self.stage(Stage::Provisioning);
        tracing::info!("provisioning build environment");
        let env = BuildEnvironment::provision(self.toolchain.as_ref(), self.options.work_root.as_deref())?;

        let result = self.run(&env, request, &entrypoint, &synthesizer, &cancel);

        if result.is_err() && !self.options.keep_failed {
            if let Err(e) = env.dirs.remove() {
                tracing::warn!("failed to remove build directories: {}", e);
            }
        }

        result
    }

    fn run(
        &self,
        env: &BuildEnvironment,
        request: &BuildRequest,
        entrypoint: &str,
        synthesizer: &BridgeSynthesizer,
        cancel: &Cancellation,
    ) -> Result<BTreeMap<String, Lambda>> {
        let src_root = env.src_root();

        cancel.check()?;
        self.stage(Stage::Materializing);
        tracing::info!(files = request.files.len(), "materializing sources");
        let materialized = materialize(&request.files, &src_root)?;
        let entrypoint_dir = materialized
            .get(entrypoint)
            .and_then(|file| file.fs_path.parent())
            .ok_or_else(|| {
                Error::Config(format!(
                    "entrypoint {:?} is not part of the uploaded files",
                    request.entrypoint
                ))
            })?;

        cancel.check()?;
        self.stage(Stage::Discovering);
        if !entrypoint_dir.join("vendor").is_dir() {
            tracing::warn!(
                dir = %logical_dirname(entrypoint),
                "no vendor directory next to the entrypoint; dependencies may not resolve"
            );
        }

        let candidates = find_lambdas(&src_root, entrypoint, &request.config)?;
        tracing::info!(count = candidates.len(), "found lambdas");

        if let Some(ref callback) = self.callback {
            let entrypoints: Vec<String> = candidates.iter().map(|c| c.entrypoint.clone()).collect();
            callback.on_candidates_discovered(&entrypoints);
        }

        let ctx = CandidateContext {
            src_root,
            out_dir: &env.dirs.out_dir,
            compiler: GoCompiler::new(&env.go_binary, Arc::clone(&env.go_env)),
            synthesizer,
            cancel,
        };

        let built = run_bounded(self.options.jobs, &candidates, cancel, |candidate| {
            self.build_candidate(candidate, &ctx)
        })?;

        Ok(built.into_iter().collect())
    }

    fn build_candidate(
        &self,
        candidate: &LambdaCandidate,
        ctx: &CandidateContext<'_>,
    ) -> Result<(String, Lambda)> {
        if let Some(ref callback) = self.callback {
            callback.on_candidate_started(&candidate.entrypoint);
        }

        let result = self.candidate_stages(candidate, ctx);

        if let Some(ref callback) = self.callback {
            match &result {
                Ok(_) => callback.on_candidate_completed(&candidate.entrypoint),
                Err(e) if !e.is_cancellation() => callback.on_candidate_failed(&candidate.entrypoint, e),
                Err(_) => {}
            }
        }

        result.map(|lambda| (candidate.entrypoint.clone(), lambda))
    }

    fn candidate_stages(&self, candidate: &LambdaCandidate, ctx: &CandidateContext<'_>) -> Result<Lambda> {
        let entrypoint = candidate.entrypoint.as_str();
        let at = |stage: Stage| move |e: Error| e.in_candidate(entrypoint, stage);

        let source = ctx.src_root.join(entrypoint);
        let source_dir = ctx.src_root.join(candidate.dir());

        ctx.cancel.check().map_err(at(Stage::Resolving))?;
        let handler = match self.resolver.resolve(&source).map_err(at(Stage::Resolving))? {
            Resolution::Found(name) => name,
            Resolution::NotFound => {
                return Err(at(Stage::Resolving)(Error::HandlerResolution(format!(
                    "{} declares no exported top-level function",
                    entrypoint
                ))));
            }
            Resolution::Ambiguous(names) => {
                return Err(at(Stage::Resolving)(Error::HandlerResolution(format!(
                    "{} declares several exported functions ({}); expected exactly one",
                    entrypoint,
                    names.join(", ")
                ))));
            }
        };
        tracing::info!(lambda = %entrypoint, handler = %handler, "resolved handler");

        ctx.cancel.check().map_err(at(Stage::Synthesizing))?;
        let bridge = ctx
            .synthesizer
            .synthesize(&handler, &source_dir)
            .map_err(at(Stage::Synthesizing))?;

        let out_subtree = ctx.out_dir.join(candidate.dir());
        fs::create_dir_all(&out_subtree)
            .map_err(|e| at(Stage::Compiling)(Error::Io(e)))?;
        let binary = out_subtree.join(HANDLER_NAME);

        tracing::info!(lambda = %entrypoint, "compiling");
        ctx.compiler
            .compile(&binary, &bridge.path, &source, &source_dir, ctx.cancel)
            .map_err(at(Stage::Compiling))?;

        let lambda = package(&out_subtree, &binary).map_err(at(Stage::Packaging))?;
        tracing::info!(lambda = %entrypoint, binary = %binary.display(), "built lambda");

        Ok(lambda)
    }

    fn stage(&self, stage: Stage) {
        tracing::debug!(%stage, "entering stage");
        if let Some(ref callback) = self.callback {
            callback.on_stage(stage);
        }
    }
}

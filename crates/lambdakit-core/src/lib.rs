//! Core engine for lambdakit, a build orchestrator for Go lambdas.
//!
//! This crate provides:
//! - Environment provisioning (build directories, toolchain, fixed `GoEnv`)
//! - Source materialization and lambda discovery
//! - Static handler resolution
//! - Bridge synthesis and `go build` invocation
//! - Artifact packaging
//! - A [`LambdaBuilder`] that runs all of the above with bounded parallelism

pub mod build;
pub mod compile;
pub mod discover;
pub mod error;
pub mod materialize;
pub mod package;
pub mod paths;
pub mod provision;
pub mod request;
pub mod resolve;

pub use build::{AbortHandle, BuildCallback, BuildOptions, LambdaBuilder};
pub use compile::{
    BridgeFile, BridgeSynthesizer, CompileError, Diagnostic, GitHelper, GoCompiler, HostToolchain,
    ToolchainProvider,
};
pub use discover::{find_lambdas, LambdaCandidate};
pub use error::{Error, Result, Stage};
pub use package::{FileFsRef, Lambda};
pub use paths::BuildDirs;
pub use provision::{BuildEnvironment, GoEnv};
pub use request::{BuildRequest, FileRef, FileSet, LambdaConfig};
pub use resolve::{CommandResolver, GoSourceResolver, HandlerResolver, Resolution};

//! Compilation pipeline for Go lambdas.
//!
//! This module provides:
//! - Toolchain acquisition (`go` binary and `git` helper)
//! - Bridge synthesis (generated `main` calling the handler)
//! - Toolchain invocation (`go build` under a fixed environment)
//! - Diagnostic parsing (toolchain output → file locations)
//!
//! # Architecture
//!
//! ```text
//! cmd/users/lambda.go ──┐
//!                       ├──► go build -mod=vendor ──► out/.../cmd/users/handler
//! main__lambdakit__bridge__.go ──┘
//! ```

mod bridge;
mod errors;
mod invoker;
mod toolchain;

pub use bridge::{BridgeFile, BridgeSynthesizer, BRIDGE_FILE_NAME, HANDLER_PLACEHOLDER};
pub use errors::{parse_diagnostics, CompileError, Diagnostic};
pub use invoker::GoCompiler;
pub use toolchain::{GitHelper, HostToolchain, ToolchainProvider};

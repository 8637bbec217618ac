//! Handler resolution.
//!
//! Decides which function of a candidate file is the handler, by static
//! inspection only: the candidate is never compiled or executed here.
//!
//! - [`GoSourceResolver`] scans the Go source itself (default)
//! - [`CommandResolver`] delegates to an external analysis program

mod command;
mod scanner;

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;

pub use command::CommandResolver;
pub use scanner::{exported_functions, GoSourceResolver};

/// Outcome of inspecting one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one exported entry function.
    Found(String),
    /// No exported entry function.
    NotFound,
    /// Several exported functions; none is picked.
    Ambiguous(Vec<String>),
}

impl Resolution {
    /// Build a resolution from the list of exported names.
    pub fn from_names(mut names: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        match names.len() {
            0 => Self::NotFound,
            1 => Self::Found(names.remove(0)),
            _ => Self::Ambiguous(names),
        }
    }
}

/// Finds the handler function of a candidate source file.
pub trait HandlerResolver: Send + Sync {
    /// Inspect `source` and report its exported entry function.
    fn resolve(&self, source: &Path) -> Result<Resolution>;
}

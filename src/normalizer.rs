//! The single entry point turning a raw launch string into `(image, arguments)`.
//!
//! Stages run in a fixed order: alias and variable expansion, then either the
//! ambiguous-boundary search (Windows command lines) or backslash escaping,
//! tokenizing and a direct lookup of the first word. A failure at any stage
//! is recorded in [`Normalized::failure`] next to a best-effort result; it is
//! never returned as an error.

use crate::env::{self, Environment, Flavor};
use crate::error::{ResolveError, Result};
use crate::external::{PathLookup, SearchPath};
use crate::lexer::{escape_backslashes, tokenize};
use crate::resolver::{resolve_ambiguous, resolve_direct};
use std::path::PathBuf;
use tracing::debug;

/// What a collector has to provide about its platform to normalize launch strings.
pub trait PlatformHooks {
    /// Path and variable dialect of the source.
    fn flavor(&self) -> Flavor;

    /// Value of an environment variable, if set.
    fn env_var(&self, name: &str) -> Option<String>;

    /// `PATH`-style search for an executable.
    fn look_path(&self, name: &str) -> Result<PathBuf>;

    /// Whether unquoted command lines need the ambiguous-boundary search.
    fn boundary_search(&self) -> bool {
        self.flavor() == Flavor::Windows
    }

    /// Whether backslashes must be protected from the tokenizer.
    fn escape_backslashes(&self) -> bool {
        self.flavor() == Flavor::Windows
    }
}

/// Hooks backed by an environment snapshot and the real filesystem.
#[derive(Debug, Clone)]
pub struct SystemHooks {
    env: Environment,
    search: SearchPath,
    boundary_search: bool,
}

impl SystemHooks {
    pub fn new(env: Environment) -> Self {
        let search = SearchPath::from_env(&env);
        let boundary_search = env.flavor == Flavor::Windows;
        Self {
            env,
            search,
            boundary_search,
        }
    }

    /// Hooks for the running system.
    pub fn host() -> Self {
        Self::new(Environment::new())
    }

    /// Resolve executables inside the filesystem mounted at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search = self.search.with_root(root);
        self
    }

    /// Tokenize Windows command lines instead of searching boundaries.
    pub fn without_boundary_search(mut self) -> Self {
        self.boundary_search = false;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }
}

impl PlatformHooks for SystemHooks {
    fn flavor(&self) -> Flavor {
        self.env.flavor
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get_var(name)
    }

    fn look_path(&self, name: &str) -> Result<PathBuf> {
        self.search.look_path(name)
    }

    fn boundary_search(&self) -> bool {
        self.boundary_search
    }
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub image_path: String,
    pub arguments: String,
    /// Why resolution failed, if it did. `image_path` is then a best effort.
    pub failure: Option<ResolveError>,
}

impl Normalized {
    pub fn is_resolved(&self) -> bool {
        self.failure.is_none()
    }

    fn fallback(raw: &str, failure: ResolveError) -> Self {
        debug!(raw, %failure, "launch string not resolved");
        Self {
            image_path: raw.trim().to_string(),
            arguments: String::new(),
            failure: Some(failure),
        }
    }
}

/// Normalize a raw launch string into its executable path and arguments.
///
/// Never fails: when the executable cannot be determined, `image_path` holds
/// the trimmed raw string, `arguments` is empty and `failure` says why.
pub fn normalize(raw: &str, hooks: &dyn PlatformHooks) -> Normalized {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Normalized::fallback(raw, ResolveError::EmptyLaunchString);
    }

    let flavor = hooks.flavor();
    let expanded = env::expand(trimmed, flavor, &|name| hooks.env_var(name));
    let lookup = |name: &str| hooks.look_path(name);

    if hooks.boundary_search() {
        return match resolve_ambiguous(&expanded, &lookup, flavor) {
            Ok(resolution) => Normalized {
                failure: (!resolution.resolved)
                    .then(|| ResolveError::ExecutableNotFound(resolution.executable.clone())),
                image_path: resolution.executable,
                arguments: resolution.arguments,
            },
            Err(err) => Normalized::fallback(raw, err),
        };
    }

    let line = if hooks.escape_backslashes() {
        escape_backslashes(&expanded)
    } else {
        expanded.clone()
    };
    let words = match tokenize(&line) {
        Ok(words) => words,
        Err(err) => {
            debug!(raw, error = %ResolveError::from(err), "splitting on whitespace instead");
            expanded.split_whitespace().map(str::to_string).collect()
        }
    };

    let Some((first, rest)) = words.split_first() else {
        return Normalized::fallback(raw, ResolveError::EmptyLaunchString);
    };

    match resolve_direct(first, &lookup, flavor) {
        Ok(image_path) => Normalized {
            image_path,
            arguments: rest.join(" "),
            failure: None,
        },
        Err(err) => Normalized::fallback(raw, err),
    }
}

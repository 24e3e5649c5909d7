//! Enumerate programs that are launched automatically.
//!
//! Autorun entries live in many places: registry run keys and services,
//! scheduled tasks, launchd plists, systemd units, crontabs, rc.d scripts and
//! shell startup files. Each place stores a raw launch string in its own
//! dialect. This crate collects those strings, splits them into an executable
//! and its arguments, resolves the executable against the search path and
//! fingerprints it.
//!
//! The main entry point is [`Enumerator`], which runs a set of pluggable
//! [`Collector`]s and turns what they find into [`Autorun`] records. The
//! resolution engine is available on its own through [`normalize`] and
//! [`classify_line`].

mod autorun;
mod builtin;
pub mod classifier;
pub mod collector;
pub mod env;
mod enumerator;
pub mod error;
mod external;
mod fingerprint;
mod lexer;
pub mod normalizer;
mod resolver;
pub mod users;

pub use autorun::{Autorun, AutorunType, Image, basename};
pub use classifier::{
    CommandKind, CommandLookup, Invocation, ShellCommands, classify_line, cron_command,
};
pub use collector::{Collector, Launch, RawEntry, platform_collectors};
pub use enumerator::{Enumerator, ScanOptions, autoruns};
pub use error::{FingerprintError, ResolveError};
pub use external::{PathLookup, SearchPath};
pub use fingerprint::{Fingerprint, HashAlgorithm, hash_file};
pub use lexer::{LexingError, escape_backslashes, tokenize};
pub use normalizer::{Normalized, PlatformHooks, SystemHooks, normalize};
pub use resolver::{Resolution, canonicalize, resolve_ambiguous, resolve_direct};

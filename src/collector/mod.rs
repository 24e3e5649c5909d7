//! Sources of autorun entries.
//!
//! Every persistence mechanism is a [`Collector`] that reads its configuration
//! files (or registry keys) and reports the raw launch data it finds. Turning
//! that data into [`Autorun`](crate::Autorun) records is left to the
//! enumerator, so collectors never touch the resolver or the hashes.

use crate::autorun::AutorunType;
use crate::env::Environment;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

mod bash;
mod cron;
mod launchd;
mod rcd;
mod startup;
mod systemd;
mod tasks;
#[cfg(windows)]
mod windows_registry;

pub use bash::BashCollector;
pub use cron::CronCollector;
pub use launchd::LaunchdCollector;
pub use rcd::{EnabledServices, RcdCollector, parse_rc_conf};
pub use startup::StartupFolders;
pub use systemd::SystemdCollector;
pub use tasks::ScheduledTasks;
#[cfg(windows)]
pub use windows_registry::{RunKeys, Services};

/// How a source describes the program it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// A full command line that still has to be split and resolved.
    CommandLine(String),
    /// A file that is itself the program.
    Path(String),
    /// An argument vector whose first element is the program.
    Argv(Vec<String>),
    /// A program with its arguments stored separately.
    Split { command: String, arguments: String },
    /// A shell-script line, which may start several programs.
    ShellLine(String),
}

/// One entry as found at its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub kind: AutorunType,
    pub location: String,
    pub entry: String,
    pub launch: Launch,
}

impl RawEntry {
    pub fn new(
        kind: AutorunType,
        location: impl Into<String>,
        entry: impl Into<String>,
        launch: Launch,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            entry: entry.into(),
            launch,
        }
    }

    /// Line `number` (1-based) of a script, recorded with entry `line <number>`.
    pub fn script_line(
        kind: AutorunType,
        location: impl Into<String>,
        number: usize,
        line: impl Into<String>,
    ) -> Self {
        Self::new(kind, location, format!("line {number}"), Launch::ShellLine(line.into()))
    }
}

/// A persistence mechanism that can be enumerated.
///
/// A collector fails as a whole only when its source cannot be read at all;
/// problems with single files are logged and skipped.
pub trait Collector {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn collect(&self) -> Result<Vec<RawEntry>>;
}

/// Join an absolute path of the scanned system onto `root`.
pub(crate) fn under_root(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    root.join(path.strip_prefix("/").unwrap_or(path))
}

/// Regular files directly inside `dir`, sorted by name. A missing directory
/// yields nothing.
pub(crate) fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "directory not present");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let listing =
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in listing {
        let path = entry.with_context(|| format!("failed to list {}", dir.display()))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Collectors for the running platform, reading the system mounted at `root`.
pub fn platform_collectors(root: &Path, env: &Environment) -> Vec<Box<dyn Collector>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();

    #[cfg(windows)]
    {
        let _ = root;
        collectors.push(Box::new(RunKeys));
        collectors.push(Box::new(Services));
        collectors.push(Box::new(StartupFolders::from_env(env)));
        collectors.push(Box::new(ScheduledTasks::from_env(env)));
    }

    #[cfg(target_os = "macos")]
    {
        let _ = env;
        collectors.push(Box::new(LaunchdCollector::new(root)));
    }

    #[cfg(target_os = "linux")]
    {
        let _ = env;
        collectors.push(Box::new(SystemdCollector::new(root)));
        collectors.push(Box::new(CronCollector::new(root)));
        collectors.push(Box::new(BashCollector::new(root)));
    }

    #[cfg(target_os = "freebsd")]
    {
        let _ = env;
        collectors.push(Box::new(RcdCollector::new(root)));
    }

    #[cfg(not(any(windows, target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        let _ = (root, env);
    }

    collectors
}

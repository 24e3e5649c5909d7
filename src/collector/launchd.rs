//! macOS launch daemons and agents.

use super::{Collector, Launch, RawEntry, files_in, under_root};
use crate::autorun::AutorunType;
use anyhow::{Context, Result};
use plist::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LAUNCH_DAEMONS: [&str; 2] = ["/Library/LaunchDaemons", "/System/Library/LaunchDaemons"];
const LAUNCH_AGENTS: [&str; 2] = ["/Library/LaunchAgents", "/System/Library/LaunchAgents"];

pub struct LaunchdCollector {
    root: PathBuf,
}

impl LaunchdCollector {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// `(directory, type)` pairs to scan, including every user's agents.
    fn folders(&self) -> Result<Vec<(PathBuf, AutorunType)>> {
        let mut folders: Vec<(PathBuf, AutorunType)> = LAUNCH_DAEMONS
            .iter()
            .map(|dir| (under_root(&self.root, dir), AutorunType::LaunchDaemons))
            .chain(
                LAUNCH_AGENTS
                    .iter()
                    .map(|dir| (under_root(&self.root, dir), AutorunType::LaunchAgents)),
            )
            .collect();

        let users = under_root(&self.root, "/Users");
        if users.is_dir() {
            let mut homes = Vec::new();
            let listing = fs::read_dir(&users)
                .with_context(|| format!("failed to list {}", users.display()))?;
            for entry in listing {
                let path = entry?.path();
                if path.is_dir() {
                    homes.push(path.join("Library/LaunchAgents"));
                }
            }
            homes.sort();
            folders.extend(homes.into_iter().map(|dir| (dir, AutorunType::LaunchAgentsUser)));
        }
        Ok(folders)
    }
}

impl Collector for LaunchdCollector {
    fn name(&self) -> &'static str {
        "launchd"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        for (dir, kind) in self.folders()? {
            for path in files_in(&dir)? {
                match parse_job(&path) {
                    Ok(Some(job)) => entries.push(RawEntry::new(
                        kind,
                        path.display().to_string(),
                        job.label,
                        Launch::Argv(job.program_arguments),
                    )),
                    Ok(None) => {}
                    Err(err) => {
                        debug!(plist = %path.display(), err = %format!("{err:#}"), "plist skipped")
                    }
                }
            }
        }
        Ok(entries)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Job {
    label: String,
    program_arguments: Vec<String>,
}

/// The job in a launchd plist, if it runs at load and names a program.
fn parse_job(path: &Path) -> Result<Option<Job>> {
    let value =
        Value::from_file(path).with_context(|| format!("failed to parse {}", path.display()))?;
    let Some(dict) = value.as_dictionary() else {
        return Ok(None);
    };

    let run_at_load = dict.get("RunAtLoad").and_then(Value::as_boolean).unwrap_or(false);
    if !run_at_load {
        return Ok(None);
    }

    let mut program_arguments: Vec<String> = dict
        .get("ProgramArguments")
        .and_then(Value::as_array)
        .map(|args| args.iter().filter_map(Value::as_string).map(str::to_string).collect())
        .unwrap_or_default();
    if program_arguments.is_empty() {
        match dict.get("Program").and_then(Value::as_string) {
            Some(program) => program_arguments.push(program.to_string()),
            None => return Ok(None),
        }
    }

    let label = dict
        .get("Label")
        .and_then(Value::as_string)
        .unwrap_or_default()
        .to_string();
    Ok(Some(Job {
        label,
        program_arguments,
    }))
}

//! systemd service units and D-Bus system service activation files.

use super::{Collector, Launch, RawEntry, files_in, under_root};
use crate::autorun::AutorunType;
use anyhow::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

const UNIT_DIRS: [&str; 2] = ["/etc/systemd/system/", "/usr/share/dbus-1/system-services/"];

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[(.*)\]\s*$").expect("section pattern is valid"));

pub struct SystemdCollector {
    dirs: Vec<PathBuf>,
}

impl SystemdCollector {
    pub fn new(root: &Path) -> Self {
        Self {
            dirs: UNIT_DIRS.iter().map(|dir| under_root(root, dir)).collect(),
        }
    }
}

impl Collector for SystemdCollector {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        for dir in &self.dirs {
            for path in files_in(dir)? {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !name.ends_with(".service") {
                    continue;
                }
                let content = match fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(err) => {
                        debug!(unit = %path.display(), %err, "unit skipped");
                        continue;
                    }
                };
                let location = path.display().to_string();
                entries.extend(exec_lines(&content).into_iter().map(|command| {
                    let launch = Launch::CommandLine(command);
                    RawEntry::new(AutorunType::Systemd, &location, name, launch)
                }));
            }
        }
        Ok(entries)
    }
}

/// Commands started by a unit: `ExecStart=` in `[Service]` and `Exec=` in
/// `[D-BUS Service]`, with executable prefixes removed.
fn exec_lines(unit: &str) -> Vec<String> {
    let mut section = String::new();
    let mut commands = Vec::new();

    for line in unit.lines() {
        if let Some(caps) = SECTION.captures(line) {
            section = caps[1].to_string();
            continue;
        }
        let key = match section.as_str() {
            "Service" => "ExecStart=",
            "D-BUS Service" => "Exec=",
            _ => continue,
        };
        let Some(value) = line.trim_start().strip_prefix(key) else {
            continue;
        };
        let command = strip_exec_prefixes(value.trim());
        if !command.is_empty() {
            commands.push(command.to_string());
        }
    }
    commands
}

/// Removes the special characters systemd allows before the executable path.
fn strip_exec_prefixes(command: &str) -> &str {
    let mut command = command;
    loop {
        if let Some(rest) = command.strip_prefix("!!") {
            command = rest;
        } else if let Some(rest) = command.strip_prefix(['@', '-', ':', '+', '!']) {
            command = rest;
        } else {
            return command;
        }
    }
}

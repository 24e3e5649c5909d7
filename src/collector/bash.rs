//! Shell startup files read at login.

use super::{Collector, RawEntry, files_in, under_root};
use crate::autorun::AutorunType;
use crate::users::read_passwd;
use anyhow::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

const SYSTEM_FILES: [&str; 2] = ["/etc/profile", "/etc/bash.bashrc"];
const LOGIN_FILES: [&str; 3] = [".profile", ".bash_profile", ".bash_login"];

static RC_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\..*rc$").expect("rc file pattern is valid"));

pub struct BashCollector {
    root: PathBuf,
}

impl BashCollector {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Startup files in the home directories of users who can log in.
    fn home_files(&self) -> Vec<PathBuf> {
        let users = match read_passwd(&self.root) {
            Ok(users) => users,
            Err(err) => {
                debug!(%err, "home directories not scanned");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for user in users.iter().filter(|user| user.is_login_shell()) {
            let home = under_root(&self.root, &user.home);
            let listing = match files_in(&home) {
                Ok(listing) => listing,
                Err(err) => {
                    debug!(user = %user.name, err = %format!("{err:#}"), "home directory skipped");
                    continue;
                }
            };
            files.extend(listing.into_iter().filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_startup_file)
            }));
        }
        files
    }
}

fn is_startup_file(name: &str) -> bool {
    RC_FILE.is_match(name) || LOGIN_FILES.contains(&name)
}

impl Collector for BashCollector {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let mut paths: Vec<PathBuf> = SYSTEM_FILES
            .iter()
            .map(|file| under_root(&self.root, file))
            .filter(|path| path.is_file())
            .collect();
        paths.extend(self.home_files());

        let mut entries = Vec::new();
        for path in paths {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    debug!(script = %path.display(), %err, "startup file skipped");
                    continue;
                }
            };
            let location = path.display().to_string();
            entries.extend(
                content
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| {
                        RawEntry::script_line(AutorunType::Bash, &location, i + 1, line)
                    }),
            );
        }
        Ok(entries)
    }
}

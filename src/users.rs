//! Local accounts from `/etc/passwd`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub name: String,
    pub home: PathBuf,
    pub shell: String,
}

impl UserAccount {
    /// Whether the account can log in interactively.
    pub fn is_login_shell(&self) -> bool {
        is_login_shell(&self.shell)
    }
}

/// Shells such as `nologin` and `false` refuse interactive logins.
pub fn is_login_shell(shell: &str) -> bool {
    let program = shell.rsplit('/').next().unwrap_or_default();
    !shell.is_empty() && !matches!(program, "nologin" | "false")
}

/// Read the accounts of the system mounted at `root`.
pub fn read_passwd(root: &Path) -> Result<Vec<UserAccount>> {
    let path = root.join("etc/passwd");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_passwd(&content))
}

/// Parse passwd lines, ignoring comments and malformed entries.
pub fn parse_passwd(content: &str) -> Vec<UserAccount> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 || fields[0].is_empty() {
                return None;
            }
            Some(UserAccount {
                name: fields[0].to_string(),
                home: PathBuf::from(fields[5]),
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

//! FreeBSD rc.d services enabled in `rc.conf`.

use super::{Collector, Launch, RawEntry, files_in, under_root};
use crate::autorun::AutorunType;
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

const RC_CONF_FILES: [&str; 2] = ["/etc/rc.conf", "/etc/rc.conf.local"];
const SCRIPT_DIRS: [(&str, AutorunType); 2] = [
    ("/etc/rc.d", AutorunType::RcD),
    ("/usr/local/etc/rc.d", AutorunType::LocalRcD),
];

static ENABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\w+)_enable=("?)(?i:yes)("?)$"#).expect("enable pattern is valid")
});
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^name=(\w+)$").expect("name pattern is valid"));

/// Service names switched on with `<name>_enable="YES"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledServices(BTreeSet<String>);

impl EnabledServices {
    pub fn contains(&self, service: &str) -> bool {
        self.0.contains(service)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for EnabledServices {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read the enabled services from the rc.conf files of the system at `root`.
pub fn parse_rc_conf(root: &Path) -> EnabledServices {
    RC_CONF_FILES
        .iter()
        .map(|file| under_root(root, file))
        .filter_map(|path| match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(err) => {
                debug!(conf = %path.display(), %err, "rc.conf skipped");
                None
            }
        })
        .flat_map(|content| enabled_in(&content))
        .collect()
}

fn enabled_in(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let caps = ENABLE.captures(line.trim())?;
            // Quotes must be balanced.
            (caps[2] == caps[3]).then(|| caps[1].to_string())
        })
        .collect()
}

/// Service name declared by an rc.d script.
fn script_service_name(script: &str) -> Option<String> {
    script.lines().find_map(|line| {
        let line = line.trim().replace(['"', '\''], "");
        NAME.captures(&line).map(|caps| caps[1].to_string())
    })
}

pub struct RcdCollector {
    root: PathBuf,
}

impl RcdCollector {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Collector for RcdCollector {
    fn name(&self) -> &'static str {
        "rc.d"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let enabled = parse_rc_conf(&self.root);
        if enabled.is_empty() {
            debug!("no services enabled in rc.conf");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for (dir, kind) in SCRIPT_DIRS {
            for path in files_in(&under_root(&self.root, dir))? {
                let Ok(script) = fs::read_to_string(&path) else {
                    debug!(script = %path.display(), "rc.d script unreadable");
                    continue;
                };
                let Some(service) = script_service_name(&script) else {
                    continue;
                };
                if enabled.contains(&service) {
                    let location = path.display().to_string();
                    let launch = Launch::Path(location.clone());
                    entries.push(RawEntry::new(kind, &location, service, launch));
                }
            }
        }
        Ok(entries)
    }
}

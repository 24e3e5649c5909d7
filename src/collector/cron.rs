//! System and per-user crontabs.

use super::{Collector, RawEntry, files_in, under_root};
use crate::autorun::AutorunType;
use crate::classifier::cron_command;
use crate::users::read_passwd;
use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const USER_CRONTAB_DIRS: [&str; 2] = ["/var/spool/cron/crontabs", "/var/spool/cron"];

pub struct CronCollector {
    root: PathBuf,
}

impl CronCollector {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn usernames(&self) -> HashSet<String> {
        match read_passwd(&self.root) {
            Ok(users) => users.into_iter().map(|user| user.name).collect(),
            Err(err) => {
                debug!(%err, "no usernames for crontab parsing");
                HashSet::new()
            }
        }
    }
}

impl Collector for CronCollector {
    fn name(&self) -> &'static str {
        "cron"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let usernames = self.usernames();
        let is_user = |name: &str| usernames.contains(name);
        let mut entries = Vec::new();

        let crontab = under_root(&self.root, "/etc/crontab");
        if crontab.is_file() {
            let location = crontab.display().to_string();
            entries.extend(crontab_entries(&crontab, AutorunType::Cron, &location, &is_user));
        }

        for dir in USER_CRONTAB_DIRS {
            for path in files_in(&under_root(&self.root, dir))? {
                let Some(user) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let location = format!("crontab {user}");
                // User crontabs have no user field.
                let no_user = |_: &str| false;
                entries.extend(crontab_entries(&path, AutorunType::Cron, &location, &no_user));
            }
        }

        for path in files_in(&under_root(&self.root, "/etc/cron.d"))? {
            let location = path.display().to_string();
            entries.extend(crontab_entries(&path, AutorunType::Crond, &location, &is_user));
        }

        Ok(entries)
    }
}

fn crontab_entries(
    path: &Path,
    kind: AutorunType,
    location: &str,
    is_user: &dyn Fn(&str) -> bool,
) -> Vec<RawEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            debug!(crontab = %path.display(), %err, "crontab skipped");
            return Vec::new();
        }
    };

    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let command = cron_command(line, is_user)?;
            Some(RawEntry::script_line(kind, location, i + 1, command))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Launch;

    fn write(root: &Path, path: &str, content: &str) -> PathBuf {
        let path = under_root(root, path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn lines(entries: &[RawEntry]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|e| match &e.launch {
                Launch::ShellLine(line) => (e.location.as_str(), line.as_str()),
                other => panic!("unexpected launch {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_system_crontab_user_field() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "/etc/passwd", "root:x:0:0:root:/root:/bin/bash\n");
        let crontab = write(
            root.path(),
            "/etc/crontab",
            "SHELL=/bin/sh\n# m h dom mon dow user command\n\
             17 * * * * root cd / && run-parts --report /etc/cron.hourly\n",
        );

        let location = crontab.display().to_string();

        let entries = CronCollector::new(root.path()).collect().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AutorunType::Cron);
        assert_eq!(entries[0].entry, "line 3");
        assert_eq!(
            lines(&entries),
            vec![(location.as_str(), "cd / && run-parts --report /etc/cron.hourly")]
        );
    }

    #[test]
    fn test_user_crontabs() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "/etc/passwd", "alice:x:1000:1000::/home/alice:/bin/bash\n");
        write(
            root.path(),
            "/var/spool/cron/crontabs/alice",
            "@reboot /home/alice/bin/sync\n*/5 * * * * alice-task --now\n",
        );

        let entries = CronCollector::new(root.path()).collect().unwrap();
        assert_eq!(
            lines(&entries),
            vec![
                ("crontab alice", "/home/alice/bin/sync"),
                ("crontab alice", "alice-task --now"),
            ]
        );
    }

    #[test]
    fn test_user_crontab_field_six_is_command() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "/etc/passwd", "root:x:0:0:root:/root:/bin/bash\n");
        write(root.path(), "/var/spool/cron/root", "0 0 * * * root-backup.sh\n");

        let entries = CronCollector::new(root.path()).collect().unwrap();
        assert_eq!(lines(&entries), vec![("crontab root", "root-backup.sh")]);
    }

    #[test]
    fn test_cron_d_files() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "/etc/passwd", "root:x:0:0:root:/root:/bin/bash\n");
        write(
            root.path(),
            "/etc/cron.d/e2scrub",
            "30 3 * * 0 root test -e /run/systemd/system || /sbin/e2scrub_all\n",
        );

        let entries = CronCollector::new(root.path()).collect().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AutorunType::Crond);
        assert_eq!(entries[0].entry, "line 1");
    }

    #[test]
    fn test_nothing_present() {
        let root = tempfile::tempdir().unwrap();
        assert!(CronCollector::new(root.path()).collect().unwrap().is_empty());
    }
}

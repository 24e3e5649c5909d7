//! Windows Start Menu startup folders.

use super::{Collector, Launch, RawEntry, files_in};
use crate::autorun::AutorunType;
use crate::env::Environment;
use anyhow::Result;
use std::path::PathBuf;

const STARTUP_SUBDIR: &str = r"Microsoft\Windows\Start Menu\Programs\StartUp";

pub struct StartupFolders {
    folders: Vec<PathBuf>,
}

impl StartupFolders {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self { folders }
    }

    /// The all-users folder under `%ProgramData%` and the current user's
    /// under `%AppData%`.
    pub fn from_env(env: &Environment) -> Self {
        let folders = ["ProgramData", "AppData"]
            .iter()
            .filter_map(|var| env.get_var(var))
            .map(|base| PathBuf::from(format!(r"{base}\{STARTUP_SUBDIR}")))
            .collect();
        Self::new(folders)
    }
}

impl Collector for StartupFolders {
    fn name(&self) -> &'static str {
        "startup"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        for folder in &self.folders {
            let location = folder.display().to_string();
            for path in files_in(folder)? {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.eq_ignore_ascii_case("desktop.ini") {
                    continue;
                }
                entries.push(RawEntry::new(
                    AutorunType::Startup,
                    &location,
                    name,
                    Launch::Path(path.display().to_string()),
                ));
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Flavor;
    use std::fs;

    #[test]
    fn test_from_env() {
        let env = Environment::with_vars(
            Flavor::Windows,
            [(r"ProgramData", r"C:\ProgramData"), ("APPDATA", r"C:\Users\a\AppData\Roaming")],
        );
        let startup = StartupFolders::from_env(&env);
        assert_eq!(
            startup.folders,
            vec![
                PathBuf::from(r"C:\ProgramData\Microsoft\Windows\Start Menu\Programs\StartUp"),
                PathBuf::from(
                    r"C:\Users\a\AppData\Roaming\Microsoft\Windows\Start Menu\Programs\StartUp"
                ),
            ]
        );
    }

    #[test]
    fn test_collect_skips_desktop_ini() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("desktop.ini"), "").unwrap();
        fs::write(dir.path().join("Updater.lnk"), "").unwrap();

        let entries = StartupFolders::new(vec![dir.path().to_path_buf()]).collect().unwrap();
        let location = dir.path().display().to_string();
        assert_eq!(
            entries,
            vec![RawEntry::new(
                AutorunType::Startup,
                &location,
                "Updater.lnk",
                Launch::Path(dir.path().join("Updater.lnk").display().to_string()),
            )]
        );
    }
}

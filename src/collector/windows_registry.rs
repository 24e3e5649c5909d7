//! Run keys and services in the Windows registry.

use super::{Collector, Launch, RawEntry};
use crate::autorun::AutorunType;
use anyhow::{Context, Result};
use tracing::debug;
use winreg::RegKey;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ};

const RUN_KEYS: [&str; 4] = [
    r"Software\Microsoft\Windows\CurrentVersion\Run",
    r"Software\Microsoft\Windows\CurrentVersion\RunOnce",
    r"Software\Wow6432Node\Microsoft\Windows\CurrentVersion\Run",
    r"Software\Wow6432Node\Microsoft\Windows\CurrentVersion\RunOnce",
];

const SERVICES_KEY: &str = r"System\CurrentControlSet\Services";

/// Hives searched for run keys, with the names used in locations.
fn hives() -> [(RegKey, &'static str); 2] {
    [
        (RegKey::predef(HKEY_LOCAL_MACHINE), "LOCAL_MACHINE"),
        (RegKey::predef(HKEY_CURRENT_USER), "CURRENT_USER"),
    ]
}

/// `CurrentVersion\Run` and `RunOnce` values of both hives.
pub struct RunKeys;

impl Collector for RunKeys {
    fn name(&self) -> &'static str {
        "run_keys"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        for (hive, hive_name) in hives() {
            for key_name in RUN_KEYS {
                let key = match hive.open_subkey_with_flags(key_name, KEY_READ) {
                    Ok(key) => key,
                    Err(err) => {
                        debug!(key = %format!(r"{hive_name}\{key_name}"), %err, "run key skipped");
                        continue;
                    }
                };
                let location = format!(r"{hive_name}\{key_name}");
                for (name, _) in key.enum_values().filter_map(|value| value.ok()) {
                    let Ok(command) = key.get_value::<String, _>(&name) else {
                        continue;
                    };
                    if command.is_empty() {
                        continue;
                    }
                    entries.push(RawEntry::new(
                        AutorunType::RunKey,
                        &location,
                        name,
                        Launch::CommandLine(command),
                    ));
                }
            }
        }
        Ok(entries)
    }
}

/// `ImagePath` of every service under `HKLM\System\CurrentControlSet\Services`.
pub struct Services;

impl Collector for Services {
    fn name(&self) -> &'static str {
        "services"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        let services = hklm
            .open_subkey_with_flags(SERVICES_KEY, KEY_READ)
            .with_context(|| format!(r"failed to open LOCAL_MACHINE\{SERVICES_KEY}"))?;

        let mut entries = Vec::new();
        for name in services.enum_keys().filter_map(|name| name.ok()) {
            let Ok(service) = services.open_subkey_with_flags(&name, KEY_READ) else {
                continue;
            };
            let Ok(image_path) = service.get_value::<String, _>("ImagePath") else {
                continue;
            };
            entries.push(RawEntry::new(
                AutorunType::Service,
                format!(r"LOCAL_MACHINE\{SERVICES_KEY}\{name}"),
                "",
                Launch::CommandLine(image_path),
            ));
        }
        Ok(entries)
    }
}

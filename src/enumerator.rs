use crate::autorun::{Autorun, AutorunType, Image};
use crate::classifier::{CommandLookup, ShellCommands, classify_line};
use crate::collector::{Collector, Launch, RawEntry, platform_collectors};
use crate::fingerprint::Fingerprint;
use crate::normalizer::{PlatformHooks, SystemHooks, normalize};
use crate::resolver::canonicalize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What to scan and how much work to do per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Root of the filesystem to read configuration files from.
    pub root: PathBuf,
    /// Compute MD5/SHA1/SHA256 of resolved images.
    pub hash: bool,
    /// Only report these types. Empty means all.
    pub types: Vec<AutorunType>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            hash: true,
            types: Vec::new(),
        }
    }
}

impl ScanOptions {
    fn wants(&self, kind: AutorunType) -> bool {
        self.types.is_empty() || self.types.contains(&kind)
    }
}

/// Runs every collector and turns what they find into [`Autorun`] records.
///
/// The enumerator owns the collectors for the platform together with the
/// hooks used to resolve launch strings. See [`Default`] for the set used on
/// the running system.
///
/// Example
/// ```no_run
/// use autoruns::Enumerator;
/// for autorun in Enumerator::default().run() {
///     println!("{} {}", autorun.kind(), autorun.image_path());
/// }
/// ```
pub struct Enumerator {
    collectors: Vec<Box<dyn Collector>>,
    hooks: Box<dyn PlatformHooks>,
    commands: Box<dyn CommandLookup>,
    options: ScanOptions,
}

impl Enumerator {
    /// Create an enumerator with a custom set of collectors and lookups.
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        hooks: Box<dyn PlatformHooks>,
        commands: Box<dyn CommandLookup>,
        options: ScanOptions,
    ) -> Self {
        Self {
            collectors,
            hooks,
            commands,
            options,
        }
    }

    /// The platform's collectors, reading the system mounted at `options.root`.
    ///
    /// Commands are resolved and hashed inside that root too, using the
    /// running system's `PATH`.
    pub fn with_options(options: ScanOptions) -> Self {
        let mut hooks = SystemHooks::host();
        let mut commands = ShellCommands::new(hooks.environment().clone());
        if options.root != Path::new("/") {
            hooks = hooks.with_root(&options.root);
            commands = commands.with_root(&options.root);
        }
        let collectors = platform_collectors(&options.root, hooks.environment());
        Self::new(collectors, Box::new(hooks), Box::new(commands), options)
    }

    /// Visit every collector in order and return the records in discovery order.
    ///
    /// A collector that fails is logged and skipped.
    pub fn run(&self) -> Vec<Autorun> {
        let mut records = Vec::new();
        for collector in &self.collectors {
            let entries = match collector.collect() {
                Ok(entries) => entries,
                Err(err) => {
                    let err = format!("{err:#}");
                    warn!(collector = collector.name(), %err, "collector failed");
                    continue;
                }
            };
            debug!(collector = collector.name(), entries = entries.len(), "collected");

            for entry in entries.into_iter().filter(|e| self.options.wants(e.kind)) {
                records.extend(self.convert(entry));
            }
        }
        records
    }

    /// Zero or more records for one raw entry. Script lines can launch several
    /// programs or none.
    fn convert(&self, raw: RawEntry) -> Vec<Autorun> {
        let RawEntry {
            kind,
            location,
            entry,
            launch,
        } = raw;

        let images: Vec<(String, Image)> = match launch {
            Launch::CommandLine(command_line) => {
                let image = self.normalized(&command_line);
                vec![(command_line, image)]
            }
            Launch::Path(path) => {
                let image = Image {
                    resolved: Path::new(&path).is_file(),
                    path: path.clone(),
                    arguments: String::new(),
                };
                vec![(path, image)]
            }
            Launch::Argv(argv) => match argv.split_first() {
                Some((program, rest)) => vec![(argv.join(" "), self.argv_image(program, rest))],
                None => Vec::new(),
            },
            Launch::Split { command, arguments } => {
                let launch_string = if arguments.is_empty() {
                    command.clone()
                } else {
                    format!("{command} {arguments}")
                };
                vec![(launch_string, self.split_image(&command, &arguments))]
            }
            Launch::ShellLine(line) => classify_line(&line, &*self.commands)
                .into_iter()
                .map(|invocation| {
                    let image = Image {
                        path: invocation.image_path,
                        arguments: invocation.arguments,
                        resolved: true,
                    };
                    (line.clone(), image)
                })
                .collect(),
        };

        images
            .into_iter()
            .map(|(launch_string, image)| {
                let fingerprint = if self.options.hash && image.resolved {
                    Fingerprint::of(Path::new(&image.path))
                } else {
                    Fingerprint::default()
                };
                Autorun::new(kind, &location, &entry, launch_string, image, fingerprint)
            })
            .collect()
    }

    fn normalized(&self, command_line: &str) -> Image {
        let normalized = normalize(command_line, &*self.hooks);
        Image {
            resolved: normalized.is_resolved(),
            path: normalized.image_path,
            arguments: normalized.arguments,
        }
    }

    fn argv_image(&self, program: &str, rest: &[String]) -> Image {
        let arguments = rest.join(" ");
        match self.hooks.look_path(program) {
            Ok(path) => Image {
                path: canonicalize(&path.to_string_lossy(), self.hooks.flavor()),
                arguments,
                resolved: true,
            },
            Err(err) => {
                debug!(program, %err, "program not resolved");
                Image {
                    path: program.to_string(),
                    arguments,
                    resolved: false,
                }
            }
        }
    }

    /// The command is resolved on its own so spaces in it never split it;
    /// its own arguments come before the separate ones.
    fn split_image(&self, command: &str, arguments: &str) -> Image {
        let command = command.trim();
        let quoted = if command.starts_with('"') {
            command.to_string()
        } else {
            format!("\"{command}\"")
        };
        let mut image = self.normalized(&quoted);
        image.arguments = [image.arguments.as_str(), arguments.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        image
    }
}

impl Default for Enumerator {
    /// Collectors for the running platform over the whole filesystem, with
    /// hashing enabled.
    fn default() -> Self {
        Self::with_options(ScanOptions::default())
    }
}

/// Enumerate the autoruns of the running system.
pub fn autoruns() -> Vec<Autorun> {
    Enumerator::default().run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CommandKind;
    use crate::env::Flavor;
    use crate::error::{ResolveError, Result};
    use anyhow::anyhow;
    use std::fs;

    struct StaticCollector(Vec<RawEntry>);

    impl Collector for StaticCollector {
        fn name(&self) -> &'static str {
            "static"
        }

        fn collect(&self) -> anyhow::Result<Vec<RawEntry>> {
            Ok(self.0.clone())
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn collect(&self) -> anyhow::Result<Vec<RawEntry>> {
            Err(anyhow!("permission denied"))
        }
    }

    /// Hooks resolving only the files in `files`.
    struct FakeHooks {
        flavor: Flavor,
        files: Vec<String>,
    }

    impl PlatformHooks for FakeHooks {
        fn flavor(&self) -> Flavor {
            self.flavor
        }

        fn env_var(&self, name: &str) -> Option<String> {
            (name.eq_ignore_ascii_case("SystemRoot")).then(|| r"C:\Windows".to_string())
        }

        fn look_path(&self, name: &str) -> Result<PathBuf> {
            self.files
                .iter()
                .find(|f| f.eq_ignore_ascii_case(name) || f.ends_with(&format!("/{name}")))
                .map(PathBuf::from)
                .ok_or_else(|| ResolveError::ExecutableNotFound(name.to_string()))
        }
    }

    fn fake_commands(name: &str) -> CommandKind {
        match name {
            "echo" => CommandKind::Builtin,
            "/usr/bin/foo" | "/usr/bin/bar" => CommandKind::Executable(PathBuf::from(name)),
            _ => CommandKind::Unknown,
        }
    }

    fn enumerator(
        flavor: Flavor,
        files: &[&str],
        entries: Vec<RawEntry>,
        options: ScanOptions,
    ) -> Enumerator {
        Enumerator::new(
            vec![Box::new(FailingCollector), Box::new(StaticCollector(entries))],
            Box::new(FakeHooks {
                flavor,
                files: files.iter().map(|f| f.to_string()).collect(),
            }),
            Box::new(fake_commands),
            options,
        )
    }

    fn no_hash() -> ScanOptions {
        ScanOptions {
            hash: false,
            ..ScanOptions::default()
        }
    }

    #[test]
    fn test_windows_service_command_line() {
        let raw = RawEntry::new(
            AutorunType::Service,
            r"LOCAL_MACHINE\System\CurrentControlSet\Services\x",
            "",
            Launch::CommandLine(r"\SystemRoot\System32\svchost.exe -k netsvcs".to_string()),
        );
        let svchost = r"C:\Windows\System32\svchost.exe";
        let records = enumerator(Flavor::Windows, &[svchost], vec![raw], no_hash()).run();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.image_path(), r"C:\Windows\System32\svchost.exe");
        assert_eq!(record.image_name(), "svchost.exe");
        assert_eq!(record.arguments(), "-k netsvcs");
        assert_eq!(record.launch_string(), r"\SystemRoot\System32\svchost.exe -k netsvcs");
        assert!(record.is_resolved());
    }

    #[test]
    fn test_unresolved_command_line_is_kept() {
        let raw = RawEntry::new(
            AutorunType::RunKey,
            "CURRENT_USER\\Run",
            "x",
            Launch::CommandLine("doesnotexist".to_string()),
        );
        let records = enumerator(Flavor::Posix, &[], vec![raw], ScanOptions::default()).run();
        assert_eq!(records[0].image_path(), "doesnotexist");
        assert_eq!(records[0].arguments(), "");
        assert!(!records[0].is_resolved());
        assert!(records[0].md5().is_none());
    }

    #[test]
    fn test_argv_image() {
        let raw = RawEntry::new(
            AutorunType::LaunchAgents,
            "/Library/LaunchAgents/a.plist",
            "com.a",
            Launch::Argv(vec!["/usr/local/bin/a".to_string(), "--x".to_string(), "1".to_string()]),
        );
        let records = enumerator(Flavor::Posix, &["/usr/local/bin/a"], vec![raw], no_hash()).run();

        assert_eq!(records[0].image_path(), "/usr/local/bin/a");
        assert_eq!(records[0].image_name(), "a");
        assert_eq!(records[0].arguments(), "--x 1");
        assert_eq!(records[0].launch_string(), "/usr/local/bin/a --x 1");
        assert_eq!(records[0].entry(), "com.a");
    }

    #[test]
    fn test_split_command_keeps_spaces() {
        let raw = RawEntry::new(
            AutorunType::Task,
            r"\Vendor\Update",
            "Update",
            Launch::Split {
                command: r"C:\Program Files\Vendor\up.exe".to_string(),
                arguments: "/quiet".to_string(),
            },
        );
        let up = r"C:\Program Files\Vendor\up.exe";
        let records = enumerator(Flavor::Windows, &[up], vec![raw], no_hash()).run();

        assert_eq!(records[0].image_path(), r"C:\Program Files\Vendor\up.exe");
        assert_eq!(records[0].arguments(), "/quiet");
        assert_eq!(records[0].launch_string(), r"C:\Program Files\Vendor\up.exe /quiet");
        assert!(records[0].is_resolved());
    }

    #[test]
    fn test_split_quoted_command_with_own_arguments() {
        let raw = RawEntry::new(
            AutorunType::Task,
            r"\Cleanup",
            "Cleanup",
            Launch::Split {
                command: r#""C:\Tools\clean.exe" -v"#.to_string(),
                arguments: "--all".to_string(),
            },
        );
        let records = enumerator(Flavor::Windows, &[], vec![raw], no_hash()).run();

        assert_eq!(records[0].image_path(), r"C:\Tools\clean.exe");
        assert_eq!(records[0].arguments(), "-v --all");
        assert!(!records[0].is_resolved());
    }

    #[test]
    fn test_shell_line_yields_one_record_per_program() {
        let line = "/usr/bin/foo -a && echo done; /usr/bin/bar # nightly";
        let raw = RawEntry::script_line(AutorunType::Cron, "crontab alice", 2, line);
        let records = enumerator(Flavor::Posix, &[], vec![raw], no_hash()).run();

        let images: Vec<(&str, &str)> =
            records.iter().map(|r| (r.image_path(), r.arguments())).collect();
        assert_eq!(images, vec![("/usr/bin/foo", "-a"), ("/usr/bin/bar", "")]);
        assert!(
            records
                .iter()
                .all(|r| r.entry() == "line 2" && r.location() == "crontab alice")
        );
        assert_eq!(records[1].launch_string(), line);
    }

    #[test]
    fn test_type_filter() {
        let entries = vec![
            RawEntry::new(
                AutorunType::Systemd,
                "a.service",
                "a.service",
                Launch::CommandLine("/bin/a".to_string()),
            ),
            RawEntry::script_line(AutorunType::Bash, "/etc/profile", 1, "/usr/bin/foo"),
        ];
        let options = ScanOptions {
            types: vec![AutorunType::Bash],
            ..no_hash()
        };
        let records = enumerator(Flavor::Posix, &["/bin/a"], entries, options).run();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), AutorunType::Bash);
    }

    #[test]
    fn test_path_entries_are_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sshd");
        fs::write(&script, "hello world").unwrap();
        let script = script.display().to_string();

        let entries = vec![
            RawEntry::new(AutorunType::RcD, &script, "sshd", Launch::Path(script.clone())),
            RawEntry::new(
                AutorunType::Startup,
                "x",
                "gone.lnk",
                Launch::Path("/no/such/gone.lnk".to_string()),
            ),
        ];
        let records = enumerator(Flavor::Posix, &[], entries, ScanOptions::default()).run();

        assert_eq!(records[0].image_name(), "sshd");
        assert!(records[0].is_resolved());
        assert_eq!(records[0].md5(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(!records[1].is_resolved());
        assert_eq!(records[1].sha256(), None);
    }

    #[test]
    fn test_failing_collector_is_skipped() {
        let records = enumerator(Flavor::Posix, &[], Vec::new(), no_hash()).run();
        assert!(records.is_empty());
    }
}

use crate::collector::under_root;
use crate::env::{Environment, Flavor};
use crate::error::{ResolveError, Result};
use std::path::{Path, PathBuf};

/// Resolves a command name to the file that would be executed.
///
/// Implemented by [`SearchPath`] for the real filesystem and by any closure
/// `Fn(&str) -> Result<PathBuf>`, which is how tests fake a filesystem.
pub trait PathLookup {
    /// Look `name` up the way the platform's process launcher would.
    fn look_path(&self, name: &str) -> Result<PathBuf>;
}

impl<F> PathLookup for F
where
    F: Fn(&str) -> Result<PathBuf>,
{
    fn look_path(&self, name: &str) -> Result<PathBuf> {
        self(name)
    }
}

/// Extensions tried on Windows when `PATHEXT` is not set.
const DEFAULT_PATHEXT: [&str; 4] = [".com", ".exe", ".bat", ".cmd"];

/// The directories and extensions used to find executables.
///
/// With a root set, every candidate is looked up inside the filesystem
/// mounted there, and matches are reported as paths under the root.
#[derive(Debug, Clone)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
    extensions: Vec<String>,
    flavor: Flavor,
    root: Option<PathBuf>,
}

impl SearchPath {
    /// Search `dirs` in order. Windows searches use the default `PATHEXT`.
    pub fn new(flavor: Flavor, dirs: Vec<PathBuf>) -> Self {
        let extensions = match flavor {
            Flavor::Windows => DEFAULT_PATHEXT.iter().map(|e| e.to_string()).collect(),
            Flavor::Posix => Vec::new(),
        };
        Self {
            dirs,
            extensions,
            flavor,
            root: None,
        }
    }

    /// Look executables up in the filesystem mounted at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Build a search path from the `PATH` and `PATHEXT` variables of `env`.
    pub fn from_env(env: &Environment) -> Self {
        let separator = env.flavor.path_list_separator();
        let dirs = env
            .get_var("PATH")
            .map(|paths| {
                paths
                    .split(separator)
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut search = Self::new(env.flavor, dirs);
        if env.flavor == Flavor::Windows {
            if let Some(pathext) = env.get_var("PATHEXT") {
                let extensions: Vec<String> = pathext
                    .split(';')
                    .filter(|e| !e.is_empty())
                    .map(|e| e.to_ascii_lowercase())
                    .collect();
                if !extensions.is_empty() {
                    search.extensions = extensions;
                }
            }
        }
        search
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a command path the way a typical shell would.
    ///
    /// Behavior:
    /// - Empty name: returns `None`.
    /// - Name containing a separator (or a drive colon on Windows): checked as is,
    ///   relative names against the current directory.
    /// - Single component: each directory of the search path is tried in order
    ///   and the first executable match wins.
    pub fn find_command_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        if self.has_separator(name) {
            return self.find_by_path(&self.rooted(Path::new(name)));
        }

        self.dirs
            .iter()
            .find_map(|dir| self.find_by_path(&self.rooted(&dir.join(name))))
    }

    fn rooted(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => under_root(root, path),
            None => path.to_path_buf(),
        }
    }

    fn has_separator(&self, name: &str) -> bool {
        match self.flavor {
            Flavor::Windows => name.contains(['\\', '/', ':']),
            Flavor::Posix => name.contains('/'),
        }
    }

    fn find_by_path(&self, path: &Path) -> Option<PathBuf> {
        match self.flavor {
            Flavor::Posix => is_executable(path).then(|| path.to_path_buf()),
            Flavor::Windows => {
                if has_extension(path) && path.is_file() {
                    return Some(path.to_path_buf());
                }
                self.extensions.iter().find_map(|ext| {
                    let mut candidate = path.as_os_str().to_owned();
                    candidate.push(ext);
                    let candidate = PathBuf::from(candidate);
                    candidate.is_file().then_some(candidate)
                })
            }
        }
    }
}

impl PathLookup for SearchPath {
    fn look_path(&self, name: &str) -> Result<PathBuf> {
        self.find_command_path(name)
            .ok_or_else(|| ResolveError::ExecutableNotFound(name.to_string()))
    }
}

fn has_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.rsplit(['\\', '/']).next().is_some_and(|base| base.contains('.')))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! Finding the programs a shell-script or crontab line launches.
//!
//! A line is split at the shell's command separators (`|`, `;`, `&` and
//! newline) and the first word of every segment is looked up. Only words that
//! resolve to a file on disk count; builtins and keywords are skipped.

use crate::builtin::is_builtin;
use crate::env::{Environment, Flavor};
use crate::external::SearchPath;
use crate::lexer::tokenize;
use crate::resolver::canonicalize;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// A `#` preceded by whitespace starts a comment running to the end of the line.
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\s#.*$").expect("comment pattern is valid"));

/// Schedule shortcuts that replace the five time fields of a crontab line.
const CRON_SPECIAL_SCHEDULES: [&str; 7] = [
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@hourly",
];

/// How the shell would interpret a command word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// A program on disk.
    Executable(PathBuf),
    /// A builtin or keyword.
    Builtin,
    /// Nothing the shell could run.
    Unknown,
}

/// Equivalent of `command -v` for the classifier.
pub trait CommandLookup {
    fn lookup_command(&self, name: &str) -> CommandKind;
}

impl<F> CommandLookup for F
where
    F: Fn(&str) -> CommandKind,
{
    fn lookup_command(&self, name: &str) -> CommandKind {
        self(name)
    }
}

/// Command lookup backed by the builtin table and a POSIX search path.
#[derive(Debug, Clone)]
pub struct ShellCommands {
    env: Environment,
    search: SearchPath,
}

impl ShellCommands {
    pub fn new(env: Environment) -> Self {
        let env = Environment {
            flavor: Flavor::Posix,
            ..env
        };
        let search = SearchPath::from_env(&env);
        Self { env, search }
    }

    pub fn host() -> Self {
        Self::new(Environment::new())
    }

    /// Look commands up inside the filesystem mounted at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search = self.search.with_root(root);
        self
    }
}

impl CommandLookup for ShellCommands {
    fn lookup_command(&self, name: &str) -> CommandKind {
        if is_builtin(name) {
            return CommandKind::Builtin;
        }

        let expanded = self.env.expand(name);
        let Some(word) = tokenize(&expanded).ok().and_then(|words| words.into_iter().next()) else {
            return CommandKind::Unknown;
        };

        match self.search.find_command_path(&word) {
            Some(path) => CommandKind::Executable(PathBuf::from(canonicalize(
                &path.to_string_lossy(),
                Flavor::Posix,
            ))),
            None => CommandKind::Unknown,
        }
    }
}

/// A program launched by a script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub image_path: String,
    pub arguments: String,
}

/// Lazily yields the commands of a line, split at unquoted separators.
///
/// Segments are trimmed and empty ones (from `&&`, `||` or `;;`) are skipped.
pub struct Segments<'a> {
    rest: Option<&'a str>,
}

impl<'a> Segments<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { rest: Some(line) }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while let Some(text) = self.rest.take() {
            let (segment, remainder) = split_at_separator(text);
            self.rest = remainder;
            let segment = segment.trim();
            if !segment.is_empty() {
                return Some(segment);
            }
        }
        None
    }
}

fn is_command_separator(c: char) -> bool {
    matches!(c, '|' | ';' | '&' | '\n')
}

/// Splits at the first separator outside quotes; `None` when there is none.
fn split_at_separator(text: &str) -> (&str, Option<&str>) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if is_command_separator(c) && !in_single && !in_double => {
                return (&text[..i], Some(&text[i + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    (text, None)
}

/// Removes trailing comments. A line starting with `#` is all comment.
pub fn strip_comment(line: &str) -> String {
    let line = line.trim_start();
    if line.starts_with('#') {
        return String::new();
    }
    COMMENT.replace_all(line, "").into_owned()
}

/// Lists the programs `line` would launch, in order of appearance.
pub fn classify_line(line: &str, commands: &dyn CommandLookup) -> Vec<Invocation> {
    let code = strip_comment(line);
    Segments::new(&code)
        .filter_map(|segment| {
            let (word, arguments) = match segment.split_once(char::is_whitespace) {
                Some((word, arguments)) => (word, arguments.trim()),
                None => (segment, ""),
            };
            match commands.lookup_command(word) {
                CommandKind::Executable(path) => Some(Invocation {
                    image_path: path.to_string_lossy().into_owned(),
                    arguments: arguments.to_string(),
                }),
                CommandKind::Builtin | CommandKind::Unknown => None,
            }
        })
        .collect()
}

/// Extracts the command part of a crontab line.
///
/// `@reboot`-style schedules take one field. Otherwise five time fields are
/// skipped, plus a sixth when it names a known user (system crontabs).
/// Returns `None` for comments, variable assignments and lines without a
/// command.
pub fn cron_command<'a>(line: &'a str, is_user: &dyn Fn(&str) -> bool) -> Option<&'a str> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().take(6).collect();
    let first = fields.first()?;
    if first.starts_with('@') {
        let special = CRON_SPECIAL_SCHEDULES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(first));
        return if special { skip_fields(line, 1) } else { None };
    }
    if first.contains('=') || fields.len() < 6 {
        return None;
    }

    let skip = if is_user(fields[5]) { 6 } else { 5 };
    skip_fields(line, skip)
}

/// The text after the first `n` whitespace-separated fields, keeping its spacing.
fn skip_fields(line: &str, n: usize) -> Option<&str> {
    let mut rest = line;
    for _ in 0..n {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

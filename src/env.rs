use std::borrow::Cow;
use std::collections::HashMap;
use std::env as stdenv;

/// Path and expansion dialect of an autorun source.
///
/// Windows sources use `%NAME%` variables, `\` separators and case-insensitive
/// names; everything else follows POSIX shell conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Windows,
    Posix,
}

impl Flavor {
    /// The flavor of the operating system this binary was built for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Flavor::Windows
        } else {
            Flavor::Posix
        }
    }

    /// Separator between path components.
    pub fn separator(self) -> char {
        match self {
            Flavor::Windows => '\\',
            Flavor::Posix => '/',
        }
    }

    /// Separator between entries of `PATH`.
    pub fn path_list_separator(self) -> char {
        match self {
            Flavor::Windows => ';',
            Flavor::Posix => ':',
        }
    }
}

/// Snapshot of the process environment used to expand launch strings.
///
/// The environment contains:
/// - `vars`: the variables visible when the snapshot was taken.
/// - `flavor`: decides whether names are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// Naming rules of the platform the variables come from.
    pub flavor: Flavor,
}

impl Environment {
    /// Capture the current process environment into a new `Environment` instance.
    pub fn new() -> Self {
        Self::with_vars(Flavor::host(), stdenv::vars())
    }

    /// Build an environment from explicit variables, independent of the process.
    pub fn with_vars<K, V>(flavor: Flavor, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            flavor,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Windows variable names are matched case-insensitively, so `%systemroot%`
    /// finds `SystemRoot`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        if let Some(value) = self.vars.get(key) {
            return Some(value.clone());
        }
        match self.flavor {
            Flavor::Windows => self
                .vars
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone()),
            Flavor::Posix => None,
        }
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Expand aliases and variable references in `s` using this environment.
    pub fn expand(&self, s: &str) -> String {
        expand(s, self.flavor, &|name| self.get_var(name))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// NT kernel object namespace prefix found on service image paths.
const NT_OBJECT_PREFIX: &str = r"\??\";

/// Expands well-known aliases, then environment variable references.
///
/// Unresolved variables are left as literal text; expansion never fails.
pub fn expand(s: &str, flavor: Flavor, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let aliased = apply_aliases(s, flavor);
    match flavor {
        Flavor::Windows => expand_windows(&aliased, lookup),
        Flavor::Posix => expand_posix(&aliased, lookup),
    }
}

/// Rewrites fixed path aliases that have to be handled before variable expansion.
pub fn apply_aliases(s: &str, flavor: Flavor) -> Cow<'_, str> {
    match flavor {
        Flavor::Windows => {
            let s = s.strip_prefix(NT_OBJECT_PREFIX).unwrap_or(s);
            if starts_with_ignore_case(s, r"\SystemRoot") {
                Cow::Owned(format!("%SystemRoot%{}", &s[r"\SystemRoot".len()..]))
            } else if starts_with_ignore_case(s, "system32") {
                Cow::Owned(format!(r"%SystemRoot%\System32{}", &s["system32".len()..]))
            } else {
                Cow::Borrowed(s)
            }
        }
        Flavor::Posix => match s.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                Cow::Owned(format!("$HOME{rest}"))
            }
            _ => Cow::Borrowed(s),
        },
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// `%NAME%` expansion. An unresolved reference is copied and scanning resumes
/// at its closing `%`, which may open the next reference.
fn expand_windows(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(0) => {
                out.push_str("%%");
                rest = &after[1..];
            }
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => {
                        out.push_str(&value);
                        rest = &after[end + 1..];
                    }
                    None => {
                        out.push('%');
                        out.push_str(name);
                        rest = &after[end..];
                    }
                }
            }
            None => {
                out.push('%');
                rest = after;
                break;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start) && chars.all(is_name_char)
}

/// `$NAME` and `${NAME}` expansion. Quoting and escapes are preserved for the
/// tokenizer; nothing inside single quotes is expanded.
fn expand_posix(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(ch);
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(ch);
            }
            '\\' if !in_single => {
                out.push(ch);
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                }
            }
            '$' if !in_single => {
                let rest = &s[i + 1..];
                let (name, consumed) = match rest.strip_prefix('{') {
                    Some(body) => match body.find('}') {
                        Some(end) => (&body[..end], end + 2),
                        None => ("", 0),
                    },
                    None => {
                        let len = rest
                            .char_indices()
                            .find(|&(j, c)| {
                                !(if j == 0 { is_name_start(c) } else { is_name_char(c) })
                            })
                            .map_or(rest.len(), |(j, _)| j);
                        (&rest[..len], len)
                    }
                };

                let value = if is_valid_name(name) { lookup(name) } else { None };
                match value {
                    Some(value) => {
                        out.push_str(&value);
                        let end = i + 1 + consumed;
                        while chars.peek().is_some_and(|&(j, _)| j < end) {
                            chars.next();
                        }
                    }
                    None => out.push('$'),
                }
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows_env() -> Environment {
        Environment::with_vars(
            Flavor::Windows,
            [
                ("SystemRoot", r"C:\Windows"),
                ("ProgramFiles", r"C:\Program Files"),
                ("APPDATA", r"C:\Users\bob\AppData\Roaming"),
            ],
        )
    }

    fn posix_env() -> Environment {
        Environment::with_vars(Flavor::Posix, [("HOME", "/home/bob"), ("APP", "demo")])
    }

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::with_vars(Flavor::Posix, Vec::<(String, String)>::new());

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.get_var("key"), None);
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_windows_names_are_case_insensitive() {
        let env = windows_env();
        assert_eq!(env.get_var("systemroot").as_deref(), Some(r"C:\Windows"));
        assert_eq!(env.expand(r"%appdata%\x.exe"), r"C:\Users\bob\AppData\Roaming\x.exe");
    }

    #[test]
    fn test_windows_unresolved_variable_stays_literal() {
        let env = windows_env();
        assert_eq!(env.expand(r"%NOPE%\x.exe"), r"%NOPE%\x.exe");
        assert_eq!(
            env.expand(r"%NOPE%ProgramFiles%\x.exe"),
            r"%NOPEC:\Program Files\x.exe"
        );
        assert_eq!(env.expand("100%"), "100%");
        assert_eq!(env.expand("a%%b"), "a%%b");
    }

    #[test]
    fn test_nt_object_prefix_is_stripped() {
        let env = windows_env();
        assert_eq!(
            env.expand(r"\??\C:\Windows\system32\drivers\x.sys"),
            r"C:\Windows\system32\drivers\x.sys"
        );
    }

    #[test]
    fn test_systemroot_alias() {
        let env = windows_env();
        assert_eq!(
            env.expand(r"\SystemRoot\System32\drivers\acpi.sys"),
            r"C:\Windows\System32\drivers\acpi.sys"
        );
        assert_eq!(
            env.expand(r"\systemroot\x.sys"),
            r"C:\Windows\x.sys"
        );
    }

    #[test]
    fn test_system32_alias() {
        let env = windows_env();
        assert_eq!(
            env.expand(r"System32\svchost.exe -k netsvcs"),
            r"C:\Windows\System32\svchost.exe -k netsvcs"
        );
    }

    #[test]
    fn test_alias_without_systemroot_variable() {
        let env = Environment::with_vars(Flavor::Windows, Vec::<(String, String)>::new());
        assert_eq!(env.expand(r"system32\x.exe"), r"%SystemRoot%\System32\x.exe");
    }

    #[test]
    fn test_posix_variables() {
        let env = posix_env();
        assert_eq!(env.expand("$HOME/bin/$APP --x"), "/home/bob/bin/demo --x");
        assert_eq!(env.expand("${HOME}/bin/${APP}.sh"), "/home/bob/bin/demo.sh");
        assert_eq!(env.expand("$UNSET/x ${UNSET}"), "$UNSET/x ${UNSET}");
        assert_eq!(env.expand("cost $5"), "cost $5");
        assert_eq!(env.expand("${HOME"), "${HOME");
    }

    #[test]
    fn test_posix_quotes_and_escapes() {
        let env = posix_env();
        assert_eq!(env.expand("'$HOME' \"$HOME\""), "'$HOME' \"/home/bob\"");
        assert_eq!(env.expand("\"it's $APP\""), "\"it's demo\"");
        assert_eq!(env.expand(r"\$HOME"), r"\$HOME");
    }

    #[test]
    fn test_tilde_alias() {
        let env = posix_env();
        assert_eq!(env.expand("~/bin/run"), "/home/bob/bin/run");
        assert_eq!(env.expand("~"), "/home/bob");
        assert_eq!(env.expand("~alice/bin"), "~alice/bin");
    }
}

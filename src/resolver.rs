//! Executable resolution policies.
//!
//! POSIX launch strings are tokenized first and only their first word is
//! looked up ([`resolve_direct`]). Unquoted Windows command lines are
//! ambiguous because spaces separate arguments but also appear inside paths,
//! so [`resolve_ambiguous`] repeats the process launcher's trial search: the
//! text up to the first space, then up to the second, and so on, until a
//! prefix names an existing executable.

use crate::env::Flavor;
use crate::error::{ResolveError, Result};
use crate::external::PathLookup;
use tracing::trace;

/// Executable and arguments split off a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub executable: String,
    pub arguments: String,
    /// False when the executable boundary is known but the file was not found.
    pub resolved: bool,
}

/// Look a single candidate up and return its canonical path.
pub fn resolve_direct(candidate: &str, lookup: &dyn PathLookup, flavor: Flavor) -> Result<String> {
    let path = lookup.look_path(candidate)?;
    Ok(canonicalize(&path.to_string_lossy(), flavor))
}

/// Split a Windows-style command line into executable and arguments.
///
/// A leading quoted span is the executable, whether or not it resolves; no
/// boundary search happens for it. A leading quote that is never closed is
/// dropped and the remainder is searched as if it were unquoted.
pub fn resolve_ambiguous(
    command_line: &str,
    lookup: &dyn PathLookup,
    flavor: Flavor,
) -> Result<Resolution> {
    let command_line = command_line.trim();
    if command_line.is_empty() {
        return Err(ResolveError::EmptyLaunchString);
    }

    let Some(body) = command_line.strip_prefix('"') else {
        return search_boundaries(command_line, lookup, flavor);
    };

    let Some(end) = body.find('"') else {
        trace!(command_line, "unterminated quote, searching without it");
        return search_boundaries(body.trim_start(), lookup, flavor);
    };

    let span = &body[..end];
    if span.trim().is_empty() {
        return Err(ResolveError::ExecutableNotFound(command_line.to_string()));
    }

    let arguments = body[end + 1..].trim().to_string();
    Ok(match lookup.look_path(span) {
        Ok(path) => Resolution {
            executable: canonicalize(&path.to_string_lossy(), flavor),
            arguments,
            resolved: true,
        },
        Err(_) => Resolution {
            executable: canonicalize(span, flavor),
            arguments,
            resolved: false,
        },
    })
}

fn search_boundaries(
    command_line: &str,
    lookup: &dyn PathLookup,
    flavor: Flavor,
) -> Result<Resolution> {
    for end in word_ends(command_line) {
        let candidate = &command_line[..end];
        trace!(candidate, "trying executable boundary");
        if let Ok(path) = lookup.look_path(candidate) {
            return Ok(Resolution {
                executable: canonicalize(&path.to_string_lossy(), flavor),
                arguments: command_line[end..].trim().to_string(),
                resolved: true,
            });
        }
    }
    Err(ResolveError::ExecutableNotFound(command_line.to_string()))
}

/// Byte offsets where a word ends: every whitespace run that follows a word,
/// then the end of the string.
fn word_ends(s: &str) -> impl Iterator<Item = usize> + '_ {
    let mut previous_blank = true;
    s.char_indices()
        .filter_map(move |(i, c)| {
            let blank = c.is_whitespace();
            let ends_word = blank && !previous_blank;
            previous_blank = blank;
            ends_word.then_some(i)
        })
        .chain(std::iter::once(s.len()))
}

/// Lexically clean a path like `filepath.Clean`.
///
/// Repeated separators and `.` components are removed and `..` folds into its
/// parent; the filesystem is never consulted. Windows paths also get `\`
/// separators and an uppercase drive letter.
pub fn canonicalize(path: &str, flavor: Flavor) -> String {
    if path.is_empty() {
        return String::new();
    }

    let sep = flavor.separator();
    let path = match flavor {
        Flavor::Windows => path.replace('/', "\\"),
        Flavor::Posix => path.to_string(),
    };
    let (mut out, rest) = split_volume(&path, flavor);
    let rooted = rest.starts_with(sep);

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split(sep) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }

    if rooted {
        out.push(sep);
    }
    out.push_str(&parts.join(&sep.to_string()));
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Splits a leading drive (`C:`) or UNC share (`\\server\share`) off a path.
fn split_volume(path: &str, flavor: Flavor) -> (String, &str) {
    if flavor == Flavor::Posix {
        return (String::new(), path);
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_uppercase();
        return (format!("{drive}:"), &path[2..]);
    }

    if let Some(unc) = path.strip_prefix(r"\\") {
        let share_end = unc
            .match_indices('\\')
            .nth(1)
            .map_or(path.len(), |(i, _)| i + 2);
        return (path[..share_end].to_string(), &path[share_end..]);
    }

    (String::new(), path)
}

//! Words a shell handles itself.
//!
//! A script line starting with one of these never launches a program on its
//! own, so the classifier must not report it even when a file of the same
//! name exists on `PATH` (`echo`, `test`, `[`, `kill`, ...).

/// Builtin commands of bash and the POSIX `sh` family.
const SHELL_BUILTINS: &[&str] = &[
    ".", ":", "[", "alias", "bg", "bind", "break", "builtin", "caller", "cd", "command",
    "compgen", "complete", "compopt", "continue", "declare", "dirs", "disown", "echo",
    "enable", "eval", "exec", "exit", "export", "false", "fc", "fg", "getopts", "hash",
    "help", "history", "jobs", "kill", "let", "local", "logout", "mapfile", "popd", "printf",
    "pushd", "pwd", "read", "readarray", "readonly", "return", "set", "shift", "shopt",
    "source", "suspend", "test", "times", "trap", "true", "type", "typeset", "ulimit",
    "umask", "unalias", "unset", "wait",
];

/// Reserved words of the shell grammar.
const SHELL_KEYWORDS: &[&str] = &[
    "!", "[[", "]]", "{", "}", "case", "coproc", "do", "done", "elif", "else", "esac", "fi",
    "for", "function", "if", "in", "select", "then", "time", "until", "while",
];

/// Whether `name` is a shell builtin or keyword rather than a program.
pub fn is_builtin(name: &str) -> bool {
    SHELL_BUILTINS.contains(&name) || SHELL_KEYWORDS.contains(&name)
}

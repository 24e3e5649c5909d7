//! A module implementing lexical analysis (tokenization) for launch strings.
//!
//! Launch strings found in unit files, crontabs and registry values follow
//! shell quoting rules closely enough that a small state machine recovers the
//! words a shell would pass to `execve`. Quotes group characters into one word
//! and are removed. A backslash escapes the next character outside single
//! quotes; inside double quotes only `"`, `\`, `$` and `` ` `` can be escaped.

use crate::error::ResolveError;
use thiserror::Error;

/// Errors that can occur during the lexical analysis process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unfinished quote")]
    UnfinishedQuote,
}

impl From<LexingError> for ResolveError {
    fn from(err: LexingError) -> Self {
        match err {
            LexingError::UnfinishedQuote => ResolveError::MalformedQuoting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Performs lexical analysis on the input and returns the words found.
    ///
    /// A word opened by a quote is emitted even when empty, so `""` yields a
    /// single empty word just like in a shell.
    fn make_tokens(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            LexingState::ReadingWord => out.push(std::mem::take(&mut self.buffer)),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char) {
        if ch.is_whitespace() {
            return;
        }
        self.state = LexingState::ReadingWord;
        self.handle_word_char(ch);
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        if ch.is_whitespace() {
            out.push(std::mem::take(&mut self.buffer));
            self.state = LexingState::Start;
        } else {
            self.handle_word_char(ch);
        }
    }

    fn handle_word_char(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => self.push_escaped(|_| true),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => self.push_escaped(|next| matches!(next, '"' | '\\' | '$' | '`')),
            c => self.buffer.push(c),
        }
    }

    /// Consumes the character after a backslash when `escapable` accepts it.
    /// Otherwise, and at end of input, the backslash itself is kept.
    fn push_escaped(&mut self, escapable: impl Fn(char) -> bool) {
        match self.peek_char() {
            Some(next) if escapable(next) => {
                self.read_char();
                self.buffer.push(next);
            }
            _ => self.buffer.push('\\'),
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// # Returns
/// The words of `line` on success, or [`LexingError::UnfinishedQuote`] when a
/// quote is left open.
pub fn tokenize(line: &str) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

/// Doubles every backslash so that [`tokenize`] keeps them as literals.
///
/// Windows paths use `\` as a separator; without this step
/// `C:\Program Files\x.exe` would lose its separators to escape handling.
pub fn escape_backslashes(line: &str) -> String {
    line.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        tokenize(line).unwrap()
    }

    #[test]
    fn test_splits_on_whitespace() {
        assert_eq!(words("  /bin/ls -la\t/tmp  "), vec!["/bin/ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_double_quotes_group_words() {
        assert_eq!(
            words(r#""/opt/my app/run" --name "a b""#),
            vec!["/opt/my app/run", "--name", "a b"]
        );
    }

    #[test]
    fn test_quotes_inside_word_are_joined() {
        assert_eq!(words(r#"--opt="x y"z"#), vec!["--opt=x yz"]);
        assert_eq!(words("'it'\"s\""), vec!["its"]);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(words(r"'a\b $HOME'"), vec![r"a\b $HOME"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_word() {
        assert_eq!(words(r#"cmd "" x"#), vec!["cmd", "", "x"]);
    }

    #[test]
    fn test_backslash_escapes_space() {
        assert_eq!(words(r"/opt/my\ app/run -v"), vec!["/opt/my app/run", "-v"]);
    }

    #[test]
    fn test_trailing_backslash_is_kept() {
        assert_eq!(words(r"echo a\"), vec!["echo", r"a\"]);
    }

    #[test]
    fn test_unfinished_quote_is_an_error() {
        assert_eq!(tokenize(r#""C:\x.exe -y"#), Err(LexingError::UnfinishedQuote));
        assert_eq!(tokenize("'abc"), Err(LexingError::UnfinishedQuote));
    }

    #[test]
    fn test_windows_path_survives_escaping() {
        let line = escape_backslashes(r#""C:\Program Files\x.exe" -y C:\tmp"#);
        assert_eq!(words(&line), vec![r"C:\Program Files\x.exe", "-y", r"C:\tmp"]);
    }

    #[test]
    fn test_windows_path_without_escaping_is_mangled() {
        assert_eq!(words(r"C:\tmp\x.exe"), vec!["C:tmpx.exe"]);
    }

    #[test]
    fn test_unicode_words() {
        assert_eq!(words("/usr/bin/ünï «ça va»"), vec!["/usr/bin/ünï", "«ça", "va»"]);
    }

    #[test]
    fn test_blank_input_has_no_words() {
        assert!(words("   ").is_empty());
    }
}

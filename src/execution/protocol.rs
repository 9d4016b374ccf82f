//! Completion Marker Protocol
//!
//! Each request is written as the command followed by an instruction that
//! prints a fresh token. The response is every line between the echoed
//! command (line 0) and the line ending with the token, plus any output the
//! token was appended to.

use std::fmt;
use uuid::Uuid;

/// Terminator sent after a framed command
#[cfg(windows)]
pub const LINE_TERMINATOR: &str = "\r";
#[cfg(not(windows))]
pub const LINE_TERMINATOR: &str = "\n";

/// Random per-request marker rendered as a hyphenated UUID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionToken(String);

impl CompletionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CompletionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const ESC: char = '\x1b';

/// Split accumulated output on `\n`, dropping the `\r` a PTY adds and the
/// terminal mode switches readline prints around each accepted line
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| clean_line(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

/// Remove private-mode escapes (`ESC [ ? params h|l`, e.g. bracketed paste)
/// and the carriage returns left leading the line once they are gone
pub fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find(ESC) {
        out.push_str(&rest[..start]);
        let escape = &rest[start..];
        match private_mode_len(escape) {
            Some(len) => rest = &escape[len..],
            None => {
                out.push(ESC);
                rest = &escape[ESC.len_utf8()..];
            }
        }
    }
    out.push_str(rest);

    out.trim_start_matches('\r').to_string()
}

/// Length of a private-mode escape at the start of `s`, if there is one
fn private_mode_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix("\x1b[?")?;
    let params = body
        .bytes()
        .take_while(|b| b.is_ascii_digit() || *b == b';')
        .count();
    match body.as_bytes().get(params) {
        Some(b'h' | b'l') => Some(3 + params + 1),
        _ => None,
    }
}

/// Words that print the token in a framed command line
const PRINT_WORDS: [&str; 2] = ["echo ", "Write-Output "];

/// Index of the marker line: the first line after the echo (line 0) that
/// ends with `token`. Output without a trailing newline shares the marker's
/// line. A late command echo also ends with the token, after its print word,
/// and is skipped.
pub fn find_marker(lines: &[String], token: &str) -> Option<usize> {
    lines
        .iter()
        .skip(1)
        .position(|line| {
            line.strip_suffix(token)
                .is_some_and(|prefix| !PRINT_WORDS.iter().any(|word| prefix.ends_with(word)))
        })
        .map(|i| i + 1)
}

/// Response lines for a marker found at `marker_index`
pub fn framed_result(lines: &[String], marker_index: usize, token: &str) -> Vec<String> {
    if marker_index == 0 || marker_index >= lines.len() {
        return Vec::new();
    }

    let mut result = lines[1..marker_index].to_vec();
    let unterminated = lines[marker_index]
        .strip_suffix(token)
        .unwrap_or_default();
    if !unterminated.is_empty() {
        result.push(unterminated.to_string());
    }
    result
}

/// Lines known to be complete while the marker is still outstanding. The
/// echo and the trailing, possibly unterminated, segment are withheld.
pub fn partial_result(lines: &[String]) -> Vec<String> {
    if lines.len() <= 2 {
        return Vec::new();
    }
    lines[1..lines.len() - 1].to_vec()
}

//! SGR Tokenizer
//!
//! Splits one line of raw output into literal runs and `ESC [ params m`
//! escape tokens. Any escape that does not complete that grammar (cursor
//! movement, OSC titles, a lone ESC) stays in the literal text untouched.

const ESC: u8 = 0x1b;

/// One token of a raw output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal text, never empty
    Text(&'a str),
    /// Parameter body of an SGR escape, between `ESC [` and `m`
    Sgr(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Inside literal text
    Text,
    /// Saw ESC
    Escape,
    /// Saw `ESC [`, reading digits and semicolons
    Params,
}

/// Tokenize `line` into literal runs and SGR escapes, in order
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut state = Scan::Text;
    let mut text_start = 0;
    let mut escape_start = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        state = match (state, byte) {
            (_, ESC) => {
                escape_start = i;
                Scan::Escape
            }
            (Scan::Text, _) => Scan::Text,
            (Scan::Escape, b'[') => Scan::Params,
            (Scan::Escape, _) => Scan::Text,
            (Scan::Params, b'0'..=b'9' | b';') => Scan::Params,
            (Scan::Params, b'm') => {
                if escape_start > text_start {
                    tokens.push(Token::Text(&line[text_start..escape_start]));
                }
                tokens.push(Token::Sgr(&line[escape_start + 2..i]));
                text_start = i + 1;
                Scan::Text
            }
            (Scan::Params, _) => Scan::Text,
        };
    }

    if text_start < line.len() {
        tokens.push(Token::Text(&line[text_start..]));
    }

    tokens
}

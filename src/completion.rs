//! Argument Replacement for Completion
//!
//! Completion candidates replace the last argument of the input line. An
//! argument is either a single-quoted string or a run of non-whitespace.

use regex::Regex;

use crate::error::Result;

/// Splits input lines into arguments and swaps in completion candidates
#[derive(Debug, Clone)]
pub struct Completer {
    argument: Regex,
}

impl Completer {
    /// Create a completer with the argument pattern compiled
    pub fn new() -> Result<Self> {
        Ok(Self {
            argument: Regex::new(r"('[^']*'|\S+)")?,
        })
    }

    /// Every argument of `input`, in order
    pub fn arguments<'a>(&self, input: &'a str) -> Vec<&'a str> {
        self.argument
            .find_iter(input)
            .map(|m| m.as_str())
            .collect()
    }

    /// The argument the cursor sits on, or `None` after trailing whitespace
    pub fn last_arg<'a>(&self, input: &'a str) -> Option<&'a str> {
        self.argument
            .find_iter(input)
            .last()
            .filter(|m| m.end() == input.len())
            .map(|m| m.as_str())
    }

    /// Replace the last argument of `input` with `replacement`.
    ///
    /// After trailing whitespace the replacement is appended instead. Input
    /// without any argument is returned unchanged.
    pub fn replace_last_arg(&self, input: &str, replacement: &str) -> String {
        let Some(last) = self.argument.find_iter(input).last() else {
            return input.to_string();
        };

        if last.end() == input.len() {
            format!("{}{}", &input[..last.start()], replacement)
        } else {
            format!("{}{}", input, replacement)
        }
    }
}

/// Longest prefix shared by all candidates
pub fn common_prefix(candidates: &[String]) -> Option<String> {
    let (first, rest) = candidates.split_first()?;

    let mut end = first.len();
    for candidate in rest {
        end = first
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0)
            .min(end);
    }

    (end > 0).then(|| first[..end].to_string())
}

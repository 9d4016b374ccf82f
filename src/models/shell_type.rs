//! Shell Type Definitions
//!
//! The shells pexe knows how to drive, and the per-shell command text the
//! execution channel needs: the completion-marker instruction, prompt
//! suppression at startup, and the completion expansion request.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type of shell behind the execution channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShellType {
    /// Bourne Again Shell
    #[default]
    Bash,
    /// Z Shell
    Zsh,
    /// Fish Shell
    Fish,
    /// POSIX sh (dash, ash, ksh)
    Sh,
    /// PowerShell (pwsh or Windows PowerShell)
    PowerShell,
    /// Command Prompt
    Cmd,
}

impl ShellType {
    /// Get a string representation of the shell type
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Fish => "fish",
            ShellType::Sh => "sh",
            ShellType::PowerShell => "powershell",
            ShellType::Cmd => "cmd",
        }
    }

    /// Get shell type from string (case-insensitive)
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bash" => Some(ShellType::Bash),
            "zsh" => Some(ShellType::Zsh),
            "fish" => Some(ShellType::Fish),
            "sh" | "dash" | "ash" | "ksh" | "mksh" => Some(ShellType::Sh),
            "powershell" | "pwsh" => Some(ShellType::PowerShell),
            "cmd" => Some(ShellType::Cmd),
            _ => None,
        }
    }

    /// Detect the shell type from an executable path such as `/usr/bin/zsh`
    /// or `C:\Program Files\PowerShell\7\pwsh.exe`
    pub fn detect(program: &Path) -> Option<Self> {
        let stem = program.file_stem()?.to_str()?;
        Self::from_string(stem)
    }

    /// Arguments passed to the shell when none are configured
    pub fn default_args(&self) -> Vec<String> {
        match self {
            ShellType::PowerShell => vec!["-NoLogo".to_string()],
            ShellType::Cmd => vec!["/Q".to_string()],
            _ => Vec::new(),
        }
    }

    /// Commands run once after the shell starts. They blank the prompt so
    /// the echoed command is the only text on the first output line.
    pub fn default_init_commands(&self) -> Vec<String> {
        match self {
            ShellType::Bash => vec!["PS1=''; PS2=''".to_string()],
            ShellType::Zsh => vec![
                "precmd() { PS1=''; PS2=''; RPS1=''; }".to_string(),
                "unsetopt zle 2>/dev/null".to_string(),
            ],
            ShellType::Fish => vec![
                "function fish_prompt; end".to_string(),
                "function fish_right_prompt; end".to_string(),
            ],
            ShellType::Sh => vec!["PS1=''; PS2=''".to_string()],
            ShellType::PowerShell => vec!["function prompt { '' }".to_string()],
            ShellType::Cmd => Vec::new(),
        }
    }

    /// Line written before any framed request. It turns off bracketed
    /// paste, whose mode switches would otherwise wrap every accepted line.
    pub fn terminal_setup(&self) -> Option<&'static str> {
        match self {
            ShellType::Bash => Some("bind 'set enable-bracketed-paste off' 2>/dev/null"),
            ShellType::Zsh => Some("unset zle_bracketed_paste 2>/dev/null"),
            _ => None,
        }
    }

    /// A command that does nothing, used to check the shell is responsive
    pub fn noop_command(&self) -> &'static str {
        match self {
            ShellType::PowerShell => "$null",
            ShellType::Cmd => "rem",
            _ => "true",
        }
    }

    /// Join `command` with the instruction that prints `token` once the
    /// command has finished. Output left without a newline shares its line.
    pub fn frame_command(&self, command: &str, token: &str) -> String {
        let command = command.trim_end();
        let marker = match self {
            ShellType::PowerShell => format!("Write-Output {}", token),
            _ => format!("echo {}", token),
        };

        if command.is_empty() {
            return marker;
        }

        match self {
            ShellType::Cmd => format!("{} & {}", command, marker),
            _ if ends_with_separator(command) => format!("{} {}", command, marker),
            _ => format!("{}; {}", command, marker),
        }
    }

    /// Command asking the shell to list completions for `fragment`.
    ///
    /// Returns `None` when the shell has no way to expand fragments.
    pub fn completion_request(&self, fragment: &str) -> Option<String> {
        let word = last_word(fragment);
        match self {
            ShellType::Bash => Some(format!(
                "compgen -c -f -- {} 2>/dev/null",
                posix_quote(word)
            )),
            ShellType::Zsh => Some(format!("print -rl -- {}*(N)", posix_quote(word))),
            ShellType::Sh => Some(format!(
                "for f in {}*; do [ -e \"$f\" ] && echo \"$f\"; done",
                posix_quote(word)
            )),
            ShellType::Fish => Some(format!("complete -C {}", fish_quote(fragment))),
            ShellType::PowerShell => Some(format!(
                "$(TabExpansion2 \"{}\").CompletionMatches.CompletionText",
                powershell_escape(fragment)
            )),
            ShellType::Cmd => None,
        }
    }

    /// Extract the candidate text from one line of completion output
    pub fn completion_candidate<'a>(&self, line: &'a str) -> Option<&'a str> {
        let candidate = match self {
            // fish prints "candidate<TAB>description"
            ShellType::Fish => line.split('\t').next().unwrap_or(line),
            _ => line,
        };
        let candidate = candidate.trim();
        (!candidate.is_empty()).then_some(candidate)
    }
}

impl std::fmt::Display for ShellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `command` already ends in a list separator (`;` or a lone `&`)
fn ends_with_separator(command: &str) -> bool {
    command.ends_with(';') || (command.ends_with('&') && !command.ends_with("&&"))
}

fn last_word(fragment: &str) -> &str {
    if fragment.ends_with(char::is_whitespace) {
        return "";
    }
    fragment.split_whitespace().last().unwrap_or("")
}

fn posix_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn fish_quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', r"\\").replace('\'', r"\'"))
}

fn powershell_escape(s: &str) -> String {
    s.replace('`', "``").replace('"', "`\"").replace('$', "`$")
}

//! Scripted Shell for Channel Tests
//!
//! A [`ShellLauncher`] whose "shell" answers framed commands from a script:
//! it echoes the command line like a PTY would, writes the scripted output
//! from a background thread, then prints the completion token. Lines without
//! a token are echoed and otherwise ignored.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pexe::config::ShellConfig;
use pexe::error::{Error, Result};
use pexe::execution::{OutputSink, ShellLauncher, ShellTransport};

/// How the scripted shell answers a command
#[derive(Debug, Clone)]
pub enum Reply {
    /// Print these lines, then the token
    Lines(Vec<String>),
    /// Wait, then print these lines and the token
    Delayed(Duration, Vec<String>),
    /// Print nothing after the echo and never finish
    Hang,
    /// Print these lines, then exit without printing the token
    Exit(Option<u32>, Vec<String>),
    /// Print this text with no newline, then the token
    Unterminated(String),
}

impl Reply {
    pub fn lines(lines: &[&str]) -> Self {
        Reply::Lines(lines.iter().map(|l| l.to_string()).collect())
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, Reply>,
    received: Vec<String>,
    unframed: Vec<String>,
    writes: Vec<String>,
    bracketed_paste: bool,
    launches: usize,
    interrupts: usize,
    shutdowns: usize,
    fail_launch: bool,
}

/// Launcher for scripted shells; clones share one script
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `reply`
    pub fn on(&self, command: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(command.to_string(), reply);
    }

    /// Emit readline's bracketed paste switch after each echo until the
    /// shell is told to turn it off
    pub fn enable_bracketed_paste(&self) {
        self.script.lock().unwrap().bracketed_paste = true;
    }

    /// Make the next launches fail
    pub fn fail_launch(&self) {
        self.script.lock().unwrap().fail_launch = true;
    }

    /// Commands received, without their marker instruction
    pub fn received(&self) -> Vec<String> {
        self.script.lock().unwrap().received.clone()
    }

    /// Lines written without a marker instruction
    pub fn unframed(&self) -> Vec<String> {
        self.script.lock().unwrap().unframed.clone()
    }

    /// Raw text written to the shell
    pub fn writes(&self) -> Vec<String> {
        self.script.lock().unwrap().writes.clone()
    }

    pub fn launches(&self) -> usize {
        self.script.lock().unwrap().launches
    }

    pub fn interrupts(&self) -> usize {
        self.script.lock().unwrap().interrupts
    }

    pub fn shutdowns(&self) -> usize {
        self.script.lock().unwrap().shutdowns
    }
}

#[async_trait]
impl ShellLauncher for ScriptedLauncher {
    async fn launch(&self, shell: &ShellConfig, sink: OutputSink) -> Result<Box<dyn ShellTransport>> {
        let mut script = self.script.lock().unwrap();
        if script.fail_launch {
            return Err(Error::CommandSpawnFailed {
                command: shell.program(),
                reason: "scripted launch failure".to_string(),
            });
        }
        script.launches += 1;

        Ok(Box::new(ScriptedTransport {
            script: Arc::clone(&self.script),
            sink,
        }))
    }
}

struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    sink: OutputSink,
}

/// Split a framed line into the command and the token
fn split_framed(line: &str) -> (String, String) {
    let (before, token) = line
        .rsplit_once("echo ")
        .or_else(|| line.rsplit_once("Write-Output "))
        .unwrap_or((line, ""));
    let command = before
        .trim_end()
        .trim_end_matches([';', '&'])
        .trim_end()
        .to_string();
    (command, token.to_string())
}

#[async_trait]
impl ShellTransport for ScriptedTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data).to_string();
        let line = text.trim_end_matches(['\r', '\n']).to_string();
        let (command, token) = split_framed(&line);

        let (reply, paste_switch) = {
            let mut script = self.script.lock().unwrap();
            script.writes.push(text);
            let paste_switch = if script.bracketed_paste { "\x1b[?2004l\r" } else { "" };
            if token.is_empty() {
                if line.contains("enable-bracketed-paste off") {
                    script.bracketed_paste = false;
                }
                script.unframed.push(line.clone());
                drop(script);
                self.sink.push(format!("{}\r\n{}", line, paste_switch).as_bytes());
                return Ok(());
            }
            script.received.push(command.clone());
            let reply = script
                .replies
                .get(&command)
                .cloned()
                .unwrap_or(Reply::Lines(Vec::new()));
            (reply, paste_switch)
        };

        let sink = self.sink.clone();
        thread::spawn(move || {
            sink.push(format!("{}\r\n{}", line, paste_switch).as_bytes());
            let print = |lines: &[String]| {
                for l in lines {
                    sink.push(format!("{}\r\n", l).as_bytes());
                }
            };

            match reply {
                Reply::Lines(lines) => {
                    print(&lines);
                    sink.push(format!("{}\r\n", token).as_bytes());
                }
                Reply::Delayed(delay, lines) => {
                    thread::sleep(delay);
                    print(&lines);
                    sink.push(format!("{}\r\n", token).as_bytes());
                }
                Reply::Hang => {}
                Reply::Exit(code, lines) => {
                    print(&lines);
                    sink.mark_exited(code);
                    sink.close();
                }
                Reply::Unterminated(partial) => {
                    sink.push(format!("{}{}\r\n", partial, token).as_bytes());
                }
            }
        });
        Ok(())
    }

    fn interrupt(&mut self) -> Result<()> {
        self.script.lock().unwrap().interrupts += 1;
        self.sink.push(b"^C\r\n");
        Ok(())
    }

    async fn shutdown(&mut self, _grace: Duration) -> Result<()> {
        self.script.lock().unwrap().shutdowns += 1;
        self.sink.mark_exited(Some(0));
        self.sink.close();
        Ok(())
    }

    fn process_id(&self) -> Option<u32> {
        Some(4242)
    }
}

//! Command Execution Channel
//!
//! Drives one interactive shell as a request/response service. A command is
//! written together with an instruction that prints a fresh completion
//! token; the response is the output between the command echo and that
//! token. One request may be in flight at a time and a second submit is
//! rejected with [`Error::Busy`] instead of being queued.

pub mod accumulator;
pub mod protocol;
pub mod transport;

pub use accumulator::{OutputAccumulator, OutputSink, SharedOutput, Snapshot};
pub use protocol::CompletionToken;
pub use transport::{ShellLauncher, ShellTransport};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ChannelConfig, Config, ShellConfig};
use crate::error::{Error, Result};
use crate::models::ShellType;
use crate::pty::PtyLauncher;
use accumulator::lock;
use protocol::{find_marker, framed_result, partial_result, split_lines, LINE_TERMINATOR};

/// Clears the in-flight flag when dropped
#[derive(Debug)]
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One live shell connection
pub struct ShellSession {
    kind: ShellType,
    transport: Box<dyn ShellTransport>,
    output: SharedOutput,
    in_flight: Arc<AtomicBool>,
}

impl ShellSession {
    pub fn kind(&self) -> ShellType {
        self.kind
    }

    pub fn process_id(&self) -> Option<u32> {
        self.transport.process_id()
    }

    pub fn is_alive(&self) -> bool {
        lock(&self.output).is_alive()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn exit_code(&self) -> Option<u32> {
        lock(&self.output).snapshot().exit_code
    }
}

impl std::fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellSession")
            .field("kind", &self.kind)
            .field("pid", &self.process_id())
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// State of a request reported by [`PendingResponse::progress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Still running; carries the lines that arrived since the last report
    Pending(Vec<String>),
    /// Marker seen; carries the remaining unreported lines
    Complete(Vec<String>),
}

/// Handle to an in-flight request
#[derive(Debug)]
pub struct PendingResponse {
    command: String,
    token: CompletionToken,
    output: SharedOutput,
    guard: Option<InFlightGuard>,
    reported: usize,
    poll_interval: Duration,
    timeout: Option<Duration>,
    started: Instant,
    exited_polls: u32,
    finished: bool,
}

impl PendingResponse {
    fn new(
        command: String,
        token: CompletionToken,
        output: SharedOutput,
        guard: InFlightGuard,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            command,
            token,
            output,
            guard: Some(guard),
            reported: 0,
            poll_interval,
            timeout,
            started: Instant::now(),
            exited_polls: 0,
            finished: false,
        }
    }

    /// Command text as submitted
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Token that marks the end of this request's output
    pub fn token(&self) -> &str {
        self.token.as_str()
    }

    /// Whether the request resolved, successfully or not
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Complete lines received so far, re-read from the buffer on each call
    pub fn output_so_far(&self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        let text = lock(&self.output).text().to_string();
        partial_result(&split_lines(&text))
    }

    /// Complete lines that have not been returned by an earlier call
    pub fn take_new_lines(&mut self) -> Vec<String> {
        let lines = self.output_so_far();
        let fresh = lines.get(self.reported..).map(<[String]>::to_vec).unwrap_or_default();
        self.reported = self.reported.max(lines.len());
        fresh
    }

    /// Wait up to `within` for the request to finish or for new lines
    pub async fn progress(&mut self, within: Duration) -> Result<Progress> {
        if self.finished {
            return Ok(Progress::Complete(Vec::new()));
        }

        let deadline = Instant::now() + within;
        loop {
            if let Some(lines) = self.poll()? {
                let rest = lines.get(self.reported..).map(<[String]>::to_vec).unwrap_or_default();
                self.reported = lines.len();
                return Ok(Progress::Complete(rest));
            }

            let fresh = self.take_new_lines();
            let now = Instant::now();
            if !fresh.is_empty() || now >= deadline {
                return Ok(Progress::Pending(fresh));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Resolve to the lines between the command echo and the marker
    pub async fn wait(mut self) -> Result<Vec<String>> {
        loop {
            if let Some(lines) = self.poll()? {
                return Ok(lines);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One check of the buffer. Any terminal outcome releases the channel.
    fn poll(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Err(Error::Other(format!(
                "request '{}' already resolved",
                self.command
            )));
        }

        let outcome = self.check();
        if !matches!(outcome, Ok(None)) {
            self.finished = true;
            self.guard = None;
        }
        outcome
    }

    fn check(&mut self) -> Result<Option<Vec<String>>> {
        let snapshot = lock(&self.output).snapshot();
        let lines = split_lines(&snapshot.text);

        if let Some(index) = find_marker(&lines, self.token.as_str()) {
            let result = framed_result(&lines, index, self.token.as_str());
            debug!(
                "Command '{}' completed with {} line(s) in {:?}",
                self.command,
                result.len(),
                self.started.elapsed()
            );
            return Ok(Some(result));
        }

        if let Some(reason) = snapshot.transport_error {
            return Err(Error::Transport { reason });
        }

        if snapshot.closed {
            warn!("Shell output closed before '{}' completed", self.command);
            return Err(Error::ProcessTerminated {
                exit_code: snapshot.exit_code,
            });
        }

        // Output may still be draining right after exit
        if snapshot.exited {
            self.exited_polls += 1;
            if self.exited_polls >= 2 {
                warn!("Shell exited before '{}' completed", self.command);
                return Err(Error::ProcessTerminated {
                    exit_code: snapshot.exit_code,
                });
            }
        } else {
            self.exited_polls = 0;
        }

        if let Some(limit) = self.timeout {
            let waited = self.started.elapsed();
            if waited >= limit {
                return Err(Error::ResponseTimeout {
                    command: self.command.clone(),
                    waited,
                });
            }
        }

        Ok(None)
    }
}

/// Request/response channel over an interactive shell
pub struct ShellChannel {
    shell: ShellConfig,
    settings: ChannelConfig,
    launcher: Box<dyn ShellLauncher>,
    session: Option<ShellSession>,
}

impl ShellChannel {
    /// Create a channel that starts shells through `launcher`
    pub fn new(shell: ShellConfig, settings: ChannelConfig, launcher: Box<dyn ShellLauncher>) -> Self {
        Self {
            shell,
            settings,
            launcher,
            session: None,
        }
    }

    /// Create a PTY-backed channel from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.shell.clone(),
            config.channel.clone(),
            Box::new(PtyLauncher::new()),
        )
    }

    pub fn shell_type(&self) -> ShellType {
        self.session
            .as_ref()
            .map(ShellSession::kind)
            .unwrap_or_else(|| self.shell.shell_type())
    }

    pub fn session(&self) -> Option<&ShellSession> {
        self.session.as_ref()
    }

    /// Whether a live shell is attached
    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(ShellSession::is_alive)
    }

    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        self.session.as_ref().is_some_and(ShellSession::is_busy)
    }

    /// Launch the shell and prepare it for framed requests.
    ///
    /// Fails with [`Error::AlreadyStarted`] while the current shell is alive.
    /// A terminated session is replaced.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(mut old) = self.session.take() {
            if old.is_alive() {
                self.session = Some(old);
                return Err(Error::AlreadyStarted);
            }
            info!("Replacing terminated {} session", old.kind);
            if let Err(e) = old.transport.shutdown(Duration::ZERO).await {
                debug!("Cleanup of terminated shell failed: {}", e);
            }
        }

        let kind = self.shell.shell_type();
        let (sink, output) = OutputSink::detached();
        info!(
            "Starting {} shell: {} {:?}",
            kind,
            self.shell.program(),
            self.shell.args()
        );
        let transport = self.launcher.launch(&self.shell, sink).await?;

        self.session = Some(ShellSession {
            kind,
            transport,
            output,
            in_flight: Arc::new(AtomicBool::new(false)),
        });

        if let Err(e) = self.prepare().await {
            error!("Shell setup failed: {}", e);
            if let Some(mut session) = self.session.take() {
                if let Err(e) = session.transport.shutdown(self.settings.shutdown_grace()).await {
                    debug!("Shutdown after failed setup: {}", e);
                }
            }
            return Err(e);
        }

        info!("Shell ready (pid {:?})", self.session.as_ref().and_then(ShellSession::process_id));
        Ok(())
    }

    /// Terminal setup, readiness handshake, then the per-shell init commands
    async fn prepare(&mut self) -> Result<()> {
        let kind = self.shell_type();
        let limit = Some(self.settings.startup_timeout());

        if let Some(setup) = kind.terminal_setup() {
            debug!("Configuring terminal: {}", setup);
            self.send_unframed(setup)?;
        }

        self.submit_with_timeout(kind.noop_command(), limit)?
            .wait()
            .await?;

        for command in self.shell.init_commands() {
            debug!("Running init command: {}", command);
            self.submit_with_timeout(&command, limit)?.wait().await?;
        }
        Ok(())
    }

    /// Send `command` to the shell.
    ///
    /// Returns [`Error::Busy`] without touching the buffer when another
    /// request is in flight.
    pub fn submit(&mut self, command: &str) -> Result<PendingResponse> {
        let timeout = self.settings.response_timeout();
        self.submit_with_timeout(command, timeout)
    }

    fn submit_with_timeout(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<PendingResponse> {
        let poll_interval = self.settings.poll_interval();
        let session = self.session.as_mut().ok_or(Error::NotStarted)?;
        let guard = InFlightGuard::acquire(&session.in_flight).ok_or(Error::Busy)?;

        if !session.is_alive() {
            return Err(Error::ProcessTerminated {
                exit_code: session.exit_code(),
            });
        }

        let token = CompletionToken::new();
        lock(&session.output).clear();

        let framed = session.kind.frame_command(command, token.as_str());
        debug!("Submitting: {}", framed);
        write_line(session, &framed)?;

        Ok(PendingResponse::new(
            command.to_string(),
            token,
            Arc::clone(&session.output),
            guard,
            poll_interval,
            timeout,
        ))
    }

    /// Write a line that prints no marker. Its output is discarded by the
    /// buffer reset of the next request.
    fn send_unframed(&mut self, line: &str) -> Result<()> {
        let session = self.session.as_mut().ok_or(Error::NotStarted)?;
        write_line(session, line)
    }

    /// Interrupt the running command. Failures are only logged.
    pub fn cancel(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("Cancel requested without a shell session");
            return;
        };
        match session.transport.interrupt() {
            Ok(()) => debug!("Interrupt sent to shell"),
            Err(e) => warn!("Failed to interrupt shell: {}", e),
        }
    }

    /// Ask the shell to expand `fragment` into completion candidates
    pub async fn complete(&mut self, fragment: &str) -> Result<Vec<String>> {
        let kind = self.shell_type();
        let request = kind
            .completion_request(fragment)
            .ok_or_else(|| Error::CompletionUnsupported {
                shell: kind.to_string(),
            })?;

        let lines = self.submit(&request)?.wait().await?;

        let mut seen = HashSet::new();
        Ok(lines
            .iter()
            .filter_map(|line| kind.completion_candidate(line))
            .filter(|candidate| seen.insert(candidate.to_string()))
            .map(str::to_string)
            .collect())
    }

    /// Shut the shell down and release the session
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        info!("Stopping {} shell", session.kind);
        session
            .transport
            .shutdown(self.settings.shutdown_grace())
            .await
    }
}

/// Write one terminated line to the shell
fn write_line(session: &mut ShellSession, line: &str) -> Result<()> {
    session
        .transport
        .send(format!("{}{}", line, LINE_TERMINATOR).as_bytes())
        .map_err(|e| match e {
            Error::Transport { .. } => e,
            other => Error::Transport {
                reason: other.to_string(),
            },
        })
}

impl std::fmt::Debug for ShellChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellChannel")
            .field("shell", &self.shell)
            .field("settings", &self.settings)
            .field("session", &self.session)
            .finish()
    }
}

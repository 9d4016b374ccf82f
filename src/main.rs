//! pexe - command launcher front end
//!
//! Reads commands from standard input one line at a time, runs them in the
//! configured shell and streams the colored output back with 24-bit SGR
//! escapes. History is written on exit.

use std::env;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use pexe::launcher::Submission;
use pexe::{Color, Launcher, Progress, StyledSpan};

/// How long to wait for output before checking for Ctrl-C again
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// How long an interrupted command gets to print its marker
const INTERRUPT_GRACE: Duration = Duration::from_secs(3);

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
}

impl AppArgs {
    /// Parse command line arguments
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut app_args = AppArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let path = args.get(i + 1).context("Missing config file path")?;
                    app_args.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-V" => {
                    println!("{} v{}", pexe::NAME, pexe::VERSION);
                    process::exit(0);
                }
                arg => {
                    anyhow::bail!("Unknown option: {}", arg);
                }
            }
            i += 1;
        }

        Ok(app_args)
    }
}

/// Print help information
fn print_help() {
    println!("pexe - run shell commands and stream their colored output");
    println!();
    println!("USAGE:");
    println!("    pexe [OPTIONS]");
    println!();
    println!("Commands are read from standard input, one per line.");
    println!("    exit    Quit");
    println!("    term    Interrupt the running command (Ctrl-C also works)");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    pexe looks for configuration files in the following order:");
    println!("    1. Path specified with --config");
    println!("    2. $PEXE_CONFIG");
    println!("    3. <config dir>/pexe/config.toml (or config.json)");
    println!("    4. ~/.pexe/config.toml");
    println!("    5. ./pexe.toml");
    println!("    6. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    PEXE_CONFIG    Path to configuration file");
    println!("    PEXE_DEBUG     Enable debug logging (1 or true)");
    println!("    RUST_LOG       Set logging level (error, warn, info, debug, trace)");
}

/// Install the tracing subscriber. Logs go to stderr so stdout carries only
/// command output.
fn init_logging(args: &AppArgs) {
    let debug_env = env::var("PEXE_DEBUG").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if args.debug || debug_env { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Render spans as 24-bit SGR. The default background is left to the
/// terminal.
fn paint(spans: &[StyledSpan], background: Color) -> String {
    let mut out = String::new();
    for span in spans {
        let fg = span.foreground;
        let _ = write!(out, "\x1b[38;2;{};{};{}m", fg.r, fg.g, fg.b);
        if span.background != background {
            let bg = span.background;
            let _ = write!(out, "\x1b[48;2;{};{};{}m", bg.r, bg.g, bg.b);
        }
        if span.bold {
            out.push_str("\x1b[1m");
        }
        if span.italic {
            out.push_str("\x1b[3m");
        }
        if span.underline {
            out.push_str("\x1b[4m");
        }
        out.push_str(&span.text);
        out.push_str("\x1b[0m");
    }
    out
}

fn print_lines(launcher: &Launcher, lines: &[String]) -> Result<()> {
    let background = launcher.palette().background;
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{}", paint(&launcher.render(line), background))?;
    }
    stdout.flush()?;
    Ok(())
}

/// Stream one request's output until it completes.
///
/// An interrupted command may never print its marker, so the request is
/// abandoned once [`INTERRUPT_GRACE`] has passed without completion.
async fn stream_response(launcher: &mut Launcher, mut pending: pexe::PendingResponse) -> pexe::Result<()> {
    let mut interrupted_at: Option<Instant> = None;
    loop {
        tokio::select! {
            progress = pending.progress(PROGRESS_INTERVAL) => {
                match progress? {
                    Progress::Pending(lines) => {
                        if let Err(e) = print_lines(launcher, &lines) {
                            warn!("Failed to write output: {}", e);
                        }
                        if interrupted_at.is_some_and(|at| at.elapsed() >= INTERRUPT_GRACE) {
                            warn!("'{}' did not finish after interrupt; abandoning it", pending.command());
                            return Ok(());
                        }
                    }
                    Progress::Complete(lines) => {
                        if let Err(e) = print_lines(launcher, &lines) {
                            warn!("Failed to write output: {}", e);
                        }
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl-C received, interrupting command");
                launcher.interrupt();
                interrupted_at.get_or_insert_with(Instant::now);
            }
        }
    }
}

async fn run(launcher: &mut Launcher) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(input) = lines.next_line().await.context("Failed to read input")? {
        let submission = match launcher.enter(&input) {
            Ok(submission) => submission,
            Err(e) if e.needs_restart() => {
                warn!("{}; restarting shell", e);
                launcher.restart().await.context("Failed to restart shell")?;
                continue;
            }
            Err(e) => {
                error!("{}", e);
                continue;
            }
        };

        match submission {
            Submission::Exit => break,
            Submission::Interrupted => info!("Interrupt sent"),
            Submission::Ignored => {}
            Submission::Started(pending) => {
                if let Err(e) = stream_response(launcher, pending).await {
                    if e.needs_restart() {
                        warn!("{}; restarting shell", e);
                        launcher.restart().await.context("Failed to restart shell")?;
                    } else {
                        error!("{}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("{}", e);
        print_help();
        process::exit(1);
    });

    init_logging(&args);
    info!("Starting {} v{}", pexe::NAME, pexe::VERSION);
    debug!("Arguments: {:?}", args);

    let config = match &args.config_path {
        Some(path) => pexe::init_with_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => pexe::init()?,
    };

    let mut launcher = Launcher::from_config(&config).context("Failed to set up launcher")?;
    launcher.start().await.context("Failed to start shell")?;

    let outcome = run(&mut launcher).await;

    if let Err(e) = launcher.shutdown().await {
        warn!("Shutdown incomplete: {}", e);
    }
    info!("Goodbye");
    outcome
}

//! Integration tests for the execution channel
//!
//! These drive a [`ShellChannel`] against the scripted shell from
//! `test_utils`, so framing, busy handling and termination can be checked
//! without a real PTY.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::time::Duration;

use pexe::config::ChannelConfig;
use pexe::execution::protocol::LINE_TERMINATOR;
use pexe::{Error, Progress, ShellChannel, ShellType};
use test_utils::{
    create_fast_channel_config, create_scripted_channel, create_test_shell_config, Reply,
    ScriptedLauncher,
};

fn channel_with(launcher: &ScriptedLauncher) -> ShellChannel {
    create_scripted_channel(launcher, ShellType::Bash)
}

async fn started_channel(launcher: &ScriptedLauncher) -> ShellChannel {
    let mut channel = channel_with(launcher);
    channel.start().await.expect("scripted shell should start");
    channel
}

#[tokio::test]
async fn test_submit_before_start_is_rejected() {
    let launcher = ScriptedLauncher::new();
    let mut channel = channel_with(&launcher);

    assert!(matches!(channel.submit("ls"), Err(Error::NotStarted)));
    assert!(!channel.is_running());
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_start_runs_handshake_then_init_commands() {
    let launcher = ScriptedLauncher::new();
    let channel = started_channel(&launcher).await;

    assert!(channel.is_running());
    assert!(!channel.is_busy());
    assert_eq!(launcher.received(), vec!["true", "PS1=''"]);
    assert_eq!(channel.session().and_then(|s| s.process_id()), Some(4242));
}

#[tokio::test]
async fn test_bash_disables_bracketed_paste_before_first_request() {
    let launcher = ScriptedLauncher::new();
    launcher.enable_bracketed_paste();
    launcher.on("echo hi", Reply::lines(&["hi"]));
    let mut channel = started_channel(&launcher).await;

    let setup = ShellType::Bash.terminal_setup().unwrap();
    let writes = launcher.writes();
    assert_eq!(writes[0], format!("{}{}", setup, LINE_TERMINATOR));
    assert_eq!(launcher.unframed(), vec![setup]);

    let lines = channel.submit("echo hi").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["hi"]);
}

#[tokio::test]
async fn test_paste_mode_switches_are_stripped_from_output() {
    let launcher = ScriptedLauncher::new();
    launcher.enable_bracketed_paste();
    launcher.on("echo hi", Reply::lines(&["hi"]));
    let mut channel = create_scripted_channel(&launcher, ShellType::Sh);
    channel.start().await.unwrap();
    assert!(launcher.unframed().is_empty());

    let lines = channel.submit("echo hi").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["hi"]);
    let lines = channel.submit("cd /").unwrap().wait().await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_output_without_trailing_newline_completes() {
    let launcher = ScriptedLauncher::new();
    launcher.on("printf abc", Reply::Unterminated("abc".to_string()));
    launcher.on("printf ''", Reply::Unterminated(String::new()));
    let mut channel = started_channel(&launcher).await;

    let lines = channel.submit("printf abc").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["abc"]);
    let lines = channel.submit("printf ''").unwrap().wait().await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let launcher = ScriptedLauncher::new();
    let mut channel = started_channel(&launcher).await;

    assert!(matches!(channel.start().await, Err(Error::AlreadyStarted)));
    assert_eq!(launcher.launches(), 1);
    assert!(channel.is_running());
}

#[tokio::test]
async fn test_launch_failure_propagates() {
    let launcher = ScriptedLauncher::new();
    launcher.fail_launch();
    let mut channel = channel_with(&launcher);

    assert!(matches!(
        channel.start().await,
        Err(Error::CommandSpawnFailed { .. })
    ));
    assert!(channel.session().is_none());
}

#[tokio::test]
async fn test_failed_init_command_stops_shell() {
    let launcher = ScriptedLauncher::new();
    launcher.on("PS1=''", Reply::Exit(Some(2), Vec::new()));
    let mut channel = channel_with(&launcher);

    let err = channel.start().await.unwrap_err();
    assert!(matches!(err, Error::ProcessTerminated { .. }));
    assert!(channel.session().is_none());
    assert_eq!(launcher.shutdowns(), 1);
}

#[tokio::test]
async fn test_response_is_lines_between_echo_and_marker() {
    let launcher = ScriptedLauncher::new();
    launcher.on("cmd", Reply::lines(&["a", "b"]));
    let mut channel = started_channel(&launcher).await;

    let lines = channel.submit("cmd").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["a", "b"]);
    assert!(!channel.is_busy());
}

#[tokio::test]
async fn test_silent_command_yields_no_lines() {
    let launcher = ScriptedLauncher::new();
    let mut channel = started_channel(&launcher).await;

    let lines = channel.submit("cd /tmp").unwrap().wait().await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_command_and_marker_sent_as_one_line() {
    let launcher = ScriptedLauncher::new();
    let mut channel = started_channel(&launcher).await;

    let pending = channel.submit("ls -la").unwrap();
    let token = pending.token().to_string();
    pending.wait().await.unwrap();

    let writes = launcher.writes();
    let last = writes.last().unwrap();
    assert_eq!(last, &format!("ls -la; echo {}{}", token, LINE_TERMINATOR));
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_token() {
    let launcher = ScriptedLauncher::new();
    let mut channel = started_channel(&launcher).await;

    let first = channel.submit("a").unwrap();
    let first_token = first.token().to_string();
    first.wait().await.unwrap();

    let second = channel.submit("a").unwrap();
    assert_ne!(second.token(), first_token);
    second.wait().await.unwrap();
}

#[tokio::test]
async fn test_styled_output_is_returned_raw() {
    let launcher = ScriptedLauncher::new();
    launcher.on("ls", Reply::lines(&["\x1b[34mdir\x1b[0m  file"]));
    let mut channel = started_channel(&launcher).await;

    let lines = channel.submit("ls").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["\x1b[34mdir\x1b[0m  file"]);
}

#[tokio::test]
async fn test_busy_submit_leaves_inflight_request_alone() {
    let launcher = ScriptedLauncher::new();
    launcher.on(
        "slow",
        Reply::Delayed(Duration::from_millis(100), vec!["done".to_string()]),
    );
    let mut channel = started_channel(&launcher).await;

    let pending = channel.submit("slow").unwrap();
    assert!(channel.is_busy());
    assert!(matches!(channel.submit("other"), Err(Error::Busy)));
    assert!(!launcher.received().contains(&"other".to_string()));

    assert_eq!(pending.wait().await.unwrap(), vec!["done"]);
    assert!(!channel.is_busy());
    assert!(channel.submit("other").is_ok());
}

#[tokio::test]
async fn test_progress_streams_partial_output() {
    let launcher = ScriptedLauncher::new();
    launcher.on(
        "build",
        Reply::Delayed(Duration::from_millis(50), vec!["ok".to_string()]),
    );
    let mut channel = started_channel(&launcher).await;
    let mut pending = channel.submit("build").unwrap();

    let mut collected = Vec::new();
    loop {
        match pending.progress(Duration::from_millis(20)).await.unwrap() {
            Progress::Pending(lines) => collected.extend(lines),
            Progress::Complete(lines) => {
                collected.extend(lines);
                break;
            }
        }
    }

    assert_eq!(collected, vec!["ok"]);
    assert!(pending.is_finished());
    assert!(!channel.is_busy());
}

#[tokio::test]
async fn test_dropping_pending_response_releases_channel() {
    let launcher = ScriptedLauncher::new();
    launcher.on("hang", Reply::Hang);
    launcher.on("next", Reply::lines(&["fine"]));
    let mut channel = started_channel(&launcher).await;

    let pending = channel.submit("hang").unwrap();
    assert!(matches!(channel.submit("next"), Err(Error::Busy)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(pending);

    let lines = channel.submit("next").unwrap().wait().await.unwrap();
    assert_eq!(lines, vec!["fine"]);
}

#[tokio::test]
async fn test_cancel_interrupts_running_command() {
    let launcher = ScriptedLauncher::new();
    launcher.on("sleep 30", Reply::Hang);
    let mut channel = started_channel(&launcher).await;

    let mut pending = channel.submit("sleep 30").unwrap();
    // Let the echo land first
    tokio::time::sleep(Duration::from_millis(20)).await;
    channel.cancel();
    assert_eq!(launcher.interrupts(), 1);

    let progress = pending.progress(Duration::from_millis(200)).await.unwrap();
    assert_eq!(progress, Progress::Pending(vec!["^C".to_string()]));
}

#[tokio::test]
async fn test_cancel_without_session_is_harmless() {
    let launcher = ScriptedLauncher::new();
    let mut channel = channel_with(&launcher);
    channel.cancel();
    assert_eq!(launcher.interrupts(), 0);
}

#[tokio::test]
async fn test_shell_exit_fails_request_and_allows_restart() {
    let launcher = ScriptedLauncher::new();
    launcher.on("exit", Reply::Exit(Some(0), Vec::new()));
    let mut channel = started_channel(&launcher).await;

    let err = channel.submit("exit").unwrap().wait().await.unwrap_err();
    assert!(matches!(err, Error::ProcessTerminated { exit_code: Some(0) }));
    assert!(err.needs_restart());
    assert!(!channel.is_running());
    assert!(!channel.is_busy());

    assert!(matches!(
        channel.submit("ls"),
        Err(Error::ProcessTerminated { .. })
    ));

    channel.start().await.unwrap();
    assert_eq!(launcher.launches(), 2);
    assert!(channel.is_running());
}

#[tokio::test]
async fn test_response_timeout_releases_channel() {
    let launcher = ScriptedLauncher::new();
    launcher.on("hang", Reply::Hang);
    let mut channel = ShellChannel::new(
        create_test_shell_config(ShellType::Bash),
        ChannelConfig {
            response_timeout_ms: 50,
            ..create_fast_channel_config()
        },
        Box::new(launcher.clone()),
    );
    channel.start().await.unwrap();

    let err = channel.submit("hang").unwrap().wait().await.unwrap_err();
    assert!(matches!(err, Error::ResponseTimeout { .. }));
    assert!(!channel.is_busy());
    assert!(channel.is_running());
}

#[tokio::test]
async fn test_complete_filters_and_dedups_candidates() {
    let launcher = ScriptedLauncher::new();
    launcher.on(
        "compgen -c -f -- 'gi' 2>/dev/null",
        Reply::lines(&["git", "gist", "git", "  ", "gitk"]),
    );
    let mut channel = started_channel(&launcher).await;

    let candidates = channel.complete("gi").await.unwrap();
    assert_eq!(candidates, vec!["git", "gist", "gitk"]);
}

#[tokio::test]
async fn test_complete_uses_last_word() {
    let launcher = ScriptedLauncher::new();
    launcher.on(
        "compgen -c -f -- 'sr' 2>/dev/null",
        Reply::lines(&["src"]),
    );
    let mut channel = started_channel(&launcher).await;

    assert_eq!(channel.complete("ls sr").await.unwrap(), vec!["src"]);
}

#[tokio::test]
async fn test_complete_unsupported_for_cmd() {
    let launcher = ScriptedLauncher::new();
    let mut channel = create_scripted_channel(&launcher, ShellType::Cmd);

    assert!(matches!(
        channel.complete("di").await,
        Err(Error::CompletionUnsupported { .. })
    ));
}

#[tokio::test]
async fn test_cmd_framing_uses_ampersand() {
    let launcher = ScriptedLauncher::new();
    let mut channel = create_scripted_channel(&launcher, ShellType::Cmd);
    channel.start().await.unwrap();

    let pending = channel.submit("dir").unwrap();
    let token = pending.token().to_string();
    pending.wait().await.unwrap();

    assert_eq!(
        launcher.writes().last().unwrap(),
        &format!("dir & echo {}{}", token, LINE_TERMINATOR)
    );
}

#[tokio::test]
async fn test_stop_releases_session() {
    let launcher = ScriptedLauncher::new();
    let mut channel = started_channel(&launcher).await;

    channel.stop().await.unwrap();
    assert_eq!(launcher.shutdowns(), 1);
    assert!(channel.session().is_none());
    assert!(matches!(channel.submit("ls"), Err(Error::NotStarted)));

    // Stopping again is a no-op
    channel.stop().await.unwrap();
    assert_eq!(launcher.shutdowns(), 1);
}

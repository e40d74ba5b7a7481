//! OS-backed desktop notifier
//!
//! Shells out to the platform's notification tool. A failing or hung tool never
//! fails the write that caused the toast; the notification is logged instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gbdesk_core::{LogNotifier, NotificationRecord, Notifier};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{NotifierBackend, NotifierConfig, DEFAULT_COMMAND_TIMEOUT_MS};

// ----------------------------------------------------------------------------
// Desktop Command
// ----------------------------------------------------------------------------

/// Notification tool to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopCommand {
    /// freedesktop `notify-send`
    NotifySend,
    /// AppleScript `display notification`
    Osascript,
}

impl DesktopCommand {
    /// Tool for the platform this binary was built for
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Self::Osascript
        } else {
            Self::NotifySend
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::Osascript => "osascript",
        }
    }
}

// ----------------------------------------------------------------------------
// Command Notifier
// ----------------------------------------------------------------------------

/// Notifier that runs the platform notification tool
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: DesktopCommand,
    app_name: String,
    timeout: Duration,
    fallback: LogNotifier,
}

impl CommandNotifier {
    pub fn new(command: DesktopCommand, app_name: impl Into<String>) -> Self {
        Self {
            command,
            app_name: app_name.into(),
            timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            fallback: LogNotifier,
        }
    }

    /// Give up on the tool after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to the tool for `record`
    pub fn args(&self, record: &NotificationRecord) -> Vec<String> {
        match self.command {
            DesktopCommand::NotifySend => {
                let mut args = vec!["--app-name".to_string(), self.app_name.clone()];
                if let Some(icon) = &record.icon {
                    args.push("--icon".to_string());
                    args.push(icon.display().to_string());
                }
                // Phone-supplied text must never be parsed as options
                args.push("--".to_string());
                args.push(record.title.clone());
                args.push(record.message.clone());
                args
            }
            DesktopCommand::Osascript => vec![
                "-e".to_string(),
                format!(
                    "display notification {} with title {}",
                    applescript_string(&record.message),
                    applescript_string(&record.title)
                ),
            ],
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, record: &NotificationRecord) -> gbdesk_core::Result<()> {
        let mut command = Command::new(self.command.program());
        command.args(self.args(record));
        if self.run(command).await {
            return Ok(());
        }
        self.fallback.notify(record).await
    }
}

impl CommandNotifier {
    /// Run `command` to completion within the timeout; false on any failure
    async fn run(&self, mut command: Command) -> bool {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        // Dropping the future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, command.kill_on_drop(true).output()).await;

        match output {
            Ok(Ok(output)) if output.status.success() => {
                debug!("Displayed notification via {}", program);
                true
            }
            Ok(Ok(output)) => {
                warn!(
                    "{} exited with {}: {}",
                    program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Ok(Err(e)) => {
                warn!("Failed to run {}: {}", program, e);
                false
            }
            Err(_) => {
                warn!("{} did not finish within {:?}", program, self.timeout);
                false
            }
        }
    }
}

/// Quote `text` as an AppleScript string literal
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Notifier selected by configuration
pub fn build_notifier(config: &NotifierConfig) -> Arc<dyn Notifier> {
    match config.backend {
        NotifierBackend::Command => Arc::new(
            CommandNotifier::new(DesktopCommand::native(), config.app_name.clone())
                .with_timeout(Duration::from_millis(config.command_timeout_ms)),
        ),
        NotifierBackend::Log => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_notify_send_args() {
        let notifier = CommandNotifier::new(DesktopCommand::NotifySend, "Bridge");
        let record = NotificationRecord::new("Alice", "+15550100")
            .with_icon(Some(PathBuf::from("/tmp/phone.png")));

        assert_eq!(
            notifier.args(&record),
            vec![
                "--app-name",
                "Bridge",
                "--icon",
                "/tmp/phone.png",
                "--",
                "Alice",
                "+15550100"
            ]
        );
    }

    #[test]
    fn test_osascript_args_are_quoted() {
        let notifier = CommandNotifier::new(DesktopCommand::Osascript, "Bridge");
        let record = NotificationRecord::new(r#"Say "hi""#, r"back\slash");

        assert_eq!(
            notifier.args(&record),
            vec![
                "-e".to_string(),
                r#"display notification "back\\slash" with title "Say \"hi\"""#.to_string()
            ]
        );
    }

    #[test]
    fn test_notify_send_text_starting_with_dash() {
        let notifier = CommandNotifier::new(DesktopCommand::NotifySend, "Bridge");
        let record = NotificationRecord::new("-u", "--icon=/etc/passwd");

        assert_eq!(
            notifier.args(&record),
            vec!["--app-name", "Bridge", "--", "-u", "--icon=/etc/passwd"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_times_out() {
        let notifier = CommandNotifier::new(DesktopCommand::NotifySend, "Bridge")
            .with_timeout(Duration::from_millis(50));
        let mut command = Command::new("sleep");
        command.arg("30");

        let started = std::time::Instant::now();
        assert!(!notifier.run(command).await);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_command_falls_back() {
        let notifier = CommandNotifier::new(DesktopCommand::NotifySend, "Bridge");
        let command = Command::new("gbdesk-no-such-notifier");

        assert!(!notifier.run(command).await);
        assert!(notifier
            .fallback
            .notify(&NotificationRecord::new("t", "m"))
            .await
            .is_ok());
    }
}

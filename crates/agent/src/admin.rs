//! Administrative commands: `/ping`, `/uptime`, `/shutdown`, `/setenv`.
//!
//! `/ping` and `/uptime` are open to everyone. Privileged commands check the sender
//! against a static allow-list:
//! - empty list → nobody
//! - `"*"` → everyone
//! - otherwise the sender ID must be listed
//!
//! Refusals and usage errors are answered in the chat, never dropped.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use mnemo_core::channel::Channel;
use tokio::sync::watch;
use tracing::{info, warn};

/// Reply to an unauthorized privileged command.
pub const REFUSAL: &str = "You are not allowed to do that.";

/// A parsed administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Ping,
    Uptime,
    Shutdown,
    SetEnv { key: String, value: String },
}

impl AdminCommand {
    /// Parse a `/`-prefixed message.
    ///
    /// `None` for anything that is not a known command (ordinary chat);
    /// `Some(Err(usage))` for a known command with bad arguments.
    pub fn parse(text: &str) -> Option<Result<Self, String>> {
        let rest = text.trim().strip_prefix('/')?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "ping" => Ok(Self::Ping),
            "uptime" => Ok(Self::Uptime),
            "shutdown" => Ok(Self::Shutdown),
            "setenv" => match args.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => Ok(Self::SetEnv {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                }),
                _ => Err("Usage: /setenv KEY VALUE".to_string()),
            },
            _ => return None,
        };
        Some(command)
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Shutdown | Self::SetEnv { .. })
    }
}

/// Who may run privileged commands, plus the process state they act on.
pub struct AdminPolicy {
    allowed_users: Vec<String>,
    env_file: PathBuf,
    started: Instant,
    shutdown: watch::Sender<bool>,
}

impl AdminPolicy {
    pub fn new(allowed_users: Vec<String>, env_file: impl Into<PathBuf>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            allowed_users,
            env_file: env_file.into(),
            started: Instant::now(),
            shutdown,
        }
    }

    pub fn is_authorized(&self, sender_id: &str) -> bool {
        self.allowed_users
            .iter()
            .any(|u| u == "*" || u == sender_id)
    }

    /// Receiver that flips to `true` once `/shutdown` is accepted.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Run a command for `sender_id` and return the reply text.
    pub async fn execute(
        &self,
        command: AdminCommand,
        sender_id: &str,
        channel: &dyn Channel,
    ) -> String {
        if command.is_privileged() && !self.is_authorized(sender_id) {
            warn!(sender = %sender_id, command = ?command, "Refused privileged command");
            return REFUSAL.to_string();
        }

        match command {
            AdminCommand::Ping => {
                let started = Instant::now();
                let reachable = channel.health_check().await.unwrap_or(false);
                let latency_ms = started.elapsed().as_millis();
                if reachable {
                    format!("Pong! {latency_ms}ms")
                } else {
                    format!("Pong! {latency_ms}ms (platform unreachable)")
                }
            }
            AdminCommand::Uptime => format!("Up for {}", format_uptime(self.started.elapsed())),
            AdminCommand::Shutdown => {
                info!(sender = %sender_id, "Shutdown requested");
                self.shutdown.send_replace(true);
                "Shutting down.".to_string()
            }
            AdminCommand::SetEnv { key, value } => {
                match mnemo_config::env_file::set_value(&key, &value, &self.env_file) {
                    Ok(()) => format!("Set {key}. It takes effect on restart."),
                    Err(e) => {
                        warn!(key = %key, error = %e, "setenv failed");
                        format!("Failed to set {key}: {e}")
                    }
                }
            }
        }
    }
}

/// `1d 2h 3m 4s`, leading zero units omitted.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingChannel;

    #[test]
    fn parses_known_commands() {
        assert_eq!(AdminCommand::parse("/ping"), Some(Ok(AdminCommand::Ping)));
        assert_eq!(AdminCommand::parse("  /Uptime "), Some(Ok(AdminCommand::Uptime)));
        assert_eq!(
            AdminCommand::parse("/setenv MODEL gpt-4o mini"),
            Some(Ok(AdminCommand::SetEnv {
                key: "MODEL".into(),
                value: "gpt-4o mini".into(),
            }))
        );
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(AdminCommand::parse("ping"), None);
        assert_eq!(AdminCommand::parse("/shrug"), None);
    }

    #[test]
    fn malformed_setenv_gets_usage() {
        assert_eq!(
            AdminCommand::parse("/setenv MODEL"),
            Some(Err("Usage: /setenv KEY VALUE".into()))
        );
    }

    #[test]
    fn allow_list_rules() {
        assert!(!AdminPolicy::new(vec![], ".env").is_authorized("1"));
        assert!(AdminPolicy::new(vec!["*".into()], ".env").is_authorized("1"));

        let policy = AdminPolicy::new(vec!["1".into()], ".env");
        assert!(policy.is_authorized("1"));
        assert!(!policy.is_authorized("2"));
    }

    #[tokio::test]
    async fn unauthorized_shutdown_is_refused() {
        let policy = AdminPolicy::new(vec!["1".into()], ".env");
        let signal = policy.shutdown_signal();
        let reply = policy
            .execute(AdminCommand::Shutdown, "2", &RecordingChannel::new())
            .await;
        assert_eq!(reply, REFUSAL);
        assert!(!*signal.borrow());
    }

    #[tokio::test]
    async fn authorized_shutdown_flips_the_signal() {
        let policy = AdminPolicy::new(vec!["1".into()], ".env");
        let signal = policy.shutdown_signal();
        let reply = policy
            .execute(AdminCommand::Shutdown, "1", &RecordingChannel::new())
            .await;
        assert_eq!(reply, "Shutting down.");
        assert!(*signal.borrow());
    }

    #[tokio::test]
    async fn ping_and_uptime_are_open_to_everyone() {
        let policy = AdminPolicy::new(vec![], ".env");
        let channel = RecordingChannel::new();
        let ping = policy.execute(AdminCommand::Ping, "9", &channel).await;
        assert!(ping.starts_with("Pong! "));
        assert!(ping.ends_with("ms"));

        let uptime = policy.execute(AdminCommand::Uptime, "9", &channel).await;
        assert!(uptime.starts_with("Up for "));
    }

    #[tokio::test]
    async fn authorized_setenv_writes_the_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let policy = AdminPolicy::new(vec!["1".into()], &path);

        let reply = policy
            .execute(
                AdminCommand::SetEnv {
                    key: "MNEMO_ADMIN_TEST_KEY".into(),
                    value: "on".into(),
                },
                "1",
                &RecordingChannel::new(),
            )
            .await;
        assert_eq!(reply, "Set MNEMO_ADMIN_TEST_KEY. It takes effect on restart.");
        assert!(std::env::var("MNEMO_ADMIN_TEST_KEY").is_err());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("MNEMO_ADMIN_TEST_KEY=\"on\""));
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(5)), "5s");
        assert_eq!(format_uptime(Duration::from_secs(3_725)), "1h 2m 5s");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1h 1m 1s");
    }
}

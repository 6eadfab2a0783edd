//! SSH reachability probe against a single vantage host.
//!
//! One probe is one SSH login + remote-command cycle producing exactly one
//! [`TestResult`]. Probes are infallible by contract: every failure point is
//! classified into a failed result rather than propagated, so a broken host
//! never aborts the run for the remaining vantage hosts.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssh2::{KeyboardInteractivePrompt, Prompt, Session};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::registry::VantageHost;

/// Bound on TCP connect, SSH handshake, and authentication per probe.
/// Command execution itself is unbounded.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Echo packets sent by the remote reachability command.
const PING_COUNT: u32 = 4;

/// Marker in ping output meaning the destination is unreachable.
pub const LOSS_MARKER: &str = "100% packet loss";

/// Synthetic target label for failures before a command channel exists.
pub const TARGET_CONNECTION: &str = "connection";

/// Synthetic target label for command-channel establishment failures.
pub const TARGET_SESSION: &str = "session creation";

/// Outcome of one probe from one vantage host. Produced exactly once per
/// (run, host) pair and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResult {
    /// Vantage host name.
    pub server: String,
    /// Destination probed, or a synthetic label when the probe died before
    /// a destination-directed command ran.
    pub target: String,
    pub success: bool,
    /// Combined remote stdout/stderr, or error text.
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    pub fn new(server: &str, target: &str, success: bool, output: String) -> Self {
        Self {
            server: server.to_string(),
            target: target.to_string(),
            success,
            output,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(server: &str, target: &str, output: impl Into<String>) -> Self {
        Self::new(server, target, false, output.into())
    }
}

/// Where a probe died, before outcome classification.
#[derive(Debug, Error)]
enum ProbeError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("session creation failed: {0}")]
    Session(String),

    #[error("command execution failed: {0}")]
    Exec(String),
}

impl ProbeError {
    /// The target label recorded for a probe that died at this stage.
    fn target_label<'a>(&self, destination: &'a str) -> &'a str {
        match self {
            ProbeError::Connection(_) | ProbeError::Auth(_) => TARGET_CONNECTION,
            ProbeError::Session(_) => TARGET_SESSION,
            ProbeError::Exec(_) => destination,
        }
    }
}

/// Execute one full probe cycle: connect, authenticate, run the
/// reachability command, classify, and durably record the outcome.
///
/// The audit record is appended synchronously before returning; a failed
/// append is a diagnostic only and never changes the returned result.
pub fn run(host: &VantageHost, destination: &str, audit: &AuditLog) -> TestResult {
    debug!(server = %host.name, destination, "probe starting");

    let result = match execute(host, destination) {
        Ok(output) => {
            let success = classify(&output);
            TestResult::new(&host.name, destination, success, output)
        }
        Err(err) => TestResult::failed(&host.name, err.target_label(destination), err.to_string()),
    };

    if let Err(err) = audit.append(&result) {
        warn!(server = %result.server, error = %err, "audit append failed");
    }

    debug!(server = %result.server, success = result.success, "probe finished");
    result
}

/// A run counts as reachable unless the captured output carries the
/// total-loss marker. A non-zero remote exit code alone does not fail the
/// probe; partial packet loss still proves reachability.
fn classify(output: &str) -> bool {
    !output.contains(LOSS_MARKER)
}

fn reachability_command(destination: &str) -> String {
    format!("ping -c {PING_COUNT} {destination}")
}

fn execute(host: &VantageHost, destination: &str) -> Result<String, ProbeError> {
    let addr = host
        .dial_addr()
        .to_socket_addrs()
        .map_err(|err| ProbeError::Connection(err.to_string()))?
        .next()
        .ok_or_else(|| ProbeError::Connection(format!("no address found for {}", host.host)))?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|err| ProbeError::Connection(err.to_string()))?;

    let mut session = Session::new().map_err(|err| ProbeError::Connection(err.to_string()))?;
    session.set_tcp_stream(tcp);
    // The connect bound also covers handshake and authentication.
    session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
    session
        .handshake()
        .map_err(|err| ProbeError::Connection(err.to_string()))?;

    authenticate(&session, host)?;

    // Clear the blocking-call bound: the remote command may block for as
    // long as it likes. Quitting the process abandons it.
    session.set_timeout(0);

    let mut channel = session
        .channel_session()
        .map_err(|err| ProbeError::Session(err.to_string()))?;

    channel
        .exec(&reachability_command(destination))
        .map_err(|err| ProbeError::Exec(err.to_string()))?;

    // Capture combined stdout and stderr regardless of exit status.
    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|err| ProbeError::Exec(err.to_string()))?;
    channel
        .stderr()
        .read_to_string(&mut output)
        .map_err(|err| ProbeError::Exec(err.to_string()))?;

    let _ = channel.wait_close();
    if let Ok(code) = channel.exit_status() {
        debug!(server = %host.name, code, "remote command finished");
    }

    Ok(output)
}

/// Answers every keyboard-interactive challenge with the shared secret.
struct SecretPrompter<'a> {
    secret: &'a str,
}

impl KeyboardInteractivePrompt for SecretPrompter<'_> {
    fn prompt(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[Prompt<'_>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.secret.to_string()).collect()
    }
}

/// Password auth first; servers that only issue interactive challenges get
/// the same secret for every prompt.
fn authenticate(session: &Session, host: &VantageHost) -> Result<(), ProbeError> {
    if session
        .userauth_password(&host.user, &host.password)
        .is_ok()
        && session.authenticated()
    {
        return Ok(());
    }

    let mut prompter = SecretPrompter {
        secret: &host.password,
    };
    match session.userauth_keyboard_interactive(&host.user, &mut prompter) {
        Ok(()) if session.authenticated() => Ok(()),
        Ok(()) => Err(ProbeError::Auth(
            "server rejected all authentication methods".into(),
        )),
        Err(err) => Err(ProbeError::Auth(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use tempfile::TempDir;

    #[test]
    fn classify_accepts_clean_output() {
        let output = "PING 10.1.0.1: 56 data bytes\n\
                      4 packets transmitted, 4 received, 0% packet loss";
        assert!(classify(output));
    }

    #[test]
    fn classify_accepts_partial_loss() {
        let output = "4 packets transmitted, 2 received, 50% packet loss";
        assert!(classify(output));
    }

    #[test]
    fn classify_rejects_total_loss() {
        let output = "4 packets transmitted, 0 received, 100% packet loss";
        assert!(!classify(output));
    }

    #[test]
    fn reachability_command_targets_destination() {
        assert_eq!(reachability_command("10.1.0.1"), "ping -c 4 10.1.0.1");
    }

    #[test]
    fn probe_error_targets() {
        let dest = "10.1.0.1";
        assert_eq!(
            ProbeError::Connection("refused".into()).target_label(dest),
            TARGET_CONNECTION
        );
        assert_eq!(
            ProbeError::Auth("denied".into()).target_label(dest),
            TARGET_CONNECTION
        );
        assert_eq!(
            ProbeError::Session("no channel".into()).target_label(dest),
            TARGET_SESSION
        );
        assert_eq!(ProbeError::Exec("eof".into()).target_label(dest), dest);
    }

    /// A closed local port fails at the connect step: the result carries the
    /// synthetic "connection" target and exactly one audit record lands.
    #[test]
    fn refused_connection_yields_classified_failure() {
        // Grab a port the OS considers free, then close it again.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let host = VantageHost {
            name: "local".into(),
            host: format!("127.0.0.1:{port}"),
            user: "admin".into(),
            password: "admin".into(),
        };

        let dir = TempDir::new().unwrap();
        let audit = AuditLog::new(dir.path().join("audit.log"));

        let result = run(&host, "10.1.0.1", &audit);

        assert!(!result.success);
        assert_eq!(result.server, "local");
        assert_eq!(result.target, TARGET_CONNECTION);
        assert!(result.output.contains("connection failed"));

        let log = std::fs::read_to_string(audit.path()).unwrap();
        assert_eq!(log.matches("Success: false").count(), 1);
    }

    /// A log-write failure must not change the returned result.
    #[test]
    fn audit_failure_is_diagnostic_only() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let host = VantageHost {
            name: "local".into(),
            host: format!("127.0.0.1:{port}"),
            user: "admin".into(),
            password: "admin".into(),
        };

        // A directory path cannot be opened for append.
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::new(dir.path());

        let result = run(&host, "10.1.0.1", &audit);
        assert!(!result.success);
        assert_eq!(result.target, TARGET_CONNECTION);
    }
}

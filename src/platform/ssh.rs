//! Remote command execution over SSH
//!
//! Implements [`RemoteExecutor`] on top of libssh2. Each call connects,
//! authenticates with the host's username/password, runs a single command and
//! tears the connection down again. No pooling: checks that run concurrently
//! against one host each get their own connection.

use crate::constants::{
    SSH_COMMAND_TIMEOUT_SECS, SSH_CONNECT_TIMEOUT_SECS, SSH_HOST_KEY_ALGORITHMS,
};
use crate::core::session::{CommandOutput, RemoteExecutor};
use crate::models::HostCredential;
use crate::utils::SessionError;
use ssh2::{Channel, MethodType, Session};
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

const READ_CHUNK_BYTES: usize = 8192;
const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Transport settings for SSH sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// TCP connect budget, also applied to the handshake
    pub connect_timeout: Duration,
    /// Budget for a single command, from channel open to close
    pub command_timeout: Duration,
    /// Comma-separated host-key algorithm preference
    pub host_key_algorithms: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(SSH_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(SSH_COMMAND_TIMEOUT_SECS),
            host_key_algorithms: SSH_HOST_KEY_ALGORITHMS.to_string(),
        }
    }
}

impl SessionConfig {
    /// Upper bound for a whole `execute` call
    pub fn deadline(&self) -> Duration {
        self.connect_timeout + self.command_timeout
    }
}

/// [`RemoteExecutor`] backed by ssh2
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    config: SessionConfig,
}

impl SshExecutor {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// An authenticated SSH session that disconnects when dropped.
///
/// Acquisition happens in [`ScopedSession::open`]; every early return after
/// the handshake (auth failure, exec failure, read failure) drops the guard
/// and sends a disconnect.
struct ScopedSession {
    session: Session,
    endpoint: String,
    command_timeout: Duration,
}

impl ScopedSession {
    fn open(credential: &HostCredential, config: &SessionConfig) -> Result<Self, SessionError> {
        let endpoint = credential.endpoint();
        let tcp = connect_tcp(credential, config.connect_timeout)?;
        tcp.set_read_timeout(Some(config.command_timeout)).ok();
        tcp.set_write_timeout(Some(config.connect_timeout)).ok();

        let mut session =
            Session::new().map_err(|e| SessionError::Handshake(format!("session init: {e}")))?;
        session.set_timeout(duration_to_millis(config.command_timeout));
        session
            .method_pref(MethodType::HostKey, &config.host_key_algorithms)
            .map_err(|e| SessionError::Handshake(format!("host key preference rejected: {e}")))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let scoped = ScopedSession {
            session,
            endpoint,
            command_timeout: config.command_timeout,
        };

        let username = credential.username().as_str();
        scoped
            .session
            .userauth_password(username, credential.secret().as_str())
            .map_err(|e| SessionError::Authentication {
                username: username.to_string(),
                reason: e.to_string(),
            })?;
        if !scoped.session.authenticated() {
            return Err(SessionError::Authentication {
                username: username.to_string(),
                reason: "server did not accept the password".to_string(),
            });
        }

        Ok(scoped)
    }

    fn run(&self, command: &str) -> Result<CommandOutput, SessionError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| SessionError::Channel(format!("open failed: {e}")))?;
        channel
            .exec(&format!("sh -c {}", shell_escape::unix::escape(command.into())))
            .map_err(|e| SessionError::Channel(format!("exec failed: {e}")))?;

        let streams = self.read_streams(&channel);
        self.session.set_blocking(true);
        let (stdout, stderr) = streams?;

        channel
            .wait_close()
            .map_err(|e| SessionError::Channel(format!("close failed: {e}")))?;
        let exit_code = channel
            .exit_status()
            .map_err(|e| SessionError::Channel(format!("exit status unavailable: {e}")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }
}

impl ScopedSession {
    /// Read stdout and stderr together until the remote side closes both, so
    /// a full stderr window cannot stall stdout.
    fn read_streams(&self, channel: &Channel) -> Result<(Vec<u8>, Vec<u8>), SessionError> {
        let started = Instant::now();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        self.session.set_blocking(false);
        loop {
            let out_progress = drain_available(&mut channel.stream(0), &mut stdout)
                .map_err(|e| SessionError::Channel(format!("stdout read failed: {e}")))?;
            let err_progress = match drain_available(&mut channel.stderr(), &mut stderr) {
                Ok(progress) => progress,
                Err(e) => {
                    crate::logger::log_warn(&format!(
                        "SshExecutor: stderr read from {} failed: {}",
                        self.endpoint, e
                    ));
                    false
                }
            };

            if channel.eof() && !out_progress && !err_progress {
                return Ok((stdout, stderr));
            }
            if started.elapsed() >= self.command_timeout {
                return Err(SessionError::Timeout(self.command_timeout));
            }
            if !out_progress && !err_progress {
                std::thread::sleep(READ_POLL_INTERVAL);
            }
        }
    }
}

/// Append whatever `reader` has ready to `buf`. Returns whether any bytes
/// were read; `WouldBlock` and EOF both count as no progress.
fn drain_available<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    let mut progressed = false;
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(progressed),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                progressed = true;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(progressed),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "vmprereq: done", None) {
            crate::logger::log_debug(&format!(
                "SshExecutor: disconnect from {} failed: {}",
                self.endpoint, e
            ));
        }
    }
}

fn connect_tcp(credential: &HostCredential, timeout: Duration) -> Result<TcpStream, SessionError> {
    let endpoint = credential.endpoint();
    let addrs: Vec<SocketAddr> = (credential.address(), credential.port())
        .to_socket_addrs()
        .map_err(|e| SessionError::Connection {
            endpoint: endpoint.clone(),
            reason: format!("address resolution failed: {e}"),
        })?
        .collect();

    let mut last_error = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(SessionError::Connection {
        endpoint,
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses resolved".to_string()),
    })
}

fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[async_trait::async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        credential: &HostCredential,
        command: &str,
    ) -> Result<String, SessionError> {
        let endpoint = credential.endpoint();
        crate::logger::log_debug(&format!(
            "SshExecutor::execute START {} user='{}' ({} byte command)",
            endpoint,
            credential.username(),
            command.len()
        ));

        let credential = credential.clone();
        let command = command.to_string();
        let config = self.config.clone();
        let deadline = config.deadline();

        let task = tokio::task::spawn_blocking(move || {
            let session = ScopedSession::open(&credential, &config)?;
            session.run(&command)
        });

        let result = match tokio::time::timeout(deadline, task).await {
            Err(_) => Err(SessionError::Timeout(deadline)),
            Ok(Err(join_err)) => Err(SessionError::Task(join_err.to_string())),
            Ok(Ok(output)) => output.and_then(CommandOutput::into_result),
        };

        match &result {
            Ok(stdout) => crate::logger::log_debug(&format!(
                "SshExecutor::execute OK {} ({} bytes stdout)",
                endpoint,
                stdout.len()
            )),
            Err(e) => crate::logger::log_warn(&format!(
                "SshExecutor::execute FAILED {}: {}",
                endpoint, e
            )),
        }

        result
    }
}

//! Mock remote execution for testing without real servers
//!
//! [`MockExecutor`] recognises every command the engine sends by a distinctive
//! fragment and answers with scripted output. Setup scripts can rewrite the
//! answer of a check, which lets tests drive a validate → fix → validate cycle.

use super::credential::CredentialResolver;
use super::session::RemoteExecutor;
use crate::models::{HostCredential, HostId, SecureString, Username};
use crate::utils::{CredentialError, SessionError};
use std::collections::HashMap;
use std::sync::Mutex;

pub const ROUTE_USER_GROUP: &str = "userGroup";
pub const ROUTE_ULIMIT: &str = "ulimit";
pub const ROUTE_SECURITY_LIMITS: &str = "securityLimits";
pub const ROUTE_SYSCTL: &str = "sysctl";
pub const ROUTE_JVM: &str = "jvm";
pub const ROUTE_THREAD_POOL: &str = "threadPool";
pub const ROUTE_GC: &str = "garbageCollector";
pub const ROUTE_PASSWD: &str = "passwd";
pub const ROUTE_SETUP_USER_GROUP: &str = "setup:userGroup";
pub const ROUTE_SETUP_ULIMIT: &str = "setup:ulimit";
pub const ROUTE_SETUP_SYSCTL: &str = "setup:sysctl";

/// Command fragment → route. Setup scripts come first: they contain check
/// fragments in their verification lines.
const ROUTES: &[(&str, &str)] = &[
    ("BEGIN vmprereq limits", ROUTE_SETUP_ULIMIT),
    ("BEGIN vmprereq sysctl", ROUTE_SETUP_SYSCTL),
    ("groupadd", ROUTE_SETUP_USER_GROUP),
    ("passwd -S", ROUTE_PASSWD),
    ("getent group", ROUTE_USER_GROUP),
    ("ulimit -n", ROUTE_ULIMIT),
    ("limits.d", ROUTE_SECURITY_LIMITS),
    ("sysctl vm.max_map_count", ROUTE_SYSCTL),
    ("java -version", ROUTE_JVM),
    ("grep -E 'thread", ROUTE_THREAD_POOL),
    ("ps -eo", ROUTE_GC),
];

pub fn classify(command: &str) -> Option<&'static str> {
    ROUTES
        .iter()
        .find(|(fragment, _)| command.contains(fragment))
        .map(|(_, route)| *route)
}

pub const HEALTHY_USER_GROUP: &str =
    "uid=1001(wmuser) gid=1001(wmuser) groups=1001(wmuser)\nwmuser:x:1001:\n";
pub const HEALTHY_ULIMIT: &str = "65536\n16384\n10240\n";
pub const HEALTHY_SECURITY_LIMITS: &str =
    "wmuser soft nofile 10240\n---DIVIDER---\ntotal 0\n";
pub const HEALTHY_SYSCTL: &str = "vm.max_map_count = 262144\nfs.file-max = 500000\nnet.core.somaxconn = 1024\nnet.ipv4.ip_local_port_range = 1024 65535\n";
pub const HEALTHY_JVM: &str =
    "openjdk version \"17.0.9\" 2023-10-17\n---JAVA_HOME---\n/usr/lib/jvm/java-17\n";
pub const HEALTHY_THREAD_POOL: &str = "server.tomcat.threads.max=200\n";
pub const HEALTHY_GC: &str = "java -Xms1g -Xmx2g -XX:+UseG1GC -jar app.jar\n";

/// Scripted [`RemoteExecutor`]
pub struct MockExecutor {
    responses: Mutex<HashMap<&'static str, Result<String, String>>>,
    after_setup: HashMap<&'static str, Vec<(&'static str, String)>>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl MockExecutor {
    /// Every check passes, every setup step succeeds
    pub fn healthy() -> Self {
        let mut responses: HashMap<&'static str, Result<String, String>> = HashMap::new();
        for (route, output) in [
            (ROUTE_USER_GROUP, HEALTHY_USER_GROUP),
            (ROUTE_ULIMIT, HEALTHY_ULIMIT),
            (ROUTE_SECURITY_LIMITS, HEALTHY_SECURITY_LIMITS),
            (ROUTE_SYSCTL, HEALTHY_SYSCTL),
            (ROUTE_JVM, HEALTHY_JVM),
            (ROUTE_THREAD_POOL, HEALTHY_THREAD_POOL),
            (ROUTE_GC, HEALTHY_GC),
            (ROUTE_PASSWD, "wmuser P 2024-01-01 0 99999 7 -1 (Password set, SHA512 crypt.)\n"),
            (ROUTE_SETUP_USER_GROUP, "uid=1001(wmuser) gid=1001(wmuser) groups=1001(wmuser)\n"),
            (ROUTE_SETUP_ULIMIT, "Current limits for wmuser:\nwmuser soft nofile 10240\n"),
            (ROUTE_SETUP_SYSCTL, "Current sysctl settings:\nvm.max_map_count = 262144\n"),
        ] {
            responses.insert(route, Ok(output.to_string()));
        }

        Self {
            responses: Mutex::new(responses),
            after_setup: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `route` with `output`
    pub fn respond(self, route: &'static str, output: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(route, Ok(output.to_string()));
        self
    }

    /// Fail `route` as an authentication error carrying `message`
    pub fn fail(self, route: &'static str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(route, Err(message.to_string()));
        self
    }

    /// Once `setup_route` runs, answer `check_route` with `output`
    pub fn after_setup(mut self, setup_route: &'static str, check_route: &'static str, output: &str) -> Self {
        self.after_setup
            .entry(setup_route)
            .or_default()
            .push((check_route, output.to_string()));
        self
    }

    /// Routes in call order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }

    /// Addresses in call order
    pub fn endpoints(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls().iter().filter(|r| **r == route).count()
    }

    pub fn setup_calls(&self) -> usize {
        self.calls().iter().filter(|r| r.starts_with("setup:")).count()
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for MockExecutor {
    async fn execute(&self, credential: &HostCredential, command: &str) -> Result<String, SessionError> {
        let route = classify(command)
            .ok_or_else(|| SessionError::CommandFailed(format!("unexpected command: {}", command)))?;
        self.calls
            .lock()
            .unwrap()
            .push((credential.endpoint(), route));

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(route)
            .cloned()
            .unwrap_or_else(|| Err(format!("no response scripted for {}", route)));

        if response.is_ok() {
            if let Some(updates) = self.after_setup.get(route) {
                let mut responses = self.responses.lock().unwrap();
                for (check_route, output) in updates {
                    responses.insert(*check_route, Ok(output.clone()));
                }
            }
        }

        response.map_err(|reason| SessionError::Authentication {
            username: credential.username().to_string(),
            reason,
        })
    }
}

/// Resolver over a fixed set of hosts with plaintext passwords
pub struct MockHosts {
    hosts: HashMap<HostId, (Option<String>, String)>,
}

impl MockHosts {
    pub fn new() -> Self {
        Self {
            hosts: HashMap::new(),
        }
    }

    /// Host `id` at `10.0.0.<id>`, optionally named
    pub fn with_host(mut self, id: u64, name: Option<&str>) -> Self {
        self.hosts
            .insert(HostId(id), (name.map(str::to_string), format!("10.0.0.{}", id)));
        self
    }
}

#[async_trait::async_trait]
impl CredentialResolver for MockHosts {
    async fn resolve_credential(&self, host: HostId) -> Result<HostCredential, CredentialError> {
        let (_, address) = self.hosts.get(&host).ok_or(CredentialError::NotFound(host))?;
        Ok(HostCredential::new(
            address.clone(),
            22,
            Username::new("ubuntu")?,
            SecureString::new("password"),
        ))
    }

    async fn resolve_host_label(&self, host: HostId) -> Result<String, CredentialError> {
        let (name, address) = self.hosts.get(&host).ok_or(CredentialError::NotFound(host))?;
        Ok(name.clone().unwrap_or_else(|| address.clone()))
    }
}

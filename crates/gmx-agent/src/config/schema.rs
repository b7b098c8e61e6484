use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use gmx_core::endpoint::default_socket_dir;
use gmx_core::error::{GmxError, Result};

use crate::transport::TransportKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub agent: AgentSection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: 1,
            agent: AgentSection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GmxError::UnsupportedVersion);
        }
        self.agent.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    #[serde(default)]
    pub transport: TransportKind,

    /// Directory holding the unix socket. Defaults to the platform temp dir.
    #[serde(default)]
    pub socket_dir: Option<PathBuf>,

    /// Close connections idle this long between requests. Unset: never.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,

    /// Drop connections beyond this many concurrent clients. Unset: no cap.
    #[serde(default)]
    pub max_connections: Option<usize>,

    #[serde(default = "default_publish_cpu_time")]
    pub publish_cpu_time: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            socket_dir: None,
            idle_timeout_ms: None,
            max_connections: None,
            publish_cpu_time: default_publish_cpu_time(),
        }
    }
}

impl AgentSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(ms) = self.idle_timeout_ms {
            if !(1000..=3_600_000).contains(&ms) {
                return Err(GmxError::Config(
                    "agent.idle_timeout_ms must be between 1000 and 3600000".into(),
                ));
            }
        }
        if self.max_connections == Some(0) {
            return Err(GmxError::Config(
                "agent.max_connections must be at least 1".into(),
            ));
        }
        if cfg!(not(unix)) && self.transport == TransportKind::Unix {
            return Err(GmxError::Config(
                "agent.transport unix is not available on this platform".into(),
            ));
        }
        Ok(())
    }

    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir.clone().unwrap_or_else(default_socket_dir)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

fn default_publish_cpu_time() -> bool {
    true
}

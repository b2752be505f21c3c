/*!
 * Gateway Configuration
 *
 * Defaults come from `core::limits`; environment variables and JSON
 * documents can override them.
 *
 * Environment variables:
 * - GATEWAY_NOFILE: descriptors per process
 * - GATEWAY_NFILE: open files system-wide
 * - GATEWAY_USER_MEMORY: bytes of user memory per process
 * - GATEWAY_MAX_SOCKETS: live socket objects in the loopback stack
 * - GATEWAY_MAX_BACKLOG: upper clamp for listen backlog
 * - GATEWAY_RCVBUF: queued receive entries per socket
 * - GATEWAY_BLOCK_TIMEOUT_MS: bound on blocking accept/recv (unset = forever)
 */

use crate::core::limits::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Loopback socket stack settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub max_sockets: usize,
    pub max_backlog: usize,
    pub rcvbuf_entries: usize,
    pub block_timeout_ms: Option<u64>,
}

impl LoopbackConfig {
    pub fn block_timeout(&self) -> Option<Duration> {
        self.block_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            max_sockets: DEFAULT_MAX_SOCKETS,
            max_backlog: DEFAULT_MAX_BACKLOG,
            rcvbuf_entries: DEFAULT_RCVBUF_ENTRIES,
            block_timeout_ms: DEFAULT_BLOCK_TIMEOUT.map(|d| d.as_millis() as u64),
        }
    }
}

/// Top-level gateway settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub nofile: usize,
    pub nfile: usize,
    pub user_memory_size: usize,
    pub loopback: LoopbackConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            nofile: NOFILE,
            nfile: NFILE,
            user_memory_size: DEFAULT_USER_MEMORY,
            loopback: LoopbackConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by any `GATEWAY_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("GATEWAY_NOFILE", &mut config.nofile);
        override_from_env("GATEWAY_NFILE", &mut config.nfile);
        override_from_env("GATEWAY_USER_MEMORY", &mut config.user_memory_size);
        override_from_env("GATEWAY_MAX_SOCKETS", &mut config.loopback.max_sockets);
        override_from_env("GATEWAY_MAX_BACKLOG", &mut config.loopback.max_backlog);
        override_from_env("GATEWAY_RCVBUF", &mut config.loopback.rcvbuf_entries);

        let mut timeout_ms = 0u64;
        if override_from_env("GATEWAY_BLOCK_TIMEOUT_MS", &mut timeout_ms) {
            config.loopback.block_timeout_ms = Some(timeout_ms);
        }
        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Replace `slot` with the parsed variable; malformed values are ignored
fn override_from_env<T: FromStr>(key: &str, slot: &mut T) -> bool {
    let Ok(raw) = std::env::var(key) else {
        return false;
    };
    match raw.trim().parse() {
        Ok(value) => {
            *slot = value;
            true
        }
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed configuration value");
            false
        }
    }
}

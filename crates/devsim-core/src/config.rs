//! Service configuration.
//!
//! Defaults and environment variable names live here so the launcher, the
//! server and the tests agree on them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default values.
pub mod defaults {
    use std::net::{Ipv4Addr, SocketAddr};

    pub const BIND: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 9003);
    pub const DATA_DIR: &str = "./data";
    pub const SEED_DEFAULT_SIMULATION: bool = true;
    /// Twin write attempts per device
    pub const PROVISION_MAX_ATTEMPTS: u32 = 5;
    /// Initial retry backoff, doubled on every attempt
    pub const PROVISION_RETRY_MS: u64 = 500;
    /// Delay between firmware update stages
    pub const FIRMWARE_STEP_MS: u64 = 2_000;
    pub const LOG_JSON: bool = false;
}

/// Environment variable names.
pub mod env_vars {
    pub const BIND: &str = "DEVSIM_BIND";
    pub const DATA_DIR: &str = "DEVSIM_DATA_DIR";
    pub const IOTHUB_CONNSTRING: &str = "DEVSIM_IOTHUB_CONNSTRING";
    pub const SEED_DEFAULT_SIMULATION: &str = "DEVSIM_SEED_DEFAULT_SIMULATION";
    pub const PROVISION_MAX_ATTEMPTS: &str = "DEVSIM_PROVISION_MAX_ATTEMPTS";
    pub const PROVISION_RETRY_MS: &str = "DEVSIM_PROVISION_RETRY_MS";
    pub const FIRMWARE_STEP_MS: &str = "DEVSIM_FIRMWARE_STEP_MS";
    pub const LOG_JSON: &str = "DEVSIM_LOG_JSON";
}

/// Provisioning worker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::PROVISION_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(defaults::PROVISION_RETRY_MS),
        }
    }
}

/// Typed service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    /// Connection string of the `default` hub. A local hub is created when unset.
    pub iothub_connection_string: Option<String>,
    pub seed_default_simulation: bool,
    pub provisioning: ProvisioningConfig,
    pub firmware_step: Duration,
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: defaults::BIND,
            data_dir: PathBuf::from(defaults::DATA_DIR),
            iothub_connection_string: None,
            seed_default_simulation: defaults::SEED_DEFAULT_SIMULATION,
            provisioning: ProvisioningConfig::default(),
            firmware_step: Duration::from_millis(defaults::FIRMWARE_STEP_MS),
            log_json: defaults::LOG_JSON,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str, default: bool| {
            lookup(name)
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        Self {
            bind: parsed(&lookup, env_vars::BIND).unwrap_or(defaults::BIND),
            data_dir: lookup(env_vars::DATA_DIR)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::DATA_DIR)),
            iothub_connection_string: lookup(env_vars::IOTHUB_CONNSTRING)
                .filter(|s| !s.trim().is_empty()),
            seed_default_simulation: flag(
                env_vars::SEED_DEFAULT_SIMULATION,
                defaults::SEED_DEFAULT_SIMULATION,
            ),
            provisioning: ProvisioningConfig {
                max_attempts: parsed(&lookup, env_vars::PROVISION_MAX_ATTEMPTS)
                    .filter(|n: &u32| *n > 0)
                    .unwrap_or(defaults::PROVISION_MAX_ATTEMPTS),
                retry_backoff: Duration::from_millis(
                    parsed(&lookup, env_vars::PROVISION_RETRY_MS).unwrap_or(defaults::PROVISION_RETRY_MS),
                ),
            },
            firmware_step: Duration::from_millis(
                parsed(&lookup, env_vars::FIRMWARE_STEP_MS).unwrap_or(defaults::FIRMWARE_STEP_MS),
            ),
            log_json: flag(env_vars::LOG_JSON, defaults::LOG_JSON),
        }
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("devsim.redb")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|s| s.trim().parse().ok())
}

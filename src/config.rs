use anyhow::{
    Context,
    Result,
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::Path,
    time::Duration,
};

/// Process-wide configuration, loaded once at startup and immutable after.
///
/// The file is JSON with camelCase keys; every field is optional and falls
/// back to the defaults below. Listener map keys are port numbers written as
/// strings, matching the deployed config files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub listeners: HashMap<String, ListenerConfig>,
    pub printer_profiles: HashMap<String, PrinterProfile>,
    #[serde(rename = "defaultTargetIP")]
    pub default_target_ip: String,
    pub default_target_port: u16,
    pub pending_ttl_seconds: u64,
    pub max_job_bytes: usize,
    pub read_idle_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub local_http_port: u16,
    pub local_proxy_token: String,
    pub agent_notify_port: u16,
    pub agent_notify_token: String,
    pub notify_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            printer_profiles: HashMap::new(),
            default_target_ip: String::new(),
            default_target_port: 9100,
            pending_ttl_seconds: 300,
            max_job_bytes: 50 * 1024 * 1024,
            read_idle_seconds: 30,
            connect_timeout_seconds: 10,
            local_http_port: 57991,
            local_proxy_token: String::new(),
            agent_notify_port: 57981,
            agent_notify_token: String::new(),
            notify_timeout_seconds: 5,
        }
    }
}

/// Static mapping from one proxy listening port to the real device behind it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenerConfig {
    #[serde(rename = "targetIP")]
    pub target_ip: String,
    pub target_port: Option<u16>,
    pub device_name: Option<String>,
}

/// Per-device injection profile, keyed by device IP with a `default` fallback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrinterProfile {
    pub injector: String,
    pub pjl_user_key: Option<String>,
    pub pjl_pass_key: Option<String>,
    pub pjl_extra: Vec<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        // No listeners configured means one raw listener on the standard port,
        // aimed at the default target.
        if config.listeners.is_empty() {
            config
                .listeners
                .insert("9100".to_string(), ListenerConfig::default());
        }

        Ok(config)
    }

    /// Injection profile for a device, falling back to the `default` entry
    /// and then to an all-default profile (no injection).
    pub fn profile_for(&self, device_ip: &str) -> PrinterProfile {
        self.printer_profiles
            .get(device_ip)
            .or_else(|| self.printer_profiles.get("default"))
            .cloned()
            .unwrap_or_default()
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_seconds)
    }

    pub fn read_idle(&self) -> Duration {
        Duration::from_secs(self.read_idle_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds)
    }
}

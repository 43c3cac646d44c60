use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "dockerdns.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub hosts_file: PathBuf,
    /// Suffix appended to every container name (`web` -> `web.docker`).
    pub domain: String,
    /// Process to send SIGHUP to after each change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_process: Option<String>,
    /// Take container addresses from this network instead of the default
    /// bridge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    pub event_buffer: usize,
    pub reconnect_delay_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts_file: PathBuf::from("/etc/hosts"),
            domain: "docker".into(),
            notify_process: None,
            network_name: None,
            event_buffer: 128,
            reconnect_delay_secs: 2,
            log_level: "info".into(),
        }
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Layers defaults, the TOML file, `dockerdns.json`, `DOCKERDNS_*`
    /// environment variables and finally `overrides`.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Self> {
        let toml = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml))
            .merge(Json::file("dockerdns.json"))
            .merge(Env::prefixed("DOCKERDNS_"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Normalizes the domain suffix and rejects unusable values.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        self.domain = self.domain.trim().trim_start_matches('.').to_string();
        if self.domain.is_empty() {
            anyhow::bail!("domain suffix must not be empty");
        }
        if self.domain.contains(char::is_whitespace) {
            anyhow::bail!("domain suffix {:?} contains whitespace", self.domain);
        }
        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be greater than zero");
        }
        if self.hosts_file.as_os_str().is_empty() {
            anyhow::bail!("hosts_file must not be empty");
        }
        self.notify_process = self.notify_process.take().filter(|p| !p.trim().is_empty());
        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryOptions;
use crate::namer::{DockerLabelNamer, RegexNamer, ServiceNamer};

/// Which naming strategy derives service names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamerKind {
    DockerLabel,
    Regex,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Docker endpoint, e.g. `unix:///var/run/docker.sock` or
    /// `tcp://10.0.0.2:2375`.  Local defaults when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_endpoint: Option<String>,
    /// IP advertised for every discovered port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub sleep_interval_secs: u64,
    pub service_namer: NamerKind,
    pub service_name_label: String,
    pub service_name_match: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_endpoint: None,
            advertise_ip: None,
            hostname: None,
            sleep_interval_secs: 10,
            service_namer: NamerKind::DockerLabel,
            service_name_label: "ServiceName".into(),
            // Strips the trailing hash Docker tooling appends to names.
            service_name_match: "^/(.+)(-[0-9a-z]{7,14})$".into(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if config.sleep_interval_secs == 0 {
            anyhow::bail!("Invalid sleep_interval_secs: must be at least 1");
        }

        Ok(config)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("sidecar.toml"))
            .merge(Json::file("sidecar.json"))
            .merge(Env::prefixed("SIDECAR_"))
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        let hostname = self
            .hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_default();

        DiscoveryOptions {
            advertise_ip: self.advertise_ip.clone().unwrap_or_default(),
            hostname,
            sleep_interval: Duration::from_secs(self.sleep_interval_secs),
        }
    }

    pub fn service_namer(&self) -> anyhow::Result<Arc<dyn ServiceNamer>> {
        Ok(match self.service_namer {
            NamerKind::DockerLabel => Arc::new(DockerLabelNamer::new(&self.service_name_label)),
            NamerKind::Regex => Arc::new(RegexNamer::new(&self.service_name_match)?),
        })
    }
}

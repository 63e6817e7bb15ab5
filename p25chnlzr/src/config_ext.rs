//! Extension adding the `chnlzr` section getters to `p25config::Config`
//!
//! ```rust,ignore
//! use p25config::get_config;
//! use p25chnlzr::ChnlzrConfigExt;
//!
//! let settings = get_config().get_chnlzr_settings()?;
//! let controller = settings.controller();
//! ```

use crate::host::LinkSettings;
use crate::multi::MultiHostController;
use crate::negotiation::NegotiationProfile;
use anyhow::{Result, anyhow};
use p25config::Config;
use p25model::HostId;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_IDLE_STATE_THRESHOLD_MS: u64 = 15_000;
const DEFAULT_EVENTS_QUEUE_SIZE: u64 = 64;

/// One entry of `chnlzr.hosts`.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub profile: NegotiationProfile,
    /// Overrides `chnlzr.connection_timeout_ms` for this host.
    #[serde(default)]
    pub connection_timeout_ms: Option<u64>,
}

impl HostConfig {
    pub fn host_id(&self) -> HostId {
        HostId::new(self.hostname.clone(), self.port)
    }
}

/// Snapshot of the `chnlzr` section.
#[derive(Debug, Clone)]
pub struct ChnlzrSettings {
    pub link: LinkSettings,
    pub hosts: Vec<HostConfig>,
}

impl ChnlzrSettings {
    /// Fallback chain over the configured hosts, in configuration order.
    pub fn controller(&self) -> MultiHostController {
        MultiHostController::from_hosts(self.hosts.iter().map(|host| {
            let mut link = self.link.clone();
            if let Some(ms) = host.connection_timeout_ms {
                link.connection_timeout = Duration::from_millis(ms);
            }
            (host.host_id(), host.profile, link)
        }))
    }
}

/// Trait d'extension pour la section `chnlzr` de la configuration
pub trait ChnlzrConfigExt {
    fn get_chnlzr_hosts(&self) -> Result<Vec<HostConfig>>;

    fn get_chnlzr_link_settings(&self) -> LinkSettings;

    /// Hosts plus link settings. Fails when no host is configured.
    fn get_chnlzr_settings(&self) -> Result<ChnlzrSettings>;
}

impl ChnlzrConfigExt for Config {
    fn get_chnlzr_hosts(&self) -> Result<Vec<HostConfig>> {
        self.get_typed(&["chnlzr", "hosts"])
    }

    fn get_chnlzr_link_settings(&self) -> LinkSettings {
        LinkSettings {
            connection_timeout: Duration::from_millis(self.get_u64_or(
                &["chnlzr", "connection_timeout_ms"],
                DEFAULT_CONNECTION_TIMEOUT_MS,
            )),
            idle_state_threshold: Duration::from_millis(self.get_u64_or(
                &["chnlzr", "idle_state_threshold_ms"],
                DEFAULT_IDLE_STATE_THRESHOLD_MS,
            )),
            events_queue_size: self
                .get_u64_or(&["chnlzr", "events_queue_size"], DEFAULT_EVENTS_QUEUE_SIZE)
                as usize,
        }
    }

    fn get_chnlzr_settings(&self) -> Result<ChnlzrSettings> {
        let hosts = self.get_chnlzr_hosts()?;
        if hosts.is_empty() {
            return Err(anyhow!("chnlzr.hosts is empty"));
        }
        Ok(ChnlzrSettings {
            link: self.get_chnlzr_link_settings(),
            hosts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn test_host_entries_deserialize() {
        let hosts: Vec<HostConfig> = serde_yaml::from_str(
            "- hostname: a\n  port: 1\n- hostname: b\n  port: 2\n  profile: request_first\n  connection_timeout_ms: 250\n",
        )
        .unwrap();

        assert_eq!(hosts[0].profile, NegotiationProfile::CapabilitiesFirst);
        assert_eq!(hosts[1].profile, NegotiationProfile::RequestFirst);
        assert_eq!(hosts[1].connection_timeout_ms, Some(250));
        assert_eq!(hosts[1].host_id(), HostId::new("b", 2));
    }

    #[test]
    fn test_settings_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        let settings = config.get_chnlzr_settings().unwrap();

        assert_eq!(settings.hosts.len(), 1);
        assert_eq!(settings.link.connection_timeout, Duration::from_secs(5));
        assert_eq!(settings.controller().len(), 1);

        config
            .set_value(&["chnlzr", "hosts"], Value::Sequence(vec![]))
            .unwrap();
        assert!(config.get_chnlzr_settings().is_err());
    }
}

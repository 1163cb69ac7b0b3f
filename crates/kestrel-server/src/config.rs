use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use kestrel_accounts::ServiceConfig;

/// Process settings, read from `KESTREL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub actor_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("KESTREL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("KESTREL_PORT")
            .unwrap_or_else(|| "9443".into())
            .parse()
            .context("KESTREL_PORT must be a port number")?;
        let data_dir = PathBuf::from(var("KESTREL_DATA_DIR").unwrap_or_else(|| ".".into()));
        let timeout_secs: u64 = var("KESTREL_ACTOR_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".into())
            .parse()
            .context("KESTREL_ACTOR_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Self {
            host,
            port,
            data_dir,
            actor_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            data_dir: self.data_dir.clone(),
            actor_timeout: self.actor_timeout,
            ..Default::default()
        }
    }
}

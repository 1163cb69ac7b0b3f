//! Server-wide persistent settings: the opaque id key and invitation codes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use kestrel_crypto::rand::generate_server_key;

use crate::error::{StoreError, StoreResult};

pub const CONFIG_FILE: &str = "config.json";
const AES_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedInvitation {
    pub code: String,
    pub by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(with = "kestrel_types::b64")]
    pub aes_key: Vec<u8>,
    #[serde(default)]
    pub invitations: Vec<String>,
    #[serde(default)]
    pub used_invitations: Vec<UsedInvitation>,
}

impl ServerConfig {
    fn fresh() -> Self {
        Self {
            aes_key: generate_server_key().to_vec(),
            invitations: Vec::new(),
            used_invitations: Vec::new(),
        }
    }

    pub fn aes_key(&self) -> StoreResult<[u8; AES_KEY_LEN]> {
        self.aes_key
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corrupt {
                what: CONFIG_FILE.into(),
                reason: format!("aes_key must be {} bytes, got {}", AES_KEY_LEN, self.aes_key.len()),
            })
    }

    /// Move `code` from the open to the used list. False if it was not open.
    pub fn consume_invitation(&mut self, code: &str, by: &str) -> bool {
        let Some(index) = self.invitations.iter().position(|c| c == code) else {
            return false;
        };
        let code = self.invitations.remove(index);
        self.used_invitations.push(UsedInvitation {
            code,
            by: by.to_string(),
        });
        true
    }
}

/// A [`ServerConfig`] bound to the file it was read from.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    pub config: ServerConfig,
}

impl ConfigFile {
    /// Read `<data_dir>/config.json`, creating it with a fresh key if absent.
    pub async fn load_or_create(data_dir: &Path) -> StoreResult<Self> {
        let path = data_dir.join(CONFIG_FILE);
        match fs::read(&path).await {
            Ok(bytes) => {
                let config: ServerConfig = serde_json::from_slice(&bytes)?;
                config.aes_key()?;
                info!("Config loaded from {}", path.display());
                Ok(Self { path, config })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(data_dir).await?;
                let file = Self {
                    path,
                    config: ServerConfig::fresh(),
                };
                file.save().await?;
                info!("Created new config at {}", file.path.display());
                Ok(file)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self) -> StoreResult<()> {
        let mut json = serde_json::to_vec_pretty(&self.config)?;
        json.push(b'\n');
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

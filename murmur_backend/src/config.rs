use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DECAY_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct MurmurConfig {
    pub api_port: u16,
    pub paths: MurmurPaths,
    pub metadata: MetadataConfig,
    /// Account credited by downvotes. Never auto-created; downvoting fails
    /// while this is unset or names a missing user.
    pub admin_account_id: Option<String>,
    pub decay_interval_secs: u64,
    pub starting_balance: i64,
}

impl MurmurConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("MURMUR_DATA_DIR") {
            Ok(base) if !base.trim().is_empty() => MurmurPaths::from_base_dir(base.trim())?,
            _ => MurmurPaths::discover()?,
        };
        let api_port = env::var("MURMUR_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let admin_account_id = env::var("MURMUR_ADMIN_ACCOUNT_ID").ok().and_then(|raw| {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });
        let decay_interval_secs = env::var("MURMUR_DECAY_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_DECAY_INTERVAL_SECS);
        let starting_balance = env::var("MURMUR_STARTING_BALANCE")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Ok(Self {
            api_port,
            paths,
            metadata: MetadataConfig::from_env(),
            admin_account_id,
            decay_interval_secs,
            starting_balance,
        })
    }

    pub fn new(api_port: u16, paths: MurmurPaths) -> Self {
        Self {
            api_port,
            paths,
            metadata: MetadataConfig::from_env(),
            admin_account_id: None,
            decay_interval_secs: DEFAULT_DECAY_INTERVAL_SECS,
            starting_balance: 0,
        }
    }
}

/// Configuration of the external link-metadata extraction service.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl MetadataConfig {
    pub fn from_env() -> Self {
        let endpoint = env::var("MURMUR_METADATA_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| "https://cdn.iframe.ly/api/iframely".to_string());
        let api_key = env::var("MURMUR_METADATA_KEY")
            .ok()
            .filter(|raw| !raw.trim().is_empty());
        Self { endpoint, api_key }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MurmurPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl MurmurPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("murmur.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}

use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::filters::TimeWindow;

/// The log-search side of the fetch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub rpc_url: Option<String>,
    pub api_url: String,
    pub api_key: Option<String>,
    pub contract_address: Address,
    pub start_block: u64,
    pub page_size: usize,
    /// Hard stop for pagination on very long histories.
    pub max_pages: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub endpoint: String,
    pub abi_path: PathBuf,
    pub blacklist_path: Option<PathBuf>,
    pub blacklist_enabled: bool,
    pub default_window: TimeWindow,
    pub request_timeout_secs: u64,
    pub log_dir: PathBuf,
    /// Prefix a transaction hash is appended to.
    pub explorer_tx_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Defaults, then the optional config file, then `METRICS__*` env vars.
    pub fn load(file: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("upstream.api_url", "https://api-hoodi.etherscan.io/api")?
            .set_default("upstream.contract_address", "0xc7fCFeEc5FB9962bDC2234A7a25dCec739e27f9f")?
            .set_default("upstream.start_block", 260_730)?
            .set_default("upstream.page_size", 1000)?
            .set_default("upstream.max_pages", 200)?
            .set_default("upstream.request_timeout_secs", 30)?
            .set_default("server.bind", "127.0.0.1:3000")?
            .set_default("dashboard.endpoint", "http://127.0.0.1:3000/api/fetch-events")?
            .set_default("dashboard.abi_path", "abi.json")?
            .set_default("dashboard.blacklist_enabled", true)?
            .set_default("dashboard.default_window", "7d")?
            .set_default("dashboard.request_timeout_secs", 300)?
            .set_default("dashboard.log_dir", "logs")?
            .set_default("dashboard.explorer_tx_url", "https://hoodi.etherscan.io/tx/")?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("METRICS").separator("__"));

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;

        // Plain secret names, as the hosted endpoint was deployed with them
        if let Ok(rpc_url) = std::env::var("RPC_URL") {
            cfg.upstream.rpc_url = Some(rpc_url);
        }
        if let Ok(api_key) = std::env::var("ETHERSCAN_API_KEY") {
            cfg.upstream.api_key = Some(api_key);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.page_size == 0 {
            return Err(ConfigError::Message("upstream.page_size must be at least 1".into()));
        }
        if self.upstream.max_pages == 0 {
            return Err(ConfigError::Message("upstream.max_pages must be at least 1".into()));
        }
        Ok(())
    }
}

impl DashboardConfig {
    /// Addresses from a JSON array file. No file configured means no blacklist.
    pub fn load_blacklist(&self) -> Result<Vec<String>, ConfigError> {
        match &self.blacklist_path {
            Some(path) => load_blacklist(path),
            None => Ok(Vec::new()),
        }
    }
}

pub fn load_blacklist(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Message(format!("blacklist {}: {}", path.display(), e)))?;
    let addresses: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::Message(format!("blacklist {}: {}", path.display(), e)))?;
    Ok(addresses
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

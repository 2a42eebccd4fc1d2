use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchError, FetchedLogs};
use crate::config::UpstreamConfig;
use crate::events::RawLog;

const NO_RECORDS: &str = "No records found";

#[derive(Debug, Deserialize)]
struct LogSearchPage {
    status: String,
    #[serde(default)]
    message: String,
    /// An array of logs on success, an error string otherwise.
    #[serde(default)]
    result: serde_json::Value,
}

/// Pages the log-search API for one contract, from the configured start
/// block up to the chain head observed at the start of the fetch.
pub struct EtherscanFetcher {
    client: Client,
    config: UpstreamConfig,
}

impl EtherscanFetcher {
    pub fn new(config: UpstreamConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn fetch(&self) -> Result<FetchedLogs, FetchError> {
        let (rpc_url, api_key) = match (&self.config.rpc_url, &self.config.api_key) {
            (Some(rpc), Some(key)) if !rpc.is_empty() && !key.is_empty() => (rpc, key),
            _ => return Err(FetchError::Misconfigured),
        };

        let end_block = chain_head(rpc_url, self.timeout()).await?;
        let logs = self.fetch_pages(api_key, end_block).await?;

        info!("Fetched {} logs up to block {}", logs.len(), end_block);
        Ok(FetchedLogs { logs, end_block })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Sequential: whether to ask for page N+1 depends on page N being full.
    pub async fn fetch_pages(
        &self,
        api_key: &str,
        end_block: u64,
    ) -> Result<Vec<RawLog>, FetchError> {
        let address = self.config.contract_address.to_string();
        let from_block = self.config.start_block.to_string();
        let to_block = end_block.to_string();
        let offset = self.config.page_size.to_string();

        let mut logs = Vec::new();
        let mut page = 1usize;

        loop {
            if page > self.config.max_pages {
                warn!(
                    "Stopping at page cap ({} pages, {} logs); history is truncated",
                    self.config.max_pages,
                    logs.len()
                );
                break;
            }

            let page_param = page.to_string();
            let response: LogSearchPage = self
                .client
                .get(&self.config.api_url)
                .query(&[
                    ("module", "logs"),
                    ("action", "getLogs"),
                    ("address", address.as_str()),
                    ("fromBlock", from_block.as_str()),
                    ("toBlock", to_block.as_str()),
                    ("page", page_param.as_str()),
                    ("offset", offset.as_str()),
                    ("apikey", api_key),
                ])
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(redact)?
                .json()
                .await
                .map_err(redact)?;

            if response.status != "1" {
                if response.message == NO_RECORDS {
                    break;
                }
                return Err(FetchError::Upstream(format!(
                    "{} ({})",
                    response.message, response.result
                )));
            }

            let batch: Vec<RawLog> = serde_json::from_value(response.result)
                .map_err(|e| FetchError::Malformed(e.to_string()))?;
            debug!("Page {}: {} logs", page, batch.len());

            if batch.is_empty() {
                break;
            }
            let last_page = batch.len() < self.config.page_size;
            logs.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }

        Ok(logs)
    }
}

/// Request URLs carry the API key; keep it out of error text.
fn redact(e: reqwest::Error) -> FetchError {
    FetchError::Http(e.without_url())
}

pub async fn chain_head(rpc_url: &str, timeout: Duration) -> Result<u64, FetchError> {
    let url = Url::parse(rpc_url)?;
    let provider = ProviderBuilder::new().on_http(url);
    match tokio::time::timeout(timeout, provider.get_block_number()).await {
        Ok(head) => head.map_err(|e| FetchError::Rpc(e.to_string())),
        Err(_) => Err(FetchError::Rpc(format!(
            "no response within {}s",
            timeout.as_secs()
        ))),
    }
}

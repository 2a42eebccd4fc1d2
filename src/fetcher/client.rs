use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};
use url::Url;

use super::{FetchError, FetchedLogs};
use crate::abi::InterfaceDecoder;
use crate::error::DashboardError;
use crate::events;
use crate::state::LoadedEvents;

/// Calls the fetch-events endpoint. The timeout covers the whole paginated
/// fetch on the server side.
#[derive(Debug, Clone)]
pub struct EventsClient {
    client: Client,
    endpoint: Url,
}

impl EventsClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub async fn fetch(&self) -> Result<FetchedLogs, FetchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(|b| b.get("error"))
                .and_then(Value::as_str)
                .unwrap_or(text.as_str())
                .to_string();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = body.ok_or_else(|| FetchError::Malformed("body is not JSON".into()))?;
        if body.get("logs").map_or(true, Value::is_null) {
            return Err(FetchError::MissingLogs);
        }
        serde_json::from_value(body).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Fetch and normalize. The cause of a fetch failure is logged here; the
    /// returned error carries only the user-facing text.
    pub async fn load(&self, decoder: &InterfaceDecoder) -> Result<LoadedEvents, DashboardError> {
        let fetched = self.fetch().await.map_err(|e| {
            error!("Fetch from {} failed: {}", self.endpoint, e);
            DashboardError::from(e)
        })?;

        let events = events::normalize(&fetched.logs, decoder);
        info!("Loaded {} events (end block {})", events.len(), fetched.end_block);

        Ok(LoadedEvents {
            events,
            end_block: fetched.end_block,
        })
    }
}

//! Getting raw logs: paging the log-search service for the endpoint, and
//! calling the endpoint from the dashboard.

mod client;
pub(crate) mod etherscan;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::RawLog;

pub use client::EventsClient;
pub use etherscan::EtherscanFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response did not contain logs")]
    MissingLogs,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("log search failed: {0}")]
    Upstream(String),

    #[error("chain head lookup failed: {0}")]
    Rpc(String),

    #[error("Server misconfigured: secrets missing.")]
    Misconfigured,
}

/// Body of a successful `POST /api/fetch-events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedLogs {
    pub logs: Vec<RawLog>,
    #[serde(default)]
    pub end_block: u64,
}

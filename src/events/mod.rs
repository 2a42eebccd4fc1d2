mod value;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abi::InterfaceDecoder;

pub use value::ArgValue;

pub const UNKNOWN_EVENT: &str = "Unknown";

/// A log row exactly as the log-search service delivers it. Fields the
/// pipeline does not read are kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: String,
    #[serde(default, rename = "timeStamp")]
    pub time_stamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub event_name: String,
    pub args: IndexMap<String, ArgValue>,
    pub block_number: u64,
    pub timestamp_ms: u64,
    pub address: Option<String>,
    pub transaction_hash: Option<String>,
}

/// Parses a `0x`-prefixed (or bare) hex quantity. Anything unparseable is 0.
pub fn parse_hex_quantity(raw: &str) -> u64 {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .or_else(|| raw.trim().strip_prefix("0X"))
        .unwrap_or(raw.trim());
    u64::from_str_radix(digits, 16).unwrap_or(0)
}

/// Decodes one log, falling back to the topic index, then the raw topic,
/// then `"Unknown"` when strict decoding fails.
pub fn normalize_log(log: &RawLog, decoder: &InterfaceDecoder) -> NormalizedEvent {
    let (event_name, args) = match decoder.decode(log) {
        Ok(decoded) => (decoded.name, decoded.args),
        Err(failure) => {
            debug!("Decode fallback for tx {:?}: {}", log.transaction_hash, failure);
            let name = match log.topics.first().map(|t| t.to_lowercase()) {
                Some(topic0) => decoder
                    .topic_index()
                    .get(&topic0)
                    .map(str::to_string)
                    .unwrap_or(topic0),
                None => UNKNOWN_EVENT.to_string(),
            };
            (name, IndexMap::new())
        }
    };

    NormalizedEvent {
        event_name,
        args,
        block_number: parse_hex_quantity(&log.block_number),
        timestamp_ms: parse_hex_quantity(&log.time_stamp).saturating_mul(1000),
        address: log.address.clone(),
        transaction_hash: log.transaction_hash.clone(),
    }
}

/// One normalized event per raw log, in input order.
pub fn normalize(logs: &[RawLog], decoder: &InterfaceDecoder) -> Vec<NormalizedEvent> {
    logs.iter().map(|log| normalize_log(log, decoder)).collect()
}

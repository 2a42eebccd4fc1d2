//! Contract interface decoding.
//!
//! The ABI is only known at runtime, so events are decoded through the
//! dynamic `dyn-abi` path instead of `sol!` bindings.

use std::collections::HashMap;
use std::path::Path;

use alloy::dyn_abi::EventExt;
use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::{hex, keccak256, B256};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::DashboardError;
use crate::events::{ArgValue, RawLog};

/// Why a single log could not be decoded strictly. Never fatal: the
/// normalizer recovers with the topic-name fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("log has no topics")]
    NoTopics,

    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("no event in the interface matches topic {0}")]
    UnknownEvent(String),

    #[error("abi decode failed: {0}")]
    Abi(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    pub name: String,
    pub args: IndexMap<String, ArgValue>,
}

/// Signature hash (lowercase, `0x`-prefixed) to event name. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct TopicIndex {
    names: HashMap<String, String>,
}

impl TopicIndex {
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.names.get(topic).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// `name(type1,type2,...)` using the declared input types as written.
pub fn event_signature(event: &Event) -> String {
    let types: Vec<&str> = event.inputs.iter().map(|input| input.ty.as_str()).collect();
    format!("{}({})", event.name, types.join(","))
}

#[derive(Debug, Clone)]
pub struct InterfaceDecoder {
    events: HashMap<B256, Event>,
    topic_index: TopicIndex,
}

impl InterfaceDecoder {
    pub fn from_path(path: &Path) -> Result<Self, DashboardError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::InterfaceParse(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, DashboardError> {
        let abi: JsonAbi =
            serde_json::from_str(raw).map_err(|e| DashboardError::InterfaceParse(e.to_string()))?;
        Ok(Self::new(&abi))
    }

    pub fn new(abi: &JsonAbi) -> Self {
        let mut names = HashMap::new();
        let mut events = HashMap::new();

        for event in abi.events() {
            let signature = event_signature(event);
            let topic = format!("0x{:x}", keccak256(signature.as_bytes()));
            if let Some(previous) = names.insert(topic, event.name.clone()) {
                warn!("Duplicate event signature {} (replacing {})", signature, previous);
            }
            if !event.anonymous {
                events.insert(event.selector(), event.clone());
            }
        }

        let topic_index = TopicIndex { names };
        debug!("Interface loaded: {} event signatures", topic_index.len());

        Self { events, topic_index }
    }

    pub fn topic_index(&self) -> &TopicIndex {
        &self.topic_index
    }

    /// Strict decode against the interface. Every failure is returned, never raised.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedLog, DecodeFailure> {
        let first = log.topics.first().ok_or(DecodeFailure::NoTopics)?;

        let topics = log
            .topics
            .iter()
            .map(|topic| {
                topic
                    .parse::<B256>()
                    .map_err(|_| DecodeFailure::MalformedTopic(topic.clone()))
            })
            .collect::<Result<Vec<B256>, _>>()?;

        let event = self
            .events
            .get(&topics[0])
            .ok_or_else(|| DecodeFailure::UnknownEvent(first.to_lowercase()))?;

        let data = hex::decode(log.data.strip_prefix("0x").unwrap_or(&log.data))
            .map_err(|e| DecodeFailure::MalformedData(e.to_string()))?;

        let decoded = event
            .decode_log_parts(topics, &data, true)
            .map_err(|e| DecodeFailure::Abi(e.to_string()))?;

        // Indexed values arrive from the topics, the rest from the data
        // payload; reassemble them in declaration order.
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args = IndexMap::with_capacity(event.inputs.len());

        for (position, input) in event.inputs.iter().enumerate() {
            let value = if input.indexed { indexed.next() } else { body.next() };
            let value = value.ok_or_else(|| {
                DecodeFailure::Abi(format!("no value for parameter {}", position))
            })?;
            let key = if input.name.is_empty() {
                position.to_string()
            } else {
                input.name.clone()
            };
            args.insert(key, ArgValue::from(value));
        }

        Ok(DecodedLog {
            name: event.name.clone(),
            args,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    pub const TEST_ABI: &str = r#"[
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address", "internalType": "address"},
                {"name": "value", "type": "uint256", "internalType": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool", "internalType": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "event",
            "name": "Transfer",
            "anonymous": false,
            "inputs": [
                {"name": "from", "type": "address", "indexed": true, "internalType": "address"},
                {"name": "to", "type": "address", "indexed": true, "internalType": "address"},
                {"name": "value", "type": "uint256", "indexed": false, "internalType": "uint256"}
            ]
        },
        {
            "type": "event",
            "name": "Deposit",
            "anonymous": false,
            "inputs": [
                {"name": "amount", "type": "uint256", "indexed": false, "internalType": "uint256"},
                {"name": "account", "type": "address", "indexed": true, "internalType": "address"},
                {"name": "", "type": "bool", "indexed": false, "internalType": "bool"}
            ]
        }
    ]"#;

    pub fn word(hex_tail: &str) -> String {
        format!("0x{:0>64}", hex_tail)
    }

    pub fn topic_for(signature: &str) -> String {
        format!("0x{:x}", keccak256(signature.as_bytes()))
    }

    pub fn transfer_log(value_data: &str) -> RawLog {
        RawLog {
            topics: vec![
                TRANSFER_TOPIC.to_string(),
                word("1111111111111111111111111111111111111111"),
                word("2222222222222222222222222222222222222222"),
            ],
            data: value_data.to_string(),
            ..RawLog::default()
        }
    }

    fn decoder() -> InterfaceDecoder {
        InterfaceDecoder::from_json(TEST_ABI).unwrap()
    }

    #[test]
    fn topic_index_maps_signature_hash_to_name() {
        let decoder = decoder();
        let index = decoder.topic_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(TRANSFER_TOPIC), Some("Transfer"));
        assert_eq!(
            index.get(&topic_for("Deposit(uint256,address,bool)")),
            Some("Deposit")
        );
    }

    #[test]
    fn decodes_transfer_with_named_args() {
        let decoded = decoder().decode(&transfer_log(&word("64"))).unwrap();
        assert_eq!(decoded.name, "Transfer");

        let keys: Vec<&str> = decoded.args.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["from", "to", "value"]);
        assert_eq!(
            decoded.args["from"],
            ArgValue::Address("0x1111111111111111111111111111111111111111".to_string())
        );
        assert_eq!(decoded.args["value"], ArgValue::Number("100".to_string()));
    }

    #[test]
    fn indexed_params_keep_declaration_order() {
        let log = RawLog {
            topics: vec![
                topic_for("Deposit(uint256,address,bool)"),
                word("3333333333333333333333333333333333333333"),
            ],
            data: format!("{}{}", word("5"), &word("1")[2..]),
            ..RawLog::default()
        };

        let decoded = decoder().decode(&log).unwrap();
        let keys: Vec<&str> = decoded.args.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["amount", "account", "2"]);
        assert_eq!(decoded.args["amount"], ArgValue::Number("5".to_string()));
        assert_eq!(
            decoded.args["account"],
            ArgValue::Address("0x3333333333333333333333333333333333333333".to_string())
        );
        assert_eq!(decoded.args["2"], ArgValue::Bool(true));
    }

    #[test]
    fn short_data_is_a_decode_failure() {
        let err = decoder().decode(&transfer_log("0x1234")).unwrap_err();
        assert!(matches!(err, DecodeFailure::Abi(_)));
    }

    #[test]
    fn unknown_topic_is_a_decode_failure() {
        let log = RawLog {
            topics: vec![word("ABCDEF")],
            ..RawLog::default()
        };
        let err = decoder().decode(&log).unwrap_err();
        assert_eq!(err, DecodeFailure::UnknownEvent(word("abcdef")));
    }

    #[test]
    fn missing_topics_is_a_decode_failure() {
        let err = decoder().decode(&RawLog::default()).unwrap_err();
        assert_eq!(err, DecodeFailure::NoTopics);
    }

    #[test]
    fn malformed_topic_is_a_decode_failure() {
        let log = RawLog {
            topics: vec!["0xnothex".to_string()],
            ..RawLog::default()
        };
        assert!(matches!(
            decoder().decode(&log),
            Err(DecodeFailure::MalformedTopic(_))
        ));
    }

    #[test]
    fn malformed_interface_is_reported_as_parse_error() {
        let err = InterfaceDecoder::from_json("{not json").unwrap_err();
        assert!(matches!(err, DashboardError::InterfaceParse(_)));
        assert!(err.to_string().starts_with("Failed to parse ABI: "));
    }

    #[test]
    fn duplicate_signatures_keep_one_entry() {
        let abi = r#"[
            {"type": "event", "name": "Ping", "anonymous": false, "inputs": []},
            {"type": "event", "name": "Ping", "anonymous": false, "inputs": []}
        ]"#;
        let decoder = InterfaceDecoder::from_json(abi).unwrap();
        assert_eq!(decoder.topic_index().len(), 1);
        assert_eq!(decoder.topic_index().get(&topic_for("Ping()")), Some("Ping"));
    }
}

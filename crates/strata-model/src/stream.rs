// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream-layer wire models: offsets, messages, and subscription plumbing.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position within one stream partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamOffset {
    /// Stream partition number.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// Offsets envelope used by commit and seek.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamOffsets {
    /// One entry per stream partition.
    pub offsets: Vec<StreamOffset>,
}

/// Metadata of one stream message.
///
/// Messages up to the inline threshold carry their payload directly in
/// `data` (base64 on the wire); larger messages carry a `data_handle`
/// resolvable through the blob API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Partition id the message belongs to.
    pub partition: String,
    /// Inline payload, base64-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Blob handle for out-of-line payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_handle: Option<String>,
    /// Payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<i64>,
    /// Compressed payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_data_size: Option<i64>,
    /// Payload checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Ingestion timestamp, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Metadata {
    /// Decode the inline payload, if present and valid base64.
    #[must_use]
    pub fn decode_data(&self) -> Option<Bytes> {
        use base64::Engine as _;
        let raw = self.data.as_deref()?;
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .ok()
            .map(Bytes::from)
    }
}

/// One stream message: metadata plus its offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message metadata (inline data or data handle).
    pub meta_data: Metadata,
    /// Offset of the message within its partition.
    pub offset: StreamOffset,
}

/// Poll response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Messages {
    /// Messages in consumption order.
    pub messages: Vec<Message>,
}

/// Subscription mode requested at subscribe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeMode {
    /// Single consumer reads every partition.
    #[default]
    Serial,
    /// Partitions are distributed across a consumer group.
    Parallel,
}

impl SubscribeMode {
    /// Query-parameter rendering.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

/// A consumer property value, forwarded to the service verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsumerPropertyValue {
    /// Boolean option, e.g. `enable.auto.commit`.
    Bool(bool),
    /// Integer option, e.g. `fetch.max.bytes`.
    Int(i64),
    /// String option, e.g. `auto.offset.reset`.
    String(String),
}

/// Consumer properties carried verbatim in the subscribe body.
///
/// The client never interprets these; `enable_auto_commit` and friends are
/// a contract between the caller and the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsumerProperties {
    /// Property map, e.g. `{"auto.offset.reset": "earliest"}`.
    #[serde(rename = "kafkaConsumerProperties")]
    pub properties: BTreeMap<String, ConsumerPropertyValue>,
}

impl ConsumerProperties {
    /// Insert a property, replacing any previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: ConsumerPropertyValue,
    ) -> &mut Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Response of the subscribe endpoint.
///
/// All later calls for this subscription must target `node_base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    /// Base URL of the node that owns the subscription.
    #[serde(rename = "nodeBaseURL")]
    pub node_base_url: String,
    /// Server-side cursor id.
    pub subscription_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_with_inline_data() {
        let json = r#"{
            "metaData": {
                "partition": "314010583",
                "data": "U29tZURhdGE=",
                "dataSize": 8,
                "timestamp": 1577836800000
            },
            "offset": {"partition": 7, "offset": 38562}
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.offset.partition, 7);
        assert_eq!(message.meta_data.decode_data().unwrap().as_ref(), b"SomeData");
        assert!(message.meta_data.data_handle.is_none());
    }

    #[test]
    fn message_with_data_handle() {
        let json = r#"{
            "metaData": {"partition": "1", "dataHandle": "abc-123"},
            "offset": {"partition": 0, "offset": 4}
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.meta_data.data_handle.as_deref(), Some("abc-123"));
        assert!(message.meta_data.decode_data().is_none());
    }

    #[test]
    fn invalid_base64_decodes_to_none() {
        let meta = Metadata {
            partition: "1".into(),
            data: Some("not base64!!".into()),
            ..Metadata::default()
        };
        assert!(meta.decode_data().is_none());
    }

    #[test]
    fn consumer_properties_serialise_verbatim() {
        let mut props = ConsumerProperties::default();
        props
            .set("enable.auto.commit", ConsumerPropertyValue::Bool(true))
            .set("fetch.max.bytes", ConsumerPropertyValue::Int(1024))
            .set(
                "auto.offset.reset",
                ConsumerPropertyValue::String("earliest".into()),
            );
        let json = serde_json::to_value(&props).unwrap();
        let inner = &json["kafkaConsumerProperties"];
        assert_eq!(inner["enable.auto.commit"], true);
        assert_eq!(inner["fetch.max.bytes"], 1024);
        assert_eq!(inner["auto.offset.reset"], "earliest");
    }

    #[test]
    fn subscribe_response_wire_names() {
        let json = r#"{"nodeBaseURL": "https://node.example.com", "subscriptionId": "sub-1"}"#;
        let resp: SubscribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.node_base_url, "https://node.example.com");
        assert_eq!(resp.subscription_id, "sub-1");
    }

    #[test]
    fn offsets_roundtrip() {
        let offsets = StreamOffsets {
            offsets: vec![StreamOffset {
                partition: 1,
                offset: 99,
            }],
        };
        let json = serde_json::to_string(&offsets).unwrap();
        let back: StreamOffsets = serde_json::from_str(&json).unwrap();
        assert_eq!(back, offsets);
    }
}

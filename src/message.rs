// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication message types and their wire mapping.
//!
//! Two message kinds travel through the replication log:
//!
//! - [`ReplicationTask`]: history replication between clusters. Only the
//!   history-v2 attributes are modeled; attribute structs of other task kinds
//!   are carried as opaque [`WireField`]s and re-encoded unchanged.
//! - [`VisibilityMessage`]: search-index updates for a workflow.
//!
//! A run processes exactly one [`MessageKind`], so decoding is always
//! directed: [`ReplicationMessage::decode`] takes the kind up front.
//!
//! # Field Ids
//!
//! ```text
//! ReplicationTask            10 taskType  11 sourceTaskId  60 historyTaskV2Attributes  70 creationTime
//! HistoryTaskV2Attributes     5 taskId  10 domainId  20 workflowId  30 runId
//!                            40 versionHistoryItems  50 events  60 newRunEvents
//! DataBlob                   10 encodingType  20 data
//! VisibilityMessage          10 messageType  20 domainID  30 workflowID  40 runID
//!                            50 version  60 fields
//! ```

use crate::wire::{self, WireError, WireField, WireStruct, WireType, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format marker byte that precedes every binary payload in the dump.
pub const FORMAT_MARKER: u8 = 0x59;

/// Message kind processed by a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// History replication tasks.
    #[default]
    History,
    /// Visibility (search index) messages.
    Visibility,
}

impl MessageKind {
    /// Map the numeric CLI code (0: replication tasks, 1: visibility).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MessageKind::History),
            1 => Some(MessageKind::Visibility),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::History => "history",
            MessageKind::Visibility => "visibility",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded message of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationMessage {
    History(ReplicationTask),
    Visibility(VisibilityMessage),
}

impl ReplicationMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ReplicationMessage::History(_) => MessageKind::History,
            ReplicationMessage::Visibility(_) => MessageKind::Visibility,
        }
    }

    /// Decode a binary payload (marker already stripped) as `kind`.
    ///
    /// Bytes after the end of the struct are ignored.
    pub fn decode(kind: MessageKind, payload: &[u8]) -> Result<Self, WireError> {
        let (value, _) = wire::decode_struct(payload)?;
        match kind {
            MessageKind::History => ReplicationTask::from_wire(&value).map(Self::History),
            MessageKind::Visibility => VisibilityMessage::from_wire(&value).map(Self::Visibility),
        }
    }

    /// Encode as a binary payload without the format marker.
    pub fn encode(&self) -> Vec<u8> {
        let value = match self {
            ReplicationMessage::History(task) => task.to_wire(),
            ReplicationMessage::Visibility(msg) => msg.to_wire(),
        };
        wire::encode_struct(&value)
    }

    /// Encode with the leading format marker, as it appears in a dump.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut out = vec![FORMAT_MARKER];
        out.extend(self.encode());
        out
    }

    /// JSON projection of the inner message.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            ReplicationMessage::History(task) => serde_json::to_vec(task),
            ReplicationMessage::Visibility(msg) => serde_json::to_vec(msg),
        }
    }

    /// Parse a JSON projection produced by [`to_json`](Self::to_json).
    pub fn from_json(kind: MessageKind, json: &[u8]) -> serde_json::Result<Self> {
        match kind {
            MessageKind::History => serde_json::from_slice(json).map(Self::History),
            MessageKind::Visibility => serde_json::from_slice(json).map(Self::Visibility),
        }
    }

    /// Workflow id, if this message carries one.
    ///
    /// History tasks without history-v2 attributes have none.
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            ReplicationMessage::History(task) => {
                task.history_task_v2_attributes.as_ref().map(|a| a.workflow_id.as_str())
            }
            ReplicationMessage::Visibility(msg) => Some(msg.workflow_id.as_str()),
        }
    }

    /// Run id, if this message carries one.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            ReplicationMessage::History(task) => {
                task.history_task_v2_attributes.as_ref().map(|a| a.run_id.as_str())
            }
            ReplicationMessage::Visibility(msg) => Some(msg.run_id.as_str()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// History replication tasks
// ═══════════════════════════════════════════════════════════════════════════════

/// Replication task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationTaskType {
    Domain,
    History,
    SyncShardStatus,
    SyncActivity,
    HistoryMetadata,
    HistoryV2,
    FailoverMarker,
}

impl ReplicationTaskType {
    fn from_i32(value: i32) -> Result<Self, WireError> {
        Ok(match value {
            0 => Self::Domain,
            1 => Self::History,
            2 => Self::SyncShardStatus,
            3 => Self::SyncActivity,
            4 => Self::HistoryMetadata,
            5 => Self::HistoryV2,
            6 => Self::FailoverMarker,
            _ => {
                return Err(WireError::InvalidEnum {
                    name: "ReplicationTaskType",
                    value,
                })
            }
        })
    }

    fn as_i32(self) -> i32 {
        match self {
            Self::Domain => 0,
            Self::History => 1,
            Self::SyncShardStatus => 2,
            Self::SyncActivity => 3,
            Self::HistoryMetadata => 4,
            Self::HistoryV2 => 5,
            Self::FailoverMarker => 6,
        }
    }
}

/// A history replication task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<ReplicationTaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_task_v2_attributes: Option<HistoryTaskV2Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    /// Attributes of other task kinds, passed through undecoded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_attributes: Vec<WireField>,
}

impl ReplicationTask {
    const TASK_TYPE: i16 = 10;
    const SOURCE_TASK_ID: i16 = 11;
    const HISTORY_V2: i16 = 60;
    const CREATION_TIME: i16 = 70;

    /// Build a history-v2 task.
    pub fn history_v2(attributes: HistoryTaskV2Attributes) -> Self {
        Self {
            task_type: Some(ReplicationTaskType::HistoryV2),
            history_task_v2_attributes: Some(attributes),
            ..Default::default()
        }
    }

    pub fn is_history_v2(&self) -> bool {
        self.task_type == Some(ReplicationTaskType::HistoryV2)
    }

    pub fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("ReplicationTask", value);
        let task_type = fields
            .i32(Self::TASK_TYPE)?
            .map(ReplicationTaskType::from_i32)
            .transpose()?;
        let history_task_v2_attributes = fields
            .strukt(Self::HISTORY_V2)?
            .map(HistoryTaskV2Attributes::from_wire)
            .transpose()?;
        let other_attributes = value
            .fields
            .iter()
            .filter(|f| {
                !matches!(
                    f.id,
                    Self::TASK_TYPE | Self::SOURCE_TASK_ID | Self::HISTORY_V2 | Self::CREATION_TIME
                )
            })
            .cloned()
            .collect();

        Ok(Self {
            task_type,
            source_task_id: fields.i64(Self::SOURCE_TASK_ID)?,
            history_task_v2_attributes,
            creation_time: fields.i64(Self::CREATION_TIME)?,
            other_attributes,
        })
    }

    pub fn to_wire(&self) -> WireStruct {
        let mut out = WireStruct::new()
            .with_opt(
                Self::TASK_TYPE,
                self.task_type.map(|t| WireValue::I32(t.as_i32())),
            )
            .with_opt(Self::SOURCE_TASK_ID, self.source_task_id.map(WireValue::I64))
            .with_opt(
                Self::HISTORY_V2,
                self.history_task_v2_attributes
                    .as_ref()
                    .map(|a| WireValue::Struct(a.to_wire())),
            )
            .with_opt(Self::CREATION_TIME, self.creation_time.map(WireValue::I64));
        out.fields.extend(self.other_attributes.iter().cloned());
        out
    }
}

/// Attributes of a history-v2 replication task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTaskV2Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub domain_id: String,
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_history_items: Vec<VersionHistoryItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<DataBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_run_events: Option<DataBlob>,
}

impl HistoryTaskV2Attributes {
    pub fn new(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("HistoryTaskV2Attributes", value);
        let version_history_items = fields
            .list(40, WireType::Struct)?
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        WireValue::Struct(s) => VersionHistoryItem::from_wire(s),
                        other => Err(WireError::TypeMismatch {
                            container: "HistoryTaskV2Attributes",
                            field: 40,
                            expected: WireType::Struct,
                            actual: other.wire_type(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            task_id: fields.i64(5)?,
            domain_id: fields.string(10)?.unwrap_or_default(),
            workflow_id: fields.string(20)?.unwrap_or_default(),
            run_id: fields.string(30)?.unwrap_or_default(),
            version_history_items,
            events: fields.strukt(50)?.map(DataBlob::from_wire).transpose()?,
            new_run_events: fields.strukt(60)?.map(DataBlob::from_wire).transpose()?,
        })
    }

    fn to_wire(&self) -> WireStruct {
        let items = (!self.version_history_items.is_empty()).then(|| WireValue::List {
            elem_type: WireType::Struct,
            items: self
                .version_history_items
                .iter()
                .map(|i| WireValue::Struct(i.to_wire()))
                .collect(),
        });
        WireStruct::new()
            .with_opt(5, self.task_id.map(WireValue::I64))
            .with_opt(10, non_empty(&self.domain_id))
            .with_opt(20, non_empty(&self.workflow_id))
            .with_opt(30, non_empty(&self.run_id))
            .with_opt(40, items)
            .with_opt(50, self.events.as_ref().map(|b| WireValue::Struct(b.to_wire())))
            .with_opt(
                60,
                self.new_run_events
                    .as_ref()
                    .map(|b| WireValue::Struct(b.to_wire())),
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryItem {
    #[serde(rename = "eventID")]
    pub event_id: i64,
    pub version: i64,
}

impl VersionHistoryItem {
    fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("VersionHistoryItem", value);
        Ok(Self {
            event_id: fields.i64(10)?.unwrap_or_default(),
            version: fields.i64(20)?.unwrap_or_default(),
        })
    }

    fn to_wire(&self) -> WireStruct {
        WireStruct::new()
            .with(10, WireValue::I64(self.event_id))
            .with(20, WireValue::I64(self.version))
    }
}

/// Serialization format of a data blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncodingType {
    #[default]
    #[serde(rename = "ThriftRW")]
    ThriftRw,
    #[serde(rename = "JSON")]
    Json,
}

/// An encoded batch of history events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBlob {
    #[serde(default)]
    pub encoding_type: EncodingType,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
}

impl DataBlob {
    pub fn new(encoding_type: EncodingType, data: Vec<u8>) -> Self {
        Self {
            encoding_type,
            data,
        }
    }

    fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("DataBlob", value);
        let encoding_type = match fields.i32(10)? {
            None | Some(0) => EncodingType::ThriftRw,
            Some(1) => EncodingType::Json,
            Some(value) => {
                return Err(WireError::InvalidEnum {
                    name: "EncodingType",
                    value,
                })
            }
        };
        Ok(Self {
            encoding_type,
            data: fields.binary(20)?.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    fn to_wire(&self) -> WireStruct {
        let encoding = match self.encoding_type {
            EncodingType::ThriftRw => 0,
            EncodingType::Json => 1,
        };
        WireStruct::new()
            .with(10, WireValue::I32(encoding))
            .with(20, WireValue::Binary(self.data.clone()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Visibility messages
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityMessageType {
    Index,
    Delete,
}

impl std::fmt::Display for VisibilityMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisibilityMessageType::Index => write!(f, "Index"),
            VisibilityMessageType::Delete => write!(f, "Delete"),
        }
    }
}

/// One indexed search attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexField {
    String(String),
    Int(i64),
    Bool(bool),
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl IndexField {
    fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("Field", value);
        Ok(match fields.i32(10)?.unwrap_or_default() {
            0 => IndexField::String(fields.string(20)?.unwrap_or_default()),
            1 => IndexField::Int(fields.i64(30)?.unwrap_or_default()),
            2 => IndexField::Bool(fields.bool(40)?.unwrap_or_default()),
            3 => IndexField::Binary(fields.binary(50)?.map(<[u8]>::to_vec).unwrap_or_default()),
            value => {
                return Err(WireError::InvalidEnum {
                    name: "FieldType",
                    value,
                })
            }
        })
    }

    fn to_wire(&self) -> WireStruct {
        match self {
            IndexField::String(s) => WireStruct::new()
                .with(10, WireValue::I32(0))
                .with(20, WireValue::Binary(s.as_bytes().to_vec())),
            IndexField::Int(v) => WireStruct::new()
                .with(10, WireValue::I32(1))
                .with(30, WireValue::I64(*v)),
            IndexField::Bool(b) => WireStruct::new()
                .with(10, WireValue::I32(2))
                .with(40, WireValue::Bool(*b)),
            IndexField::Binary(bytes) => WireStruct::new()
                .with(10, WireValue::I32(3))
                .with(50, WireValue::Binary(bytes.clone())),
        }
    }
}

/// A visibility (search index) update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisibilityMessage {
    #[serde(rename = "messageType", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<VisibilityMessageType>,
    #[serde(rename = "domainID", default)]
    pub domain_id: String,
    #[serde(rename = "workflowID", default)]
    pub workflow_id: String,
    #[serde(rename = "runID", default)]
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, IndexField>,
}

impl VisibilityMessage {
    pub fn new(
        message_type: VisibilityMessageType,
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: Some(message_type),
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn from_wire(value: &WireStruct) -> Result<Self, WireError> {
        let fields = Fields::new("Message", value);
        let message_type = match fields.i32(10)? {
            None => None,
            Some(0) => Some(VisibilityMessageType::Index),
            Some(1) => Some(VisibilityMessageType::Delete),
            Some(value) => {
                return Err(WireError::InvalidEnum {
                    name: "MessageType",
                    value,
                })
            }
        };

        let mut indexed = BTreeMap::new();
        if let Some(entries) = fields.map(60, WireType::Binary, WireType::Struct)? {
            for (key, value) in entries {
                let (WireValue::Binary(key), WireValue::Struct(value)) = (key, value) else {
                    continue;
                };
                let key = String::from_utf8(key.clone()).map_err(|_| WireError::InvalidUtf8 {
                    container: "Message",
                    field: 60,
                })?;
                indexed.insert(key, IndexField::from_wire(value)?);
            }
        }

        Ok(Self {
            message_type,
            domain_id: fields.string(20)?.unwrap_or_default(),
            workflow_id: fields.string(30)?.unwrap_or_default(),
            run_id: fields.string(40)?.unwrap_or_default(),
            version: fields.i64(50)?,
            fields: indexed,
        })
    }

    pub fn to_wire(&self) -> WireStruct {
        let message_type = self.message_type.map(|t| match t {
            VisibilityMessageType::Index => WireValue::I32(0),
            VisibilityMessageType::Delete => WireValue::I32(1),
        });
        let fields = (!self.fields.is_empty()).then(|| WireValue::Map {
            key_type: WireType::Binary,
            value_type: WireType::Struct,
            entries: self
                .fields
                .iter()
                .map(|(k, v)| {
                    (
                        WireValue::Binary(k.as_bytes().to_vec()),
                        WireValue::Struct(v.to_wire()),
                    )
                })
                .collect(),
        });
        WireStruct::new()
            .with_opt(10, message_type)
            .with_opt(20, non_empty(&self.domain_id))
            .with_opt(30, non_empty(&self.workflow_id))
            .with_opt(40, non_empty(&self.run_id))
            .with_opt(50, self.version.map(WireValue::I64))
            .with_opt(60, fields)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn non_empty(s: &str) -> Option<WireValue> {
    (!s.is_empty()).then(|| WireValue::Binary(s.as_bytes().to_vec()))
}

/// Typed accessors over a struct's fields.
///
/// Missing fields are `None`; a present field of the wrong wire type is a
/// decode error.
struct Fields<'a> {
    container: &'static str,
    value: &'a WireStruct,
}

impl<'a> Fields<'a> {
    fn new(container: &'static str, value: &'a WireStruct) -> Self {
        Self { container, value }
    }

    fn mismatch(&self, field: i16, expected: WireType, actual: &WireValue) -> WireError {
        WireError::TypeMismatch {
            container: self.container,
            field,
            expected,
            actual: actual.wire_type(),
        }
    }

    fn i32(&self, id: i16) -> Result<Option<i32>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::I32(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(id, WireType::I32, other)),
        }
    }

    fn i64(&self, id: i16) -> Result<Option<i64>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::I64(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(id, WireType::I64, other)),
        }
    }

    fn bool(&self, id: i16) -> Result<Option<bool>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(id, WireType::Bool, other)),
        }
    }

    fn binary(&self, id: i16) -> Result<Option<&'a [u8]>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::Binary(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(self.mismatch(id, WireType::Binary, other)),
        }
    }

    fn string(&self, id: i16) -> Result<Option<String>, WireError> {
        self.binary(id)?
            .map(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 {
                    container: self.container,
                    field: id,
                })
            })
            .transpose()
    }

    fn strukt(&self, id: i16) -> Result<Option<&'a WireStruct>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::Struct(v)) => Ok(Some(v)),
            Some(other) => Err(self.mismatch(id, WireType::Struct, other)),
        }
    }

    fn list(&self, id: i16, elem: WireType) -> Result<Option<&'a [WireValue]>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::List { elem_type, items }) if *elem_type == elem => {
                Ok(Some(items.as_slice()))
            }
            Some(other) => Err(self.mismatch(id, WireType::List, other)),
        }
    }

    fn map(
        &self,
        id: i16,
        key: WireType,
        value: WireType,
    ) -> Result<Option<&'a [(WireValue, WireValue)]>, WireError> {
        match self.value.get(id) {
            None => Ok(None),
            Some(WireValue::Map {
                key_type,
                value_type,
                entries,
            }) if *key_type == key && *value_type == value => Ok(Some(entries.as_slice())),
            Some(other) => Err(self.mismatch(id, WireType::Map, other)),
        }
    }
}

/// Serde helper: bytes as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_task() -> ReplicationTask {
        let mut attrs = HistoryTaskV2Attributes::new("domain-1", "wf-1", "run-1");
        attrs.task_id = Some(77);
        attrs.version_history_items = vec![VersionHistoryItem {
            event_id: 10,
            version: 2,
        }];
        attrs.events = Some(DataBlob::new(EncodingType::Json, br#"[{"eventId":1}]"#.to_vec()));
        let mut task = ReplicationTask::history_v2(attrs);
        task.source_task_id = Some(5);
        task.creation_time = Some(1_700_000_000);
        task
    }

    #[test]
    fn test_history_task_binary_roundtrip() {
        let msg = ReplicationMessage::History(history_task());
        let decoded = ReplicationMessage::decode(MessageKind::History, &msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_visibility_binary_roundtrip() {
        let mut vis = VisibilityMessage::new(VisibilityMessageType::Index, "d", "w", "r");
        vis.version = Some(3);
        vis.fields.insert("CustomKeyword".into(), IndexField::String("x".into()));
        vis.fields.insert("CustomInt".into(), IndexField::Int(-4));
        vis.fields.insert("CustomBool".into(), IndexField::Bool(true));
        vis.fields.insert("CustomBlob".into(), IndexField::Binary(vec![0, 1, 2]));
        let msg = ReplicationMessage::Visibility(vis);
        let decoded = ReplicationMessage::decode(MessageKind::Visibility, &msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_opaque_attributes_pass_through() {
        let domain_attrs = WireStruct::new().with(10, WireValue::Binary(b"domain-op".to_vec()));
        let raw = WireStruct::new()
            .with(10, WireValue::I32(0))
            .with(20, WireValue::Struct(domain_attrs.clone()));
        let bytes = wire::encode_struct(&raw);

        let msg = ReplicationMessage::decode(MessageKind::History, &bytes).unwrap();
        let ReplicationMessage::History(task) = &msg else {
            panic!("expected history task");
        };
        assert_eq!(task.task_type, Some(ReplicationTaskType::Domain));
        assert!(task.history_task_v2_attributes.is_none());
        assert_eq!(task.other_attributes.len(), 1);
        assert_eq!(msg.encode(), bytes);
    }

    #[test]
    fn test_json_projection_roundtrip() {
        let msg = ReplicationMessage::History(history_task());
        let json = msg.to_json().unwrap();
        let parsed = ReplicationMessage::from_json(MessageKind::History, &json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_json_field_names() {
        let msg = ReplicationMessage::History(history_task());
        let value: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["taskType"], "HistoryV2");
        assert_eq!(value["historyTaskV2Attributes"]["workflowId"], "wf-1");
        assert_eq!(value["historyTaskV2Attributes"]["events"]["encodingType"], "JSON");

        let vis = ReplicationMessage::Visibility(VisibilityMessage::new(
            VisibilityMessageType::Delete,
            "d",
            "w",
            "r",
        ));
        let value: serde_json::Value = serde_json::from_slice(&vis.to_json().unwrap()).unwrap();
        assert_eq!(value["workflowID"], "w");
        assert_eq!(value["messageType"], "Delete");
    }

    #[test]
    fn test_frame_has_marker() {
        let frame = ReplicationMessage::History(history_task()).to_frame();
        assert_eq!(frame[0], FORMAT_MARKER);
    }

    #[test]
    fn test_wrong_field_type_is_error() {
        // workflowId encoded as i64
        let attrs = WireStruct::new().with(20, WireValue::I64(1));
        let raw = WireStruct::new()
            .with(10, WireValue::I32(5))
            .with(60, WireValue::Struct(attrs));
        let err = ReplicationMessage::decode(MessageKind::History, &wire::encode_struct(&raw))
            .unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { field: 20, .. }));
    }

    #[test]
    fn test_unknown_task_type_is_error() {
        let raw = WireStruct::new().with(10, WireValue::I32(99));
        let err = ReplicationMessage::decode(MessageKind::History, &wire::encode_struct(&raw))
            .unwrap_err();
        assert!(matches!(err, WireError::InvalidEnum { value: 99, .. }));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let raw = WireStruct::new().with(30, WireValue::Binary(vec![0xff, 0xfe]));
        let err = ReplicationMessage::decode(MessageKind::Visibility, &wire::encode_struct(&raw))
            .unwrap_err();
        assert!(matches!(err, WireError::InvalidUtf8 { field: 30, .. }));
    }

    #[test]
    fn test_accessors() {
        let msg = ReplicationMessage::History(history_task());
        assert_eq!(msg.workflow_id(), Some("wf-1"));
        assert_eq!(msg.run_id(), Some("run-1"));
        assert_eq!(msg.kind(), MessageKind::History);

        let bare = ReplicationMessage::History(ReplicationTask::default());
        assert_eq!(bare.workflow_id(), None);
        assert_eq!(bare.run_id(), None);
    }

    #[test]
    fn test_message_kind_codes() {
        assert_eq!(MessageKind::from_code(0), Some(MessageKind::History));
        assert_eq!(MessageKind::from_code(1), Some(MessageKind::Visibility));
        assert_eq!(MessageKind::from_code(2), None);
        assert_eq!(MessageKind::Visibility.to_string(), "visibility");
    }
}

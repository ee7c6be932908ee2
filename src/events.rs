// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! History event batch decoding.
//!
//! History-v2 replication tasks carry their events as encoded
//! [`DataBlob`]s. For output, the blobs are decoded into ordered
//! [`HistoryEvent`]s and placed next to the task in a [`HistoryProjection`].
//!
//! Decoding sits behind the [`EventBlobDecoder`] trait so the pipeline can be
//! driven with a fake in tests. [`PayloadSerializer`] is the real decoder and
//! understands both blob encodings:
//!
//! - `JSON`: a JSON array of events.
//! - `ThriftRW`: format marker byte followed by a Thrift `History` struct
//!   (`10: list<HistoryEvent>`).

use crate::error::{RecoveryError, Result};
use crate::message::{DataBlob, EncodingType, ReplicationTask, FORMAT_MARKER};
use crate::wire::{self, WireError, WireStruct, WireType, WireValue};
use serde::{Deserialize, Serialize};

/// A single decoded history event.
///
/// Well-known header fields are lifted out; everything else (the event type's
/// attributes) is kept as free-form JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    #[serde(default)]
    pub event_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl HistoryEvent {
    fn from_wire(value: &WireStruct) -> std::result::Result<Self, WireError> {
        let i64_field = |id| match value.get(id) {
            None => Ok(None),
            Some(WireValue::I64(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(id, WireType::I64, other)),
        };
        let event_type = match value.get(30) {
            None => None,
            Some(WireValue::I32(code)) => Some(event_type_name(*code)),
            Some(other) => return Err(mismatch(30, WireType::I32, other)),
        };
        let attributes = value
            .fields
            .iter()
            .filter(|f| !matches!(f.id, 10 | 20 | 30 | 35 | 36))
            .map(|f| (format!("field{}", f.id), f.value.to_json()))
            .collect();

        Ok(Self {
            event_id: i64_field(10)?.unwrap_or_default(),
            timestamp: i64_field(20)?,
            event_type,
            version: i64_field(35)?,
            task_id: i64_field(36)?,
            attributes,
        })
    }
}

fn mismatch(field: i16, expected: WireType, actual: &WireValue) -> WireError {
    WireError::TypeMismatch {
        container: "HistoryEvent",
        field,
        expected,
        actual: actual.wire_type(),
    }
}

/// Name for a history event type code.
fn event_type_name(code: i32) -> String {
    const NAMES: [&str; 42] = [
        "WorkflowExecutionStarted",
        "WorkflowExecutionCompleted",
        "WorkflowExecutionFailed",
        "WorkflowExecutionTimedOut",
        "DecisionTaskScheduled",
        "DecisionTaskStarted",
        "DecisionTaskCompleted",
        "DecisionTaskTimedOut",
        "DecisionTaskFailed",
        "ActivityTaskScheduled",
        "ActivityTaskStarted",
        "ActivityTaskCompleted",
        "ActivityTaskFailed",
        "ActivityTaskTimedOut",
        "ActivityTaskCancelRequested",
        "RequestCancelActivityTaskFailed",
        "ActivityTaskCanceled",
        "TimerStarted",
        "TimerFired",
        "CancelTimerFailed",
        "TimerCanceled",
        "WorkflowExecutionCancelRequested",
        "WorkflowExecutionCanceled",
        "RequestCancelExternalWorkflowExecutionInitiated",
        "RequestCancelExternalWorkflowExecutionFailed",
        "ExternalWorkflowExecutionCancelRequested",
        "MarkerRecorded",
        "WorkflowExecutionSignaled",
        "WorkflowExecutionTerminated",
        "WorkflowExecutionContinuedAsNew",
        "StartChildWorkflowExecutionInitiated",
        "StartChildWorkflowExecutionFailed",
        "ChildWorkflowExecutionStarted",
        "ChildWorkflowExecutionCompleted",
        "ChildWorkflowExecutionFailed",
        "ChildWorkflowExecutionCanceled",
        "ChildWorkflowExecutionTimedOut",
        "ChildWorkflowExecutionTerminated",
        "SignalExternalWorkflowExecutionInitiated",
        "SignalExternalWorkflowExecutionFailed",
        "ExternalWorkflowExecutionSignaled",
        "UpsertWorkflowSearchAttributes",
    ];
    usize::try_from(code)
        .ok()
        .and_then(|i| NAMES.get(i))
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| format!("EventType({code})"))
}

/// Decodes an event batch blob into ordered history events.
pub trait EventBlobDecoder: Send + Sync + 'static {
    fn decode_events(&self, blob: &DataBlob) -> Result<Vec<HistoryEvent>>;
}

/// Default event batch decoder supporting JSON and ThriftRW blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadSerializer;

impl PayloadSerializer {
    fn decode_thrift(data: &[u8]) -> std::result::Result<Vec<HistoryEvent>, WireError> {
        let (&preamble, body) = data
            .split_first()
            .ok_or(WireError::UnexpectedEof { offset: 0, needed: 1 })?;
        if preamble != FORMAT_MARKER {
            return Err(WireError::InvalidPreamble { found: preamble });
        }
        let (history, _) = wire::decode_struct(body)?;
        let events = match history.get(10) {
            None => Vec::new(),
            Some(WireValue::List { elem_type, items }) => {
                if *elem_type != WireType::Struct {
                    return Err(WireError::TypeMismatch {
                        container: "History",
                        field: 10,
                        expected: WireType::Struct,
                        actual: *elem_type,
                    });
                }
                items
                    .iter()
                    .map(|item| match item {
                        WireValue::Struct(s) => HistoryEvent::from_wire(s),
                        other => Err(WireError::TypeMismatch {
                            container: "History",
                            field: 10,
                            expected: WireType::Struct,
                            actual: other.wire_type(),
                        }),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Some(other) => {
                return Err(WireError::TypeMismatch {
                    container: "History",
                    field: 10,
                    expected: WireType::List,
                    actual: other.wire_type(),
                })
            }
        };
        Ok(events)
    }
}

impl EventBlobDecoder for PayloadSerializer {
    fn decode_events(&self, blob: &DataBlob) -> Result<Vec<HistoryEvent>> {
        if blob.data.is_empty() {
            return Ok(Vec::new());
        }
        match blob.encoding_type {
            EncodingType::Json => serde_json::from_slice(&blob.data)
                .map_err(|e| RecoveryError::Projection(format!("json event batch: {}", e))),
            EncodingType::ThriftRw => Self::decode_thrift(&blob.data)
                .map_err(|e| RecoveryError::Projection(format!("thriftrw event batch: {}", e))),
        }
    }
}

/// A history-v2 task with its event blobs replaced by decoded events.
///
/// Top-level keys are `Task`, `Events` and `NewRunEvents`, the layout
/// existing recovery tooling reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryProjection {
    pub task: ReplicationTask,
    pub events: Vec<HistoryEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_run_events: Option<Vec<HistoryEvent>>,
}

impl HistoryProjection {
    /// Decode the task's event blobs and clear them from the task.
    pub fn build<D: EventBlobDecoder + ?Sized>(
        mut task: ReplicationTask,
        decoder: &D,
    ) -> Result<Self> {
        let attrs = task.history_task_v2_attributes.as_mut().ok_or_else(|| {
            RecoveryError::Projection("history v2 task without history attributes".to_string())
        })?;

        let events = match attrs.events.take() {
            Some(blob) => decoder.decode_events(&blob)?,
            None => Vec::new(),
        };
        let new_run_events = attrs
            .new_run_events
            .take()
            .map(|blob| decoder.decode_events(&blob))
            .transpose()?;

        Ok(Self {
            task,
            events,
            new_run_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HistoryTaskV2Attributes;

    fn json_blob(json: &str) -> DataBlob {
        DataBlob::new(EncodingType::Json, json.as_bytes().to_vec())
    }

    #[test]
    fn test_decode_json_events() {
        let blob = json_blob(
            r#"[{"eventId":1,"eventType":"WorkflowExecutionStarted","version":1,"workflowExecutionStartedEventAttributes":{"taskList":{"name":"tl"}}},{"eventId":2,"eventType":"DecisionTaskScheduled"}]"#,
        );
        let events = PayloadSerializer.decode_events(&blob).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, 1);
        assert_eq!(events[0].event_type.as_deref(), Some("WorkflowExecutionStarted"));
        assert!(events[0]
            .attributes
            .contains_key("workflowExecutionStartedEventAttributes"));
        assert_eq!(events[1].event_id, 2);
    }

    #[test]
    fn test_decode_thrift_events() {
        let event = WireStruct::new()
            .with(10, WireValue::I64(7))
            .with(20, WireValue::I64(1_000))
            .with(30, WireValue::I32(9))
            .with(35, WireValue::I64(3))
            .with(
                41,
                WireValue::Struct(WireStruct::new().with(10, WireValue::Binary(b"act".to_vec()))),
            );
        let history = WireStruct::new().with(
            10,
            WireValue::List {
                elem_type: wire::WireType::Struct,
                items: vec![WireValue::Struct(event)],
            },
        );
        let mut data = vec![FORMAT_MARKER];
        data.extend(wire::encode_struct(&history));

        let events = PayloadSerializer
            .decode_events(&DataBlob::new(EncodingType::ThriftRw, data))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, 7);
        assert_eq!(events[0].timestamp, Some(1_000));
        assert_eq!(events[0].event_type.as_deref(), Some("ActivityTaskScheduled"));
        assert_eq!(events[0].version, Some(3));
        assert_eq!(events[0].attributes["field41"]["10"], "act");
    }

    #[test]
    fn test_thrift_bad_preamble() {
        let blob = DataBlob::new(EncodingType::ThriftRw, vec![0x00, 0x00]);
        let err = PayloadSerializer.decode_events(&blob).unwrap_err();
        assert!(err.is_skippable());
        assert!(err.to_string().contains("preamble"));
    }

    #[test]
    fn test_bad_json_is_projection_error() {
        let err = PayloadSerializer.decode_events(&json_blob("{not json")).unwrap_err();
        assert!(matches!(err, RecoveryError::Projection(_)));
    }

    fn thrift_history(list: WireValue) -> DataBlob {
        let mut data = vec![FORMAT_MARKER];
        data.extend(wire::encode_struct(&WireStruct::new().with(10, list)));
        DataBlob::new(EncodingType::ThriftRw, data)
    }

    #[test]
    fn test_thrift_non_struct_events_rejected() {
        let blob = thrift_history(WireValue::List {
            elem_type: WireType::I32,
            items: vec![WireValue::I32(1), WireValue::I32(2)],
        });
        let err = PayloadSerializer.decode_events(&blob).unwrap_err();
        assert!(matches!(err, RecoveryError::Projection(_)));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_thrift_mistyped_event_field_rejected() {
        let event = WireStruct::new().with(10, WireValue::Binary(b"seven".to_vec()));
        let blob = thrift_history(WireValue::List {
            elem_type: WireType::Struct,
            items: vec![WireValue::Struct(event)],
        });
        let err = PayloadSerializer.decode_events(&blob).unwrap_err();
        assert!(matches!(err, RecoveryError::Projection(_)));
        assert!(err.to_string().contains("field 10 of HistoryEvent"));
    }

    #[test]
    fn test_thrift_event_without_id_defaults_to_zero() {
        let event = WireStruct::new().with(20, WireValue::I64(5));
        let blob = thrift_history(WireValue::List {
            elem_type: WireType::Struct,
            items: vec![WireValue::Struct(event)],
        });
        let events = PayloadSerializer.decode_events(&blob).unwrap();
        assert_eq!(events[0].event_id, 0);
        assert_eq!(events[0].timestamp, Some(5));
    }

    #[test]
    fn test_empty_blob_is_no_events() {
        let events = PayloadSerializer
            .decode_events(&DataBlob::new(EncodingType::ThriftRw, Vec::new()))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(event_type_name(0), "WorkflowExecutionStarted");
        assert_eq!(event_type_name(41), "UpsertWorkflowSearchAttributes");
        assert_eq!(event_type_name(99), "EventType(99)");
        assert_eq!(event_type_name(-1), "EventType(-1)");
    }

    #[test]
    fn test_projection_clears_blobs() {
        let mut attrs = HistoryTaskV2Attributes::new("d", "w", "r");
        attrs.events = Some(json_blob(r#"[{"eventId":5}]"#));
        attrs.new_run_events = Some(json_blob(r#"[{"eventId":1}]"#));
        let task = ReplicationTask::history_v2(attrs);

        let projection = HistoryProjection::build(task, &PayloadSerializer).unwrap();
        let attrs = projection.task.history_task_v2_attributes.as_ref().unwrap();
        assert!(attrs.events.is_none());
        assert!(attrs.new_run_events.is_none());
        assert_eq!(projection.events[0].event_id, 5);
        assert_eq!(projection.new_run_events.as_ref().unwrap()[0].event_id, 1);

        let json = serde_json::to_value(&projection).unwrap();
        assert!(json["Task"]["historyTaskV2Attributes"].get("events").is_none());
        assert_eq!(json["Events"][0]["eventId"], 5);
        assert_eq!(json["NewRunEvents"][0]["eventId"], 1);
        assert!(json.get("events").is_none());
    }

    #[test]
    fn test_projection_without_attributes_fails() {
        let task = ReplicationTask {
            task_type: Some(crate::message::ReplicationTaskType::HistoryV2),
            ..Default::default()
        };
        let err = HistoryProjection::build(task, &PayloadSerializer).unwrap_err();
        assert!(err.is_skippable());
    }
}

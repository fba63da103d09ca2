//! Kubernetes `core/v1` Event model and its normalization into records
//!
//! The struct mirrors the JSON shape the API server emits. Every known field
//! is kept in the normalized record even when unset (as `""`, `0`, `{}` or
//! `null`), so rules on a known field never fail lookup just because the
//! API server left it empty. Unknown fields are preserved as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::filter::Record;

/// Object metadata of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub uid: String,

    #[serde(default)]
    pub resource_version: String,

    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to the object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub uid: String,

    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub resource_version: String,

    #[serde(default)]
    pub field_path: String,
}

/// Component that reported an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOrigin {
    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub host: String,
}

/// A Kubernetes event as delivered by the API server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeEvent {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub involved_object: ObjectReference,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub source: EventOrigin,

    #[serde(default)]
    pub first_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub count: i32,

    /// `Normal` or `Warning`
    #[serde(rename = "type", default)]
    pub event_type: String,

    #[serde(default)]
    pub event_time: Option<String>,

    #[serde(default)]
    pub series: Option<Value>,

    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub related: Option<ObjectReference>,

    #[serde(default)]
    pub reporting_component: String,

    #[serde(default)]
    pub reporting_instance: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KubeEvent {
    /// Project the event into the generic record the filters run against.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if an unknown preserved field cannot be
    /// represented, which does not happen for events decoded from JSON.
    pub fn to_record(&self) -> Result<Record, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// When the event object was created, if the API server said so.
    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp
    }

    /// Whether the event was created before `instant`.
    ///
    /// Events without a creation timestamp count as older than anything.
    pub fn created_before(&self, instant: DateTime<Utc>) -> bool {
        self.creation_timestamp()
            .map_or(true, |created| created < instant)
    }

    /// `namespace/name` of the event object, for log fields.
    pub fn key(&self) -> String {
        if self.metadata.namespace.is_empty() {
            self.metadata.name.clone()
        } else {
            format!("{}/{}", self.metadata.namespace, self.metadata.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::path::resolve_string;
    use chrono::TimeZone;
    use serde_json::json;

    fn backoff_event_json() -> Value {
        json!({
            "kind": "Event",
            "apiVersion": "v1",
            "metadata": {
                "name": "job-1.17a2b",
                "namespace": "batch",
                "uid": "3f1c",
                "resourceVersion": "991",
                "creationTimestamp": "2024-05-01T10:00:00Z"
            },
            "involvedObject": {
                "kind": "Job",
                "namespace": "batch",
                "name": "job-1",
                "apiVersion": "batch/v1"
            },
            "reason": "BackoffLimitExceeded",
            "message": "Job has reached the specified backoff limit",
            "source": {"component": "job-controller"},
            "firstTimestamp": "2024-05-01T10:00:00Z",
            "lastTimestamp": "2024-05-01T10:00:00Z",
            "count": 1,
            "type": "Warning",
            "eventTime": null,
            "reportingComponent": "",
            "reportingInstance": ""
        })
    }

    #[test]
    fn test_decode_event() {
        let event: KubeEvent = serde_json::from_value(backoff_event_json()).unwrap();
        assert_eq!(event.reason, "BackoffLimitExceeded");
        assert_eq!(event.event_type, "Warning");
        assert_eq!(event.involved_object.kind, "Job");
        assert_eq!(event.count, 1);
        assert_eq!(event.key(), "batch/job-1.17a2b");
        assert_eq!(
            event.creation_timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(event.extra.get("kind"), Some(&json!("Event")));
    }

    #[test]
    fn test_record_paths() {
        let event: KubeEvent = serde_json::from_value(backoff_event_json()).unwrap();
        let record = event.to_record().unwrap();

        assert_eq!(resolve_string(&record, "type").unwrap(), "Warning");
        assert_eq!(resolve_string(&record, "involvedObject.kind").unwrap(), "Job");
        assert_eq!(resolve_string(&record, "count").unwrap(), "1");
        assert_eq!(
            resolve_string(&record, "source.component").unwrap(),
            "job-controller"
        );
        assert_eq!(resolve_string(&record, "apiVersion").unwrap(), "v1");
    }

    #[test]
    fn test_unset_known_fields_still_resolve() {
        let event = KubeEvent::default();
        let record = event.to_record().unwrap();

        assert_eq!(resolve_string(&record, "reason").unwrap(), "");
        assert_eq!(resolve_string(&record, "source.host").unwrap(), "");
        assert_eq!(resolve_string(&record, "count").unwrap(), "0");
        assert_eq!(resolve_string(&record, "related").unwrap(), "<nil>");
        assert!(resolve_string(&record, "metadata.labels.app").is_err());
    }

    #[test]
    fn test_created_before() {
        let launch = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut event = KubeEvent::default();
        assert!(event.created_before(launch));

        event.metadata.creation_timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
        assert!(event.created_before(launch));

        event.metadata.creation_timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());
        assert!(!event.created_before(launch));
    }

    #[test]
    fn test_key_without_namespace() {
        let mut event = KubeEvent::default();
        event.metadata.name = "node-event".to_string();
        assert_eq!(event.key(), "node-event");
    }
}

//! Wire types and validation for the chime daemon boundary.
//!
//! Two layers live here: the request/response framing the daemon speaks on
//! its socket, and the lifecycle event envelope a host delivers inside an
//! `event` request. Framing is strict (unknown methods or fields are
//! rejected) while event payloads are deliberately tolerant: hosts evolve
//! independently of us, so unknown event types and extra payload fields
//! must pass through without failing the request.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Event,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Lifecycle event types the arbiter understands. Anything else a host
/// sends maps to `Other` and is ignored downstream rather than rejected.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PermissionAsked,
    SessionStatus,
    SessionError,
    SessionInfoUpdated,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub properties: EventProperties,
    #[serde(default)]
    pub recorded_at: Option<String>,
}

// Every field is optional: some hosts omit the session id entirely, and
// absence must degrade gracefully rather than fault.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProperties {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: Option<StatusInfo>,
    #[serde(default)]
    pub info: Option<SessionInfo>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusInfo {
    #[serde(rename = "type")]
    pub kind: StatusKind,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Idle,
    Busy,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if let Some(recorded_at) = &self.recorded_at {
            if DateTime::parse_from_rfc3339(recorded_at).is_err() {
                return Err(ErrorInfo::new(
                    "invalid_timestamp",
                    "recorded_at must be RFC3339",
                ));
            }
        }
        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<EventEnvelope, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_idle_status_event() {
        let event = parse_event(json!({
            "type": "session_status",
            "properties": {
                "sessionId": "session-1",
                "status": { "type": "idle" }
            }
        }))
        .expect("valid event");

        assert_eq!(event.event_type, EventType::SessionStatus);
        assert_eq!(event.properties.session_id.as_deref(), Some("session-1"));
        assert_eq!(
            event.properties.status.map(|status| status.kind),
            Some(StatusKind::Idle)
        );
    }

    #[test]
    fn tolerates_unknown_event_type() {
        let event = parse_event(json!({
            "type": "window_moved",
            "properties": { "sessionId": "session-1" }
        }))
        .expect("unknown event types are tolerated");

        assert_eq!(event.event_type, EventType::Other);
    }

    #[test]
    fn tolerates_extra_fields_and_missing_properties() {
        let event = parse_event(json!({
            "type": "session_error",
            "source": "host-v2",
            "properties": { "sessionId": "session-1", "severity": "fatal" }
        }))
        .expect("extra fields are tolerated");

        assert_eq!(event.event_type, EventType::SessionError);

        let bare = parse_event(json!({ "type": "permission_asked" })).expect("bare event");
        assert!(bare.properties.session_id.is_none());
    }

    #[test]
    fn tolerates_unknown_status_kind() {
        let event = parse_event(json!({
            "type": "session_status",
            "properties": { "status": { "type": "compacting" } }
        }))
        .expect("unknown status kinds are tolerated");

        assert_eq!(
            event.properties.status.map(|status| status.kind),
            Some(StatusKind::Other)
        );
    }

    #[test]
    fn parses_session_info_update() {
        let event = parse_event(json!({
            "type": "session_info_updated",
            "properties": {
                "info": { "id": "session-2", "title": "Fix the build", "parentId": "session-1" }
            }
        }))
        .expect("valid info update");

        let info = event.properties.info.expect("info present");
        assert_eq!(info.id, "session-2");
        assert_eq!(info.title.as_deref(), Some("Fix the build"));
        assert_eq!(info.parent_id.as_deref(), Some("session-1"));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(parse_event(json!("session_status")).is_err());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let result = parse_event(json!({
            "type": "session_error",
            "recorded_at": "not-a-time"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn request_rejects_unknown_method() {
        let result: Result<Request, _> = serde_json::from_value(json!({
            "protocol_version": 1,
            "method": "drop_tables"
        }));
        assert!(result.is_err());
    }
}

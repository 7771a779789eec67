//! Classifies raw server-pushed events into `(workspace, method, params)`.
//!
//! Envelope shapes accepted:
//! - `{ "workspace_id": .., "method": .., "params": {..} }`
//! - `{ "workspaceId": .., "message": { "method": .., "params": {..} } }`
//!
//! Anything without a resolvable method is dropped. Classification never fails.

use serde_json::Value;

/// Method name of the server heartbeat on a live channel.
pub const METHOD_LIVE_HEARTBEAT: &str = "thread/live_heartbeat";

/// Method name sent when the server tears down a live channel.
pub const METHOD_LIVE_DETACHED: &str = "thread/live_detached";

/// What an event means to the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Heartbeat,
    Detached,
    /// Any other traffic; counts as proof the channel is flowing when scoped.
    Activity,
}

/// A recognized event.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub workspace_id: String,
    pub method: String,
    pub params: Value,
}

impl ClassifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self.method.as_str() {
            METHOD_LIVE_HEARTBEAT => EventKind::Heartbeat,
            METHOD_LIVE_DETACHED => EventKind::Detached,
            _ => EventKind::Activity,
        }
    }

    /// Thread id carried in params (`threadId`, `thread_id` or `thread.id`).
    pub fn thread_id(&self) -> Option<&str> {
        let params = self.params.as_object()?;
        params
            .get("threadId")
            .or_else(|| params.get("thread_id"))
            .or_else(|| params.get("thread").and_then(|thread| thread.get("id")))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Classify a raw event. Returns `None` for anything unrecognized.
pub fn classify(raw: &Value) -> Option<ClassifiedEvent> {
    let envelope = raw.as_object()?;
    let workspace_id = envelope
        .get("workspace_id")
        .or_else(|| envelope.get("workspaceId"))
        .and_then(Value::as_str)?
        .trim();
    if workspace_id.is_empty() {
        return None;
    }

    let message = envelope
        .get("message")
        .and_then(Value::as_object)
        .unwrap_or(envelope);
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|method| !method.is_empty())?;
    let params = match message.get("params") {
        Some(params @ Value::Object(_)) => params.clone(),
        _ => Value::Object(serde_json::Map::new()),
    };

    Some(ClassifiedEvent {
        workspace_id: workspace_id.to_string(),
        method: method.to_string(),
        params,
    })
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_envelope_is_classified() {
        let event = classify(&json!({
            "workspace_id": "ws-1",
            "method": "thread/live_heartbeat",
            "params": { "threadId": "thread-1" }
        }))
        .expect("recognized");

        assert_eq!(event.workspace_id, "ws-1");
        assert_eq!(event.kind(), EventKind::Heartbeat);
        assert_eq!(event.thread_id(), Some("thread-1"));
    }

    #[test]
    fn nested_message_envelope_is_classified() {
        let event = classify(&json!({
            "workspaceId": "ws-2",
            "message": {
                "method": "thread/live_detached",
                "params": { "thread_id": "thread-9" }
            }
        }))
        .expect("recognized");

        assert_eq!(event.workspace_id, "ws-2");
        assert_eq!(event.kind(), EventKind::Detached);
        assert_eq!(event.thread_id(), Some("thread-9"));
    }

    #[test]
    fn thread_object_id_is_resolved() {
        let event = classify(&json!({
            "workspace_id": "ws-1",
            "method": "thread/started",
            "params": { "thread": { "id": "thread-3" } }
        }))
        .expect("recognized");
        assert_eq!(event.kind(), EventKind::Activity);
        assert_eq!(event.thread_id(), Some("thread-3"));
    }

    #[test]
    fn missing_method_is_unrecognized() {
        assert!(classify(&json!({ "workspace_id": "ws-1", "params": {} })).is_none());
        assert!(classify(&json!({ "workspace_id": "ws-1", "method": "  " })).is_none());
        assert!(classify(&json!({ "workspace_id": "ws-1", "method": 42 })).is_none());
    }

    #[test]
    fn malformed_events_are_unrecognized() {
        assert!(classify(&json!(null)).is_none());
        assert!(classify(&json!("thread/live_heartbeat")).is_none());
        assert!(classify(&json!([1, 2, 3])).is_none());
        assert!(classify(&json!({ "method": "item/started" })).is_none());
        assert!(classify(&json!({ "workspace_id": "", "method": "item/started" })).is_none());
    }

    #[test]
    fn non_object_params_become_empty() {
        let event = classify(&json!({
            "workspace_id": "ws-1",
            "method": "item/started",
            "params": "oops"
        }))
        .expect("recognized");
        assert_eq!(event.params, json!({}));
        assert_eq!(event.thread_id(), None);
    }

    #[test]
    fn blank_thread_id_is_absent() {
        let event = classify(&json!({
            "workspace_id": "ws-1",
            "method": "item/started",
            "params": { "threadId": "   " }
        }))
        .expect("recognized");
        assert_eq!(event.thread_id(), None);
    }
}

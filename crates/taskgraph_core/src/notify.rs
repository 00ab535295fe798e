//! Outbound change notifications.
//!
//! # Responsibility
//! - Define the sink contract services publish task changes through.
//! - Provide in-process sinks for embedding, logging and tests.
//!
//! # Invariants
//! - Services publish only after a successful commit.
//! - Publishing is best-effort: sink failures are logged and swallowed,
//!   never surfaced to the mutation caller.

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Event names understood by downstream transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    UpdateTask,
    UpdateContributors,
    TaskCreated,
    TaskSorted,
    TaskParentUpdated,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateTask => "update_task",
            Self::UpdateContributors => "update_contributors",
            Self::TaskCreated => "task_created",
            Self::TaskSorted => "task_sorted",
            Self::TaskParentUpdated => "task_parent_updated",
        }
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEvent {
    /// Unique per emitted event so clients can drop duplicates.
    pub event_id: Uuid,
    pub name: EventName,
    pub payload: Value,
}

impl TaskEvent {
    pub fn new(name: EventName, payload: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            name,
            payload,
        }
    }
}

/// Error reported by a sink. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Transport-agnostic notification sink.
///
/// Implementations must not block on slow consumers.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &TaskEvent) -> Result<(), NotifyError>;
}

/// Publishes one event and swallows failures.
pub fn publish(sink: &dyn NotificationSink, event: TaskEvent) {
    match sink.notify(&event) {
        Ok(()) => debug!(
            "event=notify module=notify status=ok name={} event_id={}",
            event.name, event.event_id
        ),
        Err(err) => warn!(
            "event=notify module=notify status=error name={} event_id={} payload={} error={}",
            event.name, event.event_id, event.payload, err
        ),
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: &TaskEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sink that writes every event to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &TaskEvent) -> Result<(), NotifyError> {
        log::info!(
            "event=task_event module=notify status=ok name={} event_id={} payload={}",
            event.name,
            event.event_id,
            event.payload
        );
        Ok(())
    }
}

/// Sink that buffers events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TaskEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears buffered events.
    pub fn drain(&self) -> Vec<TaskEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Names of buffered events, oldest first.
    pub fn names(&self) -> Vec<EventName> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.name)
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, event: &TaskEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn notify(&self, _event: &TaskEvent) -> Result<(), NotifyError> {
            Err(NotifyError("socket closed".to_string()))
        }
    }

    #[test]
    fn publish_swallows_sink_failures() {
        publish(
            &FailingSink,
            TaskEvent::new(EventName::UpdateTask, json!({ "task_id": 1 })),
        );
    }

    #[test]
    fn memory_sink_buffers_and_drains() {
        let sink = MemorySink::new();
        publish(&sink, TaskEvent::new(EventName::TaskSorted, json!({})));
        publish(&sink, TaskEvent::new(EventName::TaskCreated, json!({})));
        assert_eq!(
            sink.names(),
            vec![EventName::TaskSorted, EventName::TaskCreated]
        );
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn event_names_use_wire_labels() {
        assert_eq!(EventName::TaskParentUpdated.as_str(), "task_parent_updated");
        let value = serde_json::to_value(EventName::UpdateContributors).unwrap();
        assert_eq!(value, json!("update_contributors"));
    }
}

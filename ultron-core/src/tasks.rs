//! Task tracker — status of long-running tool invocations.
//!
//! Entries are created in `Processing`, move to `Completed` or `Failed`
//! exactly once, and are kept for the lifetime of the tracker.

use crate::error::TaskError;
use crate::types::ToolOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Opaque identifier of a tracked invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(TaskId)
            .map_err(|_| TaskError::InvalidId { raw: s.to_string() })
    }
}

/// Status of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A point-in-time copy of a task entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub tool: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    /// One-line human-readable status.
    pub fn describe(&self) -> String {
        match self.status {
            TaskStatus::Processing => format!("Task {} ({}) is still processing.", self.id, self.tool),
            TaskStatus::Completed => {
                format!("Task {} ({}) has completed.", self.id, self.tool)
            }
            TaskStatus::Failed => format!(
                "Task {} ({}) failed: {}",
                self.id,
                self.tool,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Result of a status query. Unknown ids are a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskLookup {
    Found(TaskSnapshot),
    NotFound,
}

impl TaskLookup {
    pub fn snapshot(&self) -> Option<&TaskSnapshot> {
        match self {
            TaskLookup::Found(snapshot) => Some(snapshot),
            TaskLookup::NotFound => None,
        }
    }
}

/// Shared registry of tracked tasks.
#[derive(Debug, Default)]
pub struct TaskTracker {
    tasks: Mutex<HashMap<TaskId, TaskSnapshot>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, TaskSnapshot>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a `Processing` entry for `tool` and return its id.
    pub fn start(&self, tool: &str) -> TaskId {
        let id = TaskId::new();
        let snapshot = TaskSnapshot {
            id,
            tool: tool.to_string(),
            status: TaskStatus::Processing,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.entries().insert(id, snapshot);
        tracing::info!(task_id = %id, tool = %tool, "Task started");
        id
    }

    /// Mark a task completed with its result.
    pub fn complete(&self, id: TaskId, result: ToolOutput) -> Result<(), TaskError> {
        self.finish(id, TaskStatus::Completed, |entry| entry.result = Some(result))
    }

    /// Mark a task failed.
    pub fn fail(&self, id: TaskId, reason: impl Into<String>) -> Result<(), TaskError> {
        let reason = reason.into();
        self.finish(id, TaskStatus::Failed, |entry| entry.error = Some(reason))
    }

    fn finish(
        &self,
        id: TaskId,
        status: TaskStatus,
        apply: impl FnOnce(&mut TaskSnapshot),
    ) -> Result<(), TaskError> {
        let mut entries = self.entries();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| TaskError::NotFound { id: id.to_string() })?;
        if entry.status.is_finished() {
            return Err(TaskError::AlreadyFinished {
                id: id.to_string(),
                status: entry.status.to_string(),
            });
        }
        entry.status = status;
        entry.finished_at = Some(Utc::now());
        apply(entry);
        tracing::info!(task_id = %id, status = %status, "Task finished");
        Ok(())
    }

    pub fn status(&self, id: TaskId) -> TaskLookup {
        match self.entries().get(&id) {
            Some(snapshot) => TaskLookup::Found(snapshot.clone()),
            None => TaskLookup::NotFound,
        }
    }

    /// Parse a user-supplied id string.
    pub fn parse_id(raw: &str) -> Result<TaskId, TaskError> {
        raw.parse()
    }

    /// All tasks, oldest first.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<TaskSnapshot> = self.entries().values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        all
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_processing() {
        let tracker = TaskTracker::new();
        let id = tracker.start("thesis_generation");
        let snap = tracker.status(id).snapshot().cloned().unwrap();
        assert_eq!(snap.status, TaskStatus::Processing);
        assert_eq!(snap.tool, "thesis_generation");
        assert!(snap.finished_at.is_none());
        assert!(snap.describe().contains("still processing"));
    }

    #[test]
    fn test_ids_are_unique() {
        let tracker = TaskTracker::new();
        let a = tracker.start("t");
        let b = tracker.start("t");
        assert_ne!(a, b);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_complete_once() {
        let tracker = TaskTracker::new();
        let id = tracker.start("t");
        tracker.complete(id, ToolOutput::text("done")).unwrap();

        let snap = tracker.status(id).snapshot().cloned().unwrap();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.result, Some(ToolOutput::text("done")));
        assert!(snap.finished_at.is_some());

        match tracker.fail(id, "late") {
            Err(TaskError::AlreadyFinished { status, .. }) => assert_eq!(status, "completed"),
            other => panic!("expected AlreadyFinished, got {other:?}"),
        }
        assert_eq!(
            tracker.status(id).snapshot().map(|s| s.status),
            Some(TaskStatus::Completed)
        );
    }

    #[test]
    fn test_fail_records_reason() {
        let tracker = TaskTracker::new();
        let id = tracker.start("t");
        tracker.fail(id, "upstream 503").unwrap();
        let snap = tracker.status(id).snapshot().cloned().unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.describe(), format!("Task {id} (t) failed: upstream 503"));
    }

    #[test]
    fn test_unknown_id() {
        let tracker = TaskTracker::new();
        let stranger: TaskId = "6f1c9a52-1d2e-4f7a-9a43-0c8f6d2b7e11".parse().unwrap();
        assert_eq!(tracker.status(stranger), TaskLookup::NotFound);
        assert!(matches!(
            tracker.complete(stranger, ToolOutput::text("x")),
            Err(TaskError::NotFound { .. })
        ));
    }

    #[test]
    fn test_parse_id() {
        let tracker = TaskTracker::new();
        let id = tracker.start("t");
        assert_eq!(TaskTracker::parse_id(&format!(" {id} ")).unwrap(), id);
        assert!(matches!(
            TaskTracker::parse_id("not-a-task"),
            Err(TaskError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_list_oldest_first() {
        let tracker = TaskTracker::new();
        let first = tracker.start("a");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = tracker.start("b");
        let ids: Vec<TaskId> = tracker.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}

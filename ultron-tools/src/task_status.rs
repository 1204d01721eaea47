//! `task_status`: poll a background task started in an earlier turn.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use ultron_core::error::ToolError;
use ultron_core::registry::{ParamKind, ParamSpec, Tool};
use ultron_core::tasks::{TaskLookup, TaskStatus, TaskTracker};
use ultron_core::types::ToolOutput;

pub struct TaskStatusTool {
    tracker: Arc<TaskTracker>,
}

impl TaskStatusTool {
    pub fn new(tracker: Arc<TaskTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Tool for TaskStatusTool {
    fn name(&self) -> &str {
        "task_status"
    }

    fn description(&self) -> &str {
        "Check the status of a background task by its id."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "task_id",
            ParamKind::String,
            "The id reported when the task was started",
        )]
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let raw = args["task_id"].as_str().unwrap_or_default();
        let id = match TaskTracker::parse_id(raw) {
            Ok(id) => id,
            Err(e) => return Ok(ToolOutput::error(e.to_string())),
        };

        let snapshot = match self.tracker.status(id) {
            TaskLookup::Found(snapshot) => snapshot,
            TaskLookup::NotFound => {
                return Ok(ToolOutput::text(format!("No task found with id {id}.")));
            }
        };

        match (&snapshot.status, &snapshot.result) {
            (TaskStatus::Completed, Some(result)) => {
                let summary = format!("{}\n\n{}", snapshot.describe(), result.speakable());
                let data = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
                Ok(ToolOutput::data(summary, data).with_references(result.references().to_vec()))
            }
            _ => Ok(ToolOutput::text(snapshot.describe())),
        }
    }
}

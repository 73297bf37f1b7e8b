//! The plan notebook and its built-in toolkit.
//!
//! Grounded in the teacher's attached-shared-state pattern — `Agent` holds
//! `thought_chain: Option<Arc<RwLock<ThoughtChain>>>` and mutates it only
//! through registered tools; the plan notebook here is attached to
//! [`crate::memory::auto_context::AutoContextMemory`] and to the ReAct
//! loop's tool registry the same way, resolving the plan/notebook/agent
//! cyclic reference per §9 Design Notes without a back-pointer from the
//! plan to its owner.

use crate::agent::tool::{Tool, ToolSpec};
use crate::error::ToolError;
use crate::message::{ContentBlock, Message};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Todo,
    InProgress,
    Done,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskState {
    Todo,
    InProgress,
    Done,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Subtask {
    pub title: String,
    pub description: String,
    pub outcome: Option<String>,
    pub state: SubtaskState,
}

impl Subtask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), outcome: None, state: SubtaskState::Todo }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub title: String,
    pub description: String,
    pub expected_outcome: String,
    pub subtasks: Vec<Subtask>,
    pub state: PlanState,
}

impl Plan {
    pub fn new(title: impl Into<String>, description: impl Into<String>, expected_outcome: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            expected_outcome: expected_outcome.into(),
            subtasks: Vec::new(),
            state: PlanState::Todo,
        }
    }

    pub fn add_subtask(&mut self, subtask: Subtask) {
        self.subtasks.push(subtask);
    }

    /// Starts the plan: marks it IN_PROGRESS and, if it has subtasks,
    /// marks the first one IN_PROGRESS too — preserving the invariant that
    /// a running plan has exactly one IN_PROGRESS subtask.
    pub fn start(&mut self) {
        self.state = PlanState::InProgress;
        if let Some(first) = self.subtasks.first_mut() {
            first.state = SubtaskState::InProgress;
        }
    }

    fn in_progress_index(&self) -> Option<usize> {
        self.subtasks.iter().position(|s| s.state == SubtaskState::InProgress)
    }

    /// Marks the current IN_PROGRESS subtask DONE (recording `outcome`) and
    /// advances to the next TODO subtask, marking it IN_PROGRESS. Returns
    /// an error if there is no IN_PROGRESS subtask to advance from.
    pub fn advance(&mut self, outcome: impl Into<String>) -> Result<(), String> {
        let Some(index) = self.in_progress_index() else {
            return Err("no subtask is currently in progress".to_string());
        };
        self.subtasks[index].state = SubtaskState::Done;
        self.subtasks[index].outcome = Some(outcome.into());
        if let Some(next) = self.subtasks.get_mut(index + 1) {
            next.state = SubtaskState::InProgress;
        }
        Ok(())
    }

    pub fn finish(&mut self, final_state: PlanState) {
        self.state = final_state;
        if let Some(index) = self.in_progress_index() {
            if self.subtasks[index].state == SubtaskState::InProgress {
                self.subtasks[index].state = match final_state {
                    PlanState::Done => SubtaskState::Done,
                    _ => SubtaskState::Skipped,
                };
            }
        }
    }

    /// Renders the plan's current state as a compact hint, inlined ahead
    /// of compression prompts per §4.2 Plan awareness.
    pub fn render(&self) -> String {
        let mut out = format!("Plan: {} [{:?}]\n{}\n", self.title, self.state, self.description);
        for (i, s) in self.subtasks.iter().enumerate() {
            out.push_str(&format!("  {}. [{:?}] {}\n", i + 1, s.state, s.title));
        }
        out
    }
}

fn arg_str(input: &serde_json::Map<String, Value>, key: &str) -> Result<String, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::new(key, format!("missing required string argument `{key}`")))
}

/// Creates the plan, replacing any previous one, and starts it.
pub struct CreatePlanTool {
    notebook: Arc<RwLock<Plan>>,
}

impl CreatePlanTool {
    pub fn new(notebook: Arc<RwLock<Plan>>) -> Self {
        Self { notebook }
    }
}

#[async_trait]
impl Tool for CreatePlanTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "create_plan",
            "Create a plan with a title, description, expected outcome, and ordered subtask titles.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "expected_outcome": {"type": "string"},
                    "subtasks": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["title", "description", "expected_outcome"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let mut plan = Plan::new(arg_str(&input, "title")?, arg_str(&input, "description")?, arg_str(&input, "expected_outcome")?);
        if let Some(subtasks) = input.get("subtasks").and_then(|v| v.as_array()) {
            for s in subtasks {
                if let Some(title) = s.as_str() {
                    plan.add_subtask(Subtask::new(title, ""));
                }
            }
        }
        plan.start();
        let rendered = plan.render();
        *self.notebook.write().await = plan;
        Ok(vec![ContentBlock::text(rendered)])
    }
}

/// Advances the current subtask, recording its outcome.
pub struct AdvanceSubtaskTool {
    notebook: Arc<RwLock<Plan>>,
}

impl AdvanceSubtaskTool {
    pub fn new(notebook: Arc<RwLock<Plan>>) -> Self {
        Self { notebook }
    }
}

#[async_trait]
impl Tool for AdvanceSubtaskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "advance_subtask",
            "Mark the current in-progress subtask done with an outcome, and advance to the next one.",
            serde_json::json!({
                "type": "object",
                "properties": {"outcome": {"type": "string"}},
                "required": ["outcome"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let outcome = arg_str(&input, "outcome")?;
        let mut plan = self.notebook.write().await;
        plan.advance(outcome).map_err(|e| ToolError::new("advance_subtask", e))?;
        Ok(vec![ContentBlock::text(plan.render())])
    }
}

/// Finishes the plan with a terminal state (`done` or `abandoned`).
pub struct FinishPlanTool {
    notebook: Arc<RwLock<Plan>>,
}

impl FinishPlanTool {
    pub fn new(notebook: Arc<RwLock<Plan>>) -> Self {
        Self { notebook }
    }
}

#[async_trait]
impl Tool for FinishPlanTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "finish_plan",
            "Finish the plan, marking it done or abandoned.",
            serde_json::json!({
                "type": "object",
                "properties": {"state": {"type": "string", "enum": ["done", "abandoned"]}},
                "required": ["state"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let state_str = arg_str(&input, "state")?;
        let final_state = match state_str.as_str() {
            "done" => PlanState::Done,
            "abandoned" => PlanState::Abandoned,
            other => return Err(ToolError::new("finish_plan", format!("unknown state `{other}`"))),
        };
        let mut plan = self.notebook.write().await;
        plan.finish(final_state);
        Ok(vec![ContentBlock::text(plan.render())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_marks_plan_and_first_subtask_in_progress() {
        let mut plan = Plan::new("t", "d", "o");
        plan.add_subtask(Subtask::new("a", ""));
        plan.add_subtask(Subtask::new("b", ""));
        plan.start();
        assert_eq!(plan.state, PlanState::InProgress);
        assert_eq!(plan.subtasks[0].state, SubtaskState::InProgress);
        assert_eq!(plan.subtasks[1].state, SubtaskState::Todo);
    }

    #[test]
    fn advance_moves_in_progress_marker_forward() {
        let mut plan = Plan::new("t", "d", "o");
        plan.add_subtask(Subtask::new("a", ""));
        plan.add_subtask(Subtask::new("b", ""));
        plan.start();
        plan.advance("did a").unwrap();
        assert_eq!(plan.subtasks[0].state, SubtaskState::Done);
        assert_eq!(plan.subtasks[0].outcome.as_deref(), Some("did a"));
        assert_eq!(plan.subtasks[1].state, SubtaskState::InProgress);
    }

    #[test]
    fn advance_without_in_progress_subtask_errors() {
        let mut plan = Plan::new("t", "d", "o");
        assert!(plan.advance("x").is_err());
    }

    #[test]
    fn finish_marks_remaining_in_progress_subtask_done() {
        let mut plan = Plan::new("t", "d", "o");
        plan.add_subtask(Subtask::new("a", ""));
        plan.start();
        plan.finish(PlanState::Done);
        assert_eq!(plan.state, PlanState::Done);
        assert_eq!(plan.subtasks[0].state, SubtaskState::Done);
    }
}

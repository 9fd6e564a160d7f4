//! Tool abstraction and dispatch.

use std::collections::HashMap;

use async_trait::async_trait;
use kopi_core::{ConversationSnapshot, MessageTurn, PlannerAction};
use serde_json::{json, Value};

/// Everything a tool may look at for one turn.
///
/// The snapshot carries the merged slot state, including values extracted
/// from the current message, so tools can prefer a resolved slot over
/// re-parsing the raw text.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub turn: &'a MessageTurn,
    pub snapshot: &'a ConversationSnapshot,
}

/// Outcome of a tool run.
///
/// `success = false` is a soft failure the tool could phrase itself, for
/// example a search with no hits. Hard failures are returned as errors and
/// rephrased by the orchestrator.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub content: String,
    pub data: Value,
    pub success: bool,
}

impl ToolResponse {
    pub fn ok(content: impl Into<String>, data: Value) -> Self {
        Self {
            content: content.into(),
            data,
            success: true,
        }
    }

    pub fn failed(content: impl Into<String>, data: Value) -> Self {
        Self {
            content: content.into(),
            data,
            success: false,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, context: ToolContext<'_>) -> anyhow::Result<ToolResponse>;
}

/// Maps planner actions onto registered tools.
#[derive(Default)]
pub struct ToolRouter {
    tools: HashMap<PlannerAction, Box<dyn Tool>>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: PlannerAction, tool: Box<dyn Tool>) {
        self.tools.insert(action, tool);
    }

    pub async fn dispatch(
        &self,
        action: PlannerAction,
        context: ToolContext<'_>,
    ) -> anyhow::Result<ToolResponse> {
        match self.tools.get(&action) {
            Some(tool) => {
                tracing::debug!(tool = tool.name(), action = action.as_str(), "dispatching tool");
                tool.run(context).await
            }
            None => Ok(ToolResponse::failed(
                "I don't have a tool for that yet.",
                json!({ "action": action.as_str() }),
            )),
        }
    }
}

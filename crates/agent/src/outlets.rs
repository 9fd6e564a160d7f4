//! Outlet directory lookups.

use std::sync::Arc;

use async_trait::async_trait;
use kopi_db::OutletRepository;
use serde_json::json;

use crate::tools::{Tool, ToolContext, ToolResponse};

const TOP_K: u32 = 3;

pub struct OutletsTool {
    repository: Arc<dyn OutletRepository>,
}

impl OutletsTool {
    pub fn new(repository: Arc<dyn OutletRepository>) -> Self {
        Self { repository }
    }

    /// Shared by the tool path and the HTTP tool endpoint.
    pub async fn lookup(&self, query: &str) -> anyhow::Result<ToolResponse> {
        let outlets = self.repository.search(query, TOP_K).await?;
        if outlets.is_empty() {
            return Ok(ToolResponse::failed(
                "I couldn't find an outlet matching that description.",
                json!({ "results": [] }),
            ));
        }
        let lines: Vec<String> = outlets.iter().map(|outlet| outlet.summary()).collect();
        Ok(ToolResponse::ok(
            format!("Here are the closest matches:\n{}", lines.join("\n")),
            json!({
                "results": outlets
                    .iter()
                    .map(|outlet| json!({
                        "name": outlet.name,
                        "city": outlet.city,
                        "state": outlet.state,
                        "opening_hours": outlet.opening_hours,
                        "services": outlet.services,
                    }))
                    .collect::<Vec<_>>(),
            }),
        ))
    }
}

#[async_trait]
impl Tool for OutletsTool {
    fn name(&self) -> &'static str {
        "outlets"
    }

    async fn run(&self, context: ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let query = context
            .snapshot
            .slots
            .get("location")
            .unwrap_or(&context.turn.content);
        self.lookup(query).await
    }
}

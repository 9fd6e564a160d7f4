//! One-turn dialogue loop.
//!
//! `handle_turn` is the only entry point: persist the message, plan,
//! merge slot updates, run a tool if the plan asks for one, and shape
//! the reply. Planner decisions are pure; every side effect lives here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use kopi_core::{
    slot_label, ApplicationError, Intent, MessageTurn, MetricsCollector, Planner, PlannerAction,
    PlannerContext, TurnRole,
};
use kopi_db::MemoryStore;

use crate::tools::{ToolContext, ToolRouter};

const FALLBACK_MESSAGE: &str = "Sorry, I didn't quite get that. Could you rephrase?";
const SMALL_TALK_MESSAGE: &str =
    "Hello! I can help with drinkware products, outlet locations and quick calculations.";
const RESET_MESSAGE: &str = "Okay, I've cleared our conversation. How can I help next?";
const GENERIC_FOLLOW_UP: &str = "Could you share a bit more detail so I can help?";
const TOOL_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while handling that. Please try again.";

/// Everything the interface layer needs to render one reply.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub conversation_id: String,
    pub intent: Intent,
    pub action: PlannerAction,
    pub confidence: f64,
    pub message: String,
    pub tool_success: bool,
    pub tool_data: Value,
    pub required_slots: BTreeMap<String, bool>,
    pub slots: BTreeMap<String, String>,
}

pub struct DialogueOrchestrator {
    store: Arc<dyn MemoryStore>,
    planner: Arc<dyn Planner>,
    router: ToolRouter,
    metrics: Arc<MetricsCollector>,
}

impl DialogueOrchestrator {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        planner: Arc<dyn Planner>,
        router: ToolRouter,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            planner,
            router,
            metrics,
        }
    }

    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<ChatOutcome, ApplicationError> {
        let turn = MessageTurn::new(conversation_id, role, content);
        self.store.append_turn(&turn).await.map_err(persistence)?;

        let mut snapshot = self
            .store
            .load_snapshot(conversation_id)
            .await
            .map_err(persistence)?;

        let decision = self.planner.decide(&PlannerContext {
            turn: &turn,
            snapshot: &snapshot,
        });
        self.metrics.record_decision(decision.intent, decision.action);
        tracing::info!(
            conversation_id,
            intent = decision.intent.as_str(),
            action = decision.action.as_str(),
            confidence = decision.confidence,
            "planner decision",
        );

        if decision.action == PlannerAction::Finish {
            self.store.reset(conversation_id).await.map_err(persistence)?;
            return Ok(ChatOutcome {
                conversation_id: conversation_id.to_string(),
                intent: decision.intent,
                action: decision.action,
                confidence: decision.confidence,
                message: RESET_MESSAGE.to_string(),
                tool_success: true,
                tool_data: json!({}),
                required_slots: decision.required_slots,
                slots: BTreeMap::new(),
            });
        }

        if !decision.slot_updates.is_empty() {
            self.store
                .upsert_slots(conversation_id, &decision.slot_updates)
                .await
                .map_err(persistence)?;
            snapshot.slots.apply(&decision.slot_updates);
        }

        let (message, tool_success, tool_data) = match decision.action {
            PlannerAction::AskFollowUp => {
                let prompt = decision
                    .first_unsatisfied_slot()
                    .and_then(slot_label)
                    .map(|label| format!("Could you tell me {label}?"))
                    .unwrap_or_else(|| GENERIC_FOLLOW_UP.to_string());
                (prompt, true, json!({}))
            }
            PlannerAction::Fallback => {
                let message = if decision.intent == Intent::SmallTalk {
                    SMALL_TALK_MESSAGE
                } else {
                    FALLBACK_MESSAGE
                };
                (message.to_string(), true, json!({}))
            }
            PlannerAction::CallCalculator
            | PlannerAction::CallProducts
            | PlannerAction::CallOutlets => {
                let context = ToolContext {
                    turn: &turn,
                    snapshot: &snapshot,
                };
                match self.router.dispatch(decision.action, context).await {
                    Ok(response) => {
                        if !response.success {
                            self.metrics.record_tool_failure();
                        }
                        (response.content, response.success, response.data)
                    }
                    Err(err) => {
                        self.metrics.record_tool_failure();
                        tracing::warn!(
                            conversation_id,
                            action = decision.action.as_str(),
                            error = %err,
                            "tool execution failed",
                        );
                        (
                            TOOL_ERROR_MESSAGE.to_string(),
                            false,
                            json!({ "error": err.to_string() }),
                        )
                    }
                }
            }
            // Finish returned above.
            PlannerAction::Finish => (RESET_MESSAGE.to_string(), true, json!({})),
        };

        let slots = snapshot
            .slots
            .iter()
            .map(|(slot, value)| (slot.to_string(), value.to_string()))
            .collect();

        Ok(ChatOutcome {
            conversation_id: conversation_id.to_string(),
            intent: decision.intent,
            action: decision.action,
            confidence: decision.confidence,
            message,
            tool_success,
            tool_data,
            required_slots: decision.required_slots,
            slots,
        })
    }
}

fn persistence(err: kopi_db::RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kopi_core::{Outlet, RuleBasedPlanner};
    use kopi_db::{InMemoryMemoryStore, OutletRepository, RepositoryError};
    use serde_json::json;
    use std::io::Write;

    use crate::calculator::CalculatorTool;
    use crate::outlets::OutletsTool;
    use crate::products::{ProductCatalogue, ProductsTool};
    use crate::tools::{Tool, ToolResponse};

    struct StaticOutlets(Vec<Outlet>);

    #[async_trait]
    impl OutletRepository for StaticOutlets {
        async fn search(&self, query: &str, limit: u32) -> Result<Vec<Outlet>, RepositoryError> {
            let needle = query.to_lowercase();
            Ok(self
                .0
                .iter()
                .filter(|outlet| {
                    outlet.name.to_lowercase().contains(&needle)
                        || outlet.city.to_lowercase().contains(&needle)
                })
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn insert(&self, _outlet: &Outlet) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn count(&self) -> Result<i64, RepositoryError> {
            Ok(self.0.len() as i64)
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn run(&self, _context: ToolContext<'_>) -> anyhow::Result<ToolResponse> {
            anyhow::bail!("backend unreachable")
        }
    }

    fn catalogue(dir: &tempfile::TempDir) -> Arc<ProductCatalogue> {
        let metadata_path = dir.path().join("products_metadata.json");
        let index_path = dir.path().join("products.index");
        let records = json!([
            {
                "name": "Classic Tumbler",
                "size": "500ml",
                "description": "Double-walled stainless steel tumbler",
                "tags": ["tumbler", "stainless"]
            }
        ]);
        let mut file = std::fs::File::create(&metadata_path).unwrap();
        file.write_all(records.to_string().as_bytes()).unwrap();
        std::fs::File::create(&index_path).unwrap();
        Arc::new(ProductCatalogue::load(&index_path, &metadata_path))
    }

    fn outlets() -> Arc<dyn OutletRepository> {
        Arc::new(StaticOutlets(vec![
            Outlet {
                name: "Kopi Coffee SS 2".into(),
                city: "Petaling Jaya".into(),
                state: "Selangor".into(),
                opening_hours: Some("9:00 AM - 10:00 PM".into()),
                services: None,
            },
            Outlet {
                name: "Kopi Coffee Uptown Damansara".into(),
                city: "Petaling Jaya".into(),
                state: "Selangor".into(),
                opening_hours: Some("8:00 AM - 9:00 PM".into()),
                services: None,
            },
        ]))
    }

    fn orchestrator(dir: &tempfile::TempDir) -> DialogueOrchestrator {
        let mut router = ToolRouter::new();
        router.register(PlannerAction::CallCalculator, Box::new(CalculatorTool));
        router.register(
            PlannerAction::CallProducts,
            Box::new(ProductsTool::new(catalogue(dir), None)),
        );
        router.register(
            PlannerAction::CallOutlets,
            Box::new(OutletsTool::new(outlets())),
        );
        DialogueOrchestrator::new(
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(RuleBasedPlanner::new()),
            router,
            Arc::new(MetricsCollector::new()),
        )
    }

    #[tokio::test]
    async fn calculation_turn_returns_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);
        let outcome = orchestrator
            .handle_turn("conv-calc", TurnRole::User, "Can you calc 1 + 2?")
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::Calculate);
        assert_eq!(outcome.action, PlannerAction::CallCalculator);
        assert!(outcome.tool_success);
        assert_eq!(outcome.message, "3");
    }

    #[tokio::test]
    async fn outlet_flow_persists_location_across_turns() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);

        let first = orchestrator
            .handle_turn("conv-outlet", TurnRole::User, "What time do you open?")
            .await
            .unwrap();
        assert_eq!(first.action, PlannerAction::AskFollowUp);
        assert_eq!(first.message, "Could you tell me the location?");

        let second = orchestrator
            .handle_turn("conv-outlet", TurnRole::User, "Damansara outlet please.")
            .await
            .unwrap();
        assert_eq!(second.action, PlannerAction::CallOutlets);
        assert!(second.tool_success);
        assert!(second.message.contains("Uptown Damansara"));
        assert_eq!(second.slots.get("location").map(String::as_str), Some("Damansara"));

        // The stored slot keeps later turns on the same outlet without
        // re-stating the location.
        let third = orchestrator
            .handle_turn("conv-outlet", TurnRole::User, "and the closing hours?")
            .await
            .unwrap();
        assert_eq!(third.action, PlannerAction::CallOutlets);
        assert!(third.tool_success);
    }

    #[tokio::test]
    async fn product_turn_lists_picks() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);
        let outcome = orchestrator
            .handle_turn("conv-prod", TurnRole::User, "Do you have a stainless tumbler?")
            .await
            .unwrap();

        assert_eq!(outcome.action, PlannerAction::CallProducts);
        assert!(outcome.tool_success);
        assert!(outcome.message.contains("Classic Tumbler"));
        assert_eq!(
            outcome.slots.get("product_type").map(String::as_str),
            Some("tumbler")
        );
    }

    #[tokio::test]
    async fn gibberish_falls_back_with_rephrase_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);
        let outcome = orchestrator
            .handle_turn("conv-unknown", TurnRole::User, "blorbledygook")
            .await
            .unwrap();

        assert_eq!(outcome.action, PlannerAction::Fallback);
        assert!(outcome.message.to_lowercase().contains("rephrase"));
        assert!((outcome.confidence - 0.65).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn reset_clears_slots_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);

        orchestrator
            .handle_turn("conv-reset", TurnRole::User, "Damansara outlet please.")
            .await
            .unwrap();
        let reset = orchestrator
            .handle_turn("conv-reset", TurnRole::User, "reset please")
            .await
            .unwrap();
        assert_eq!(reset.action, PlannerAction::Finish);
        assert!(reset.slots.is_empty());

        // The next outlet question starts over and asks for a location.
        let after = orchestrator
            .handle_turn("conv-reset", TurnRole::User, "opening hours?")
            .await
            .unwrap();
        assert_eq!(after.action, PlannerAction::AskFollowUp);
    }

    #[tokio::test]
    async fn tool_error_becomes_a_polite_failure() {
        let mut router = ToolRouter::new();
        router.register(PlannerAction::CallCalculator, Box::new(BrokenTool));
        let metrics = Arc::new(MetricsCollector::new());
        let orchestrator = DialogueOrchestrator::new(
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(RuleBasedPlanner::new()),
            router,
            Arc::clone(&metrics),
        );

        let outcome = orchestrator
            .handle_turn("conv-broken", TurnRole::User, "calc 1 + 1")
            .await
            .unwrap();
        assert!(!outcome.tool_success);
        assert_eq!(outcome.message, TOOL_ERROR_MESSAGE);
        assert_eq!(metrics.snapshot().tool_failures, 1);
    }

    #[tokio::test]
    async fn small_talk_greets_instead_of_apologising() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir);
        let outcome = orchestrator
            .handle_turn("conv-hi", TurnRole::User, "hello there")
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::SmallTalk);
        assert_eq!(outcome.message, SMALL_TALK_MESSAGE);
    }
}

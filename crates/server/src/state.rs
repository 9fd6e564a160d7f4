use std::sync::Arc;

use kopi_agent::{DialogueOrchestrator, OutletsTool, ProductsTool};
use kopi_core::MetricsCollector;
use kopi_db::{DbPool, MemoryStore};

/// Shared handler state. Everything is behind an `Arc` so cloning per
/// request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub store: Arc<dyn MemoryStore>,
    pub metrics: Arc<MetricsCollector>,
    pub products: Arc<ProductsTool>,
    pub outlets: Arc<OutletsTool>,
    pub db_pool: DbPool,
}

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::domain::decision::{Intent, PlannerAction};

/// Point-in-time copy of the collected counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricSnapshot {
    pub total_requests: u64,
    pub planner_intents: BTreeMap<String, u64>,
    pub planner_actions: BTreeMap<String, u64>,
    pub tool_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    planner_intents: BTreeMap<String, u64>,
    planner_actions: BTreeMap<String, u64>,
    tool_failures: u64,
}

/// Mutex-guarded counter storage. Owned by the composition root and handed
/// to the orchestrator and HTTP layer by reference, never a process global.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // Counter updates are loss-tolerant, so a poisoned lock is recovered
    // rather than propagated.
    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record_decision(&self, intent: Intent, action: PlannerAction) {
        let mut counters = self.lock();
        counters.total_requests += 1;
        *counters.planner_intents.entry(intent.as_str().to_string()).or_default() += 1;
        *counters.planner_actions.entry(action.as_str().to_string()).or_default() += 1;
    }

    pub fn record_tool_failure(&self) {
        let mut counters = self.lock();
        counters.tool_failures += 1;
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let counters = self.lock();
        MetricSnapshot {
            total_requests: counters.total_requests,
            planner_intents: counters.planner_intents.clone(),
            planner_actions: counters.planner_actions.clone(),
            tool_failures: counters.tool_failures,
        }
    }
}

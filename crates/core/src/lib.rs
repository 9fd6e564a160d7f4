pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod planner;

pub use domain::conversation::{slot_label, ConversationSnapshot, MessageTurn, SlotState, TurnRole};
pub use domain::decision::{Intent, PlannerAction, PlannerDecision};
pub use domain::outlet::Outlet;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use metrics::{MetricSnapshot, MetricsCollector};
pub use planner::{Planner, PlannerContext, RuleBasedPlanner};

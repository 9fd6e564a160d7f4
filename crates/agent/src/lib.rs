//! Dialogue orchestration and the tools it can delegate to.
//!
//! The orchestrator owns one turn of the conversation loop: persist the
//! incoming message, ask the planner what to do, run the chosen tool and
//! shape the reply. Tools are small async units behind the [`Tool`] trait
//! so the router can treat the calculator, the product catalogue and the
//! outlet directory uniformly.

pub mod calculator;
pub mod orchestrator;
pub mod outlets;
pub mod products;
pub mod summarizer;
pub mod tools;

pub use calculator::CalculatorTool;
pub use orchestrator::{ChatOutcome, DialogueOrchestrator};
pub use outlets::OutletsTool;
pub use products::{ProductCatalogue, ProductRecord, ProductsTool};
pub use summarizer::ProductSummarizer;
pub use tools::{Tool, ToolContext, ToolResponse, ToolRouter};

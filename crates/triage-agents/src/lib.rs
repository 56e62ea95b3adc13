//! LLM ticket triage for AutoCRM.
//!
//! Three stages, each a single model call whose reply is validated before
//! anything is written:
//!
//! - `agents::classify`: suggest one of the fixed ticket categories
//! - `agents::route`: pick a team, record a routing metric
//! - `agents::assign`: pick an agent, record an assignment metric and
//!   overwrite the agent's workload
//!
//! `TriageOrchestrator` runs them against stored tickets and applies the
//! ticket-row updates. Models are reached through `TriageModel` and
//! storage through `TriageStore`, so both can be swapped in tests.

pub mod agents;
pub mod config;
pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod prompts;
pub mod request;
pub mod state_machine;
pub mod store;

pub use agents::{RigTriageModel, TriageModel};
pub use config::TriageConfig;
pub use errors::{ErrorKind, TriageError, TriageResult};
pub use orchestrator::{TriageOrchestrator, TriageOutcome};
pub use request::{StageRequest, PREVIEW_ID};
pub use store::{MemoryStore, PgStore, StoreError, TriageStore};

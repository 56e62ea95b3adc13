//! AutoCRM triage coordination library
//!
//! Deterministic pieces of the ticket triage pipeline, with no model or
//! database access:
//!
//! - `model`: ticket, team and profile rows; stage results and metric rows
//! - `validate`: fail-closed checks of model replies (format → reference →
//!   range → pattern)
//! - `aggregate`: live team workload and per-agent historical performance
//! - `workflow`: the classify → route → assign state derived from a ticket

#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod model;
pub mod validate;
pub mod workflow;

// Re-export key model types
pub use model::{
    AssignmentMetric, AssignmentResult, Availability, ClassificationResult, MemberRole,
    MemberStatus, Profile, ProfileRole, ResolutionRecord, RoutingMetric, RoutingResult, Team,
    TeamMember, Ticket, TicketCategory, TicketPriority, TicketStatus,
};

// Re-export aggregation types
pub use aggregate::{AgentInfo, HistoricalPerformance, TeamInfo, TeamSummary};

// Re-export validation entry points
pub use validate::{
    validate_assignment, validate_classification, validate_routing, Candidate, ValidationError,
};

// Re-export workflow types
pub use workflow::{IllegalTransition, Stage, TriageState};

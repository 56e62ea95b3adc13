//! Domain rows and stage result types shared by the validator, the
//! aggregators and the agent crate.

pub mod results;
pub mod types;

pub use results::{
    AssignmentMetric, AssignmentReply, AssignmentResult, ClassificationReply,
    ClassificationResult, RoutingMetric, RoutingReply, RoutingResult,
};
pub use types::{
    Availability, MemberRole, MemberStatus, Profile, ProfileRole, ResolutionRecord, Team,
    TeamMember, Ticket, TicketCategory, TicketPriority, TicketStatus,
};

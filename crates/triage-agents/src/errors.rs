//! Triage error taxonomy.
//!
//! Nothing in the pipeline retries on its own. Callers use `kind()` to map
//! an error to a user-facing message and `is_retriable()` to decide whether
//! re-triggering the stage is worth it.
//!
//! | Kind                        | Retriable |
//! |-----------------------------|-----------|
//! | ModelInvocationFailure      | yes       |
//! | ResponseFormatError         | yes       |
//! | ReferentialIntegrityError   | no        |
//! | RangeViolation              | no        |
//! | FormatViolation             | no        |
//! | MissingInput / NoCandidates | no        |
//! | Storage / Workflow / Config | no        |

use std::fmt;

use coordination::{IllegalTransition, Stage, ValidationError};
use thiserror::Error;

use crate::state_machine::IllegalStageTransition;
use crate::store::StoreError;

/// Coarse classification of a triage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingInput,
    NoCandidates,
    ModelInvocationFailure,
    ResponseFormatError,
    ReferentialIntegrityError,
    RangeViolation,
    FormatViolation,
    Storage,
    Workflow,
    Configuration,
}

impl ErrorKind {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::ModelInvocationFailure | Self::ResponseFormatError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingInput => "missing_input",
            Self::NoCandidates => "no_candidates",
            Self::ModelInvocationFailure => "model_invocation_failure",
            Self::ResponseFormatError => "response_format_error",
            Self::ReferentialIntegrityError => "referential_integrity_error",
            Self::RangeViolation => "range_violation",
            Self::FormatViolation => "format_violation",
            Self::Storage => "storage",
            Self::Workflow => "workflow",
            Self::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Unified error type for every triage operation.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Required request fields are absent or too short.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// No team or agent to choose from.
    #[error("No candidates: {0}")]
    NoCandidates(String),

    /// The model endpoint failed (network, provider, or empty reply).
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    /// The model replied but the reply did not validate.
    #[error("Failed to parse {stage} response: {source}")]
    Validation {
        stage: Stage,
        #[source]
        source: ValidationError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// An executor drove its stage machine out of order.
    #[error(transparent)]
    StageTransition(#[from] IllegalStageTransition),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TriageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput(_) => ErrorKind::MissingInput,
            Self::NoCandidates(_) => ErrorKind::NoCandidates,
            Self::ModelInvocation(_) => ErrorKind::ModelInvocationFailure,
            Self::Validation { source, .. } => match source {
                ValidationError::ResponseFormat(_) => ErrorKind::ResponseFormatError,
                ValidationError::ReferentialIntegrity { .. } => {
                    ErrorKind::ReferentialIntegrityError
                }
                ValidationError::RangeViolation { .. } => ErrorKind::RangeViolation,
                ValidationError::FormatViolation { .. } => ErrorKind::FormatViolation,
            },
            Self::Store(_) | Self::TicketNotFound(_) => ErrorKind::Storage,
            Self::IllegalTransition(_) | Self::StageTransition(_) => ErrorKind::Workflow,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if re-triggering the stage may succeed.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }

    pub fn validation(stage: Stage, source: ValidationError) -> Self {
        Self::Validation { stage, source }
    }
}

/// Result alias for triage operations.
pub type TriageResult<T> = Result<T, TriageError>;

//! Errors raised while checking a model reply.

/// First failed check of a reply. Checks run in a fixed order, so the
/// variant also tells the caller how far the reply got.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Not a JSON object, missing keys, or a field of the wrong JSON type.
    #[error("response format error: {0}")]
    ResponseFormat(String),

    /// The reply names a team or agent that was not offered to the model,
    /// or pairs a known id with the wrong name.
    #[error("{entity} '{id}' named '{name}' is not in the candidate set")]
    ReferentialIntegrity {
        entity: &'static str,
        id: String,
        name: String,
    },

    /// A numeric field is outside its documented range.
    #[error("{field} = {value} is out of range (expected {expected})")]
    RangeViolation {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A formatted string field does not match its pattern.
    #[error("{field} = {value:?} does not match {pattern}")]
    FormatViolation {
        field: &'static str,
        value: String,
        pattern: &'static str,
    },
}

impl ValidationError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::ResponseFormat(message.into())
    }

    pub fn range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::RangeViolation {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Result alias for reply validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

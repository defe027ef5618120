use thiserror::Error;

/// Errors surfaced before any simulation work begins.
///
/// Running out of money is not an error: an exhausted account is reported
/// through a short ledger and `SummaryAggregates::exhausted_at_month`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

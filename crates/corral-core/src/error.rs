//! Error types for the membership registry
//!
//! Every failure surfaced by the registry and the rank/host set parsers is a
//! `SystemError` variant carrying the offending rank, state or input so
//! callers can branch on kind without inspecting message text.

use corral_common::{ErrorCode, error};

use crate::service::{member::MemberState, rank::Rank};

/// Membership registry errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("member with rank {0} already exists")]
    MemberExists(Rank),

    #[error("member with rank {0} not found")]
    MemberMissing(Rank),

    #[error("invalid rank list {input:?}: {reason}")]
    InvalidRankListFormat { input: String, reason: String },

    #[error("invalid hostname {input:?}: {reason}")]
    InvalidHostFormat { input: String, reason: String },

    #[error("errored result for rank {rank} has conflicting state '{state}'")]
    ConflictingResultState { rank: Rank, state: MemberState },
}

impl SystemError {
    pub(crate) fn invalid_rank_list(input: &str, reason: impl Into<String>) -> Self {
        SystemError::InvalidRankListFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_host(input: &str, reason: impl Into<String>) -> Self {
        SystemError::InvalidHostFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Structured error code for API responses
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            SystemError::MemberExists(_) => error::MEMBER_EXISTS,
            SystemError::MemberMissing(_) => error::MEMBER_MISSING,
            SystemError::InvalidRankListFormat { .. } => error::INVALID_RANK_LIST,
            SystemError::InvalidHostFormat { .. } => error::INVALID_HOST_LIST,
            SystemError::ConflictingResultState { .. } => error::CONFLICTING_RESULT_STATE,
        }
    }

    /// Whether the error reports a member that is already registered
    pub fn is_member_exists(&self) -> bool {
        matches!(self, SystemError::MemberExists(_))
    }

    /// Whether the error reports a member that is not registered
    pub fn is_member_missing(&self) -> bool {
        matches!(self, SystemError::MemberMissing(_))
    }
}

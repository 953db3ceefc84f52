//! Error codes for Corral
//!
//! Every typed error surfaced by the membership registry maps to one of the
//! `ErrorCode` constants below, so collaborators can report a stable numeric
//! code alongside the human readable message.

use serde::{Deserialize, Serialize};

/// Error code structure for API responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

// Membership errors
pub const MEMBER_EXISTS: ErrorCode<'static> = ErrorCode {
    code: 23010,
    message: "member already exists",
};

pub const MEMBER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 23011,
    message: "member not found",
};

pub const INVALID_RANK_LIST: ErrorCode<'static> = ErrorCode {
    code: 23012,
    message: "invalid rank list format",
};

pub const INVALID_HOST_LIST: ErrorCode<'static> = ErrorCode {
    code: 23013,
    message: "invalid host list format",
};

pub const CONFLICTING_RESULT_STATE: ErrorCode<'static> = ErrorCode {
    code: 23014,
    message: "conflicting result state",
};

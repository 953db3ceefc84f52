//! Corral Core - Cluster membership registry
//!
//! This crate provides:
//! - Rank and rank set parsing with compact range notation
//! - Host set expansion and collapse of bracketed host patterns
//! - The rank-indexed member registry and its queries
//! - Merging of per-rank operation results into member state
//! - Member change events for listeners and subscribers

pub mod error;
pub mod model;
pub mod service;

// Re-export membership module
pub mod system {
    pub use crate::service::{
        host_set::{Host, HostSet},
        member::{Member, MemberResult, MemberResults, MemberState, Members},
        member_event::{
            LoggingMemberChangeListener, MemberChangeEvent, MemberChangeListener,
            MemberChangeType,
        },
        membership::{Membership, MembershipConfig, system_resolver},
        rank::{Rank, RankSet},
    };
}

// Re-export commonly used types
pub use error::SystemError;
pub use model::Configuration;
pub use service::Membership;

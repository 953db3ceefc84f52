// Core services for cluster membership tracking

pub mod host_set;
pub mod member;
pub mod member_event;
pub mod membership;
pub mod rank;

// Re-export commonly used types
pub use membership::Membership;

//! Corral Common - Shared types, error codes, and utilities
//!
//! This crate provides the foundational pieces used across Corral components:
//! - Structured error codes
//! - Host name validation helpers
//! - Collection newtype macros
//! - Common constants

pub mod error;
pub mod macros;
pub mod utils;

// Re-exports for convenience
pub use error::ErrorCode;
pub use utils::{is_ipv4_literal, is_valid_hostname};

/// Network name passed to host resolvers
pub const NETWORK_TCP: &str = "tcp";

/// Upper bound on hosts produced by expanding a single host pattern
pub const DEFAULT_MAX_HOST_EXPANSION: usize = 1 << 16;

/// Default capacity of the member change event channel
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 1024;

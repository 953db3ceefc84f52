//! Utility functions for Corral
//!
//! Host name validation helpers shared by the host set parser.

use std::{net::Ipv4Addr, sync::LazyLock};

/// Regex pattern for a single RFC 1123 host name label
static LABEL_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new("^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$")
        .expect("Invalid regex pattern")
});

const MAX_HOSTNAME_LEN: usize = 253;

/// Check whether a string is a dotted-quad IPv4 literal
///
/// # Examples
///
/// ```
/// use corral_common::is_ipv4_literal;
///
/// assert!(is_ipv4_literal("127.0.0.1"));
/// assert!(!is_ipv4_literal("127.0.0.256"));
/// assert!(!is_ipv4_literal("foo-1"));
/// ```
pub fn is_ipv4_literal(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Validate a host name or IPv4 literal
///
/// Names made up only of digits and dots must be IPv4 literals; anything
/// else must be a sequence of RFC 1123 labels.
///
/// # Examples
///
/// ```
/// use corral_common::is_valid_hostname;
///
/// assert!(is_valid_hostname("foo-1"));
/// assert!(is_valid_hostname("node3.cluster.local"));
/// assert!(is_valid_hostname("10.0.0.1"));
/// assert!(!is_valid_hostname("123"));
/// assert!(!is_valid_hostname("-foo"));
/// assert!(!is_valid_hostname("foo_bar"));
/// ```
pub fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    if s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return is_ipv4_literal(s);
    }

    s.split('.').all(|label| LABEL_PATTERN.is_match(label))
}

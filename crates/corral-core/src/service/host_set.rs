// Host sets with bracket range notation
// "foo-[1-3]:10001" expands to foo-1:10001, foo-2:10001 and foo-3:10001, and
// a set of hosts collapses back into the shortest such string

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde_with::{DeserializeFromStr, SerializeDisplay};

use corral_common::{DEFAULT_MAX_HOST_EXPANSION, is_valid_hostname};

use crate::error::SystemError;

use super::rank::format_runs;

/// A host name or IPv4 literal with an optional port
///
/// The name is held split into a non-numeric prefix and a numeric suffix so
/// hosts sharing a prefix can be collapsed into one bracket range. Names whose
/// trailing digits carry leading zeros are kept whole.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Host {
    prefix: String,
    suffix: Option<u32>,
    port: Option<u16>,
}

impl Host {
    pub fn new(name: &str, port: Option<u16>) -> Self {
        let (prefix, suffix) = split_numeric_suffix(name);
        Self {
            prefix: prefix.to_string(),
            suffix,
            port,
        }
    }

    /// Host name without the port
    pub fn name(&self) -> String {
        match self.suffix {
            Some(n) => format!("{}{}", self.prefix, n),
            None => self.prefix.clone(),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Explicit port, or `default_port` when none was given
    pub fn effective_port(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }

    /// `name:port` using the effective port
    pub fn address(&self, default_port: u16) -> String {
        format!("{}:{}", self.name(), self.effective_port(default_port))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.name(), port),
            None => write!(f, "{}", self.name()),
        }
    }
}

impl FromStr for Host {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let set = HostSet::parse(s)?;
        let mut hosts = set.hosts.into_iter();
        match (hosts.next(), hosts.next()) {
            (Some(host), None) => Ok(host),
            _ => Err(SystemError::invalid_host(s, "expected exactly one host")),
        }
    }
}

fn split_numeric_suffix(name: &str) -> (&str, Option<u32>) {
    let digits = name
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return (name, None);
    }

    let (prefix, tail) = name.split_at(name.len() - digits);
    if tail.len() > 1 && tail.starts_with('0') {
        return (name, None);
    }

    match tail.parse::<u32>() {
        Ok(n) => (prefix, Some(n)),
        Err(_) => (name, None),
    }
}

/// Set of distinct hosts with compact bracket notation
#[derive(Clone, Debug, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct HostSet {
    hosts: BTreeSet<Host>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and expand a comma separated host pattern list
    pub fn parse(s: &str) -> Result<Self, SystemError> {
        Self::parse_with_limit(s, DEFAULT_MAX_HOST_EXPANSION)
    }

    /// Parse a host pattern list, failing if it expands to more than `limit` hosts
    pub fn parse_with_limit(s: &str, limit: usize) -> Result<Self, SystemError> {
        let input = s.trim();
        let mut set = HostSet::new();
        if input.is_empty() {
            return Ok(set);
        }

        for token in split_tokens(input)? {
            for host in expand_token(token.trim(), limit)? {
                set.insert(host);
            }
            if set.len() > limit {
                return Err(SystemError::invalid_host(
                    input,
                    format!("pattern expands to more than {} hosts", limit),
                ));
            }
        }

        Ok(set)
    }

    pub fn insert(&mut self, host: Host) -> bool {
        self.hosts.insert(host)
    }

    pub fn contains(&self, host: &Host) -> bool {
        self.hosts.contains(host)
    }

    /// Hosts ordered by prefix, numeric suffix and port
    pub fn hosts(&self) -> Vec<Host> {
        self.hosts.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> + '_ {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Split on commas outside of bracket groups
fn split_tokens(input: &str) -> Result<Vec<&str>, SystemError> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '[' if depth > 0 => {
                return Err(SystemError::invalid_host(input, "nested brackets"));
            }
            '[' => depth += 1,
            ']' if depth == 0 => {
                return Err(SystemError::invalid_host(input, "unmatched ']'"));
            }
            ']' => depth -= 1,
            ',' if depth == 0 => {
                tokens.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SystemError::invalid_host(input, "unclosed '['"));
    }
    tokens.push(&input[start..]);

    if tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(SystemError::invalid_host(input, "empty host token"));
    }

    Ok(tokens)
}

/// Expand one `name[:port]` token, where name may end in a bracket group
fn expand_token(token: &str, limit: usize) -> Result<Vec<Host>, SystemError> {
    let bracket_end = token.rfind(']').map_or(0, |i| i + 1);
    let (name_part, port) = match token[bracket_end..].rfind(':') {
        Some(i) => {
            let colon = bracket_end + i;
            (&token[..colon], Some(parse_port(token, &token[colon + 1..])?))
        }
        None => (token, None),
    };

    let names = match name_part.find('[') {
        None => vec![name_part.to_string()],
        Some(open) => {
            if !name_part.ends_with(']') || name_part[..open].contains(']') {
                return Err(SystemError::invalid_host(
                    token,
                    "bracket range must end the host name",
                ));
            }
            let prefix = &name_part[..open];
            let body = &name_part[open + 1..name_part.len() - 1];
            parse_bracket_list(token, body, limit)?
                .into_iter()
                .map(|n| format!("{}{}", prefix, n))
                .collect()
        }
    };

    names
        .iter()
        .map(|name| {
            if is_valid_hostname(name) {
                Ok(Host::new(name, port))
            } else {
                Err(SystemError::invalid_host(
                    name,
                    "not a valid host name or IPv4 address",
                ))
            }
        })
        .collect()
}

fn parse_port(token: &str, port: &str) -> Result<u16, SystemError> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SystemError::invalid_host(
            token,
            format!("invalid port {:?}", port),
        ));
    }
    port.parse::<u16>()
        .map_err(|e| SystemError::invalid_host(token, format!("invalid port {:?}: {}", port, e)))
}

/// Parse the inside of a bracket group, e.g. "1-2,5"
fn parse_bracket_list(token: &str, body: &str, limit: usize) -> Result<Vec<u32>, SystemError> {
    let mut values = Vec::new();

    for item in body.split(',') {
        let (lo, hi) = match item.split_once('-') {
            Some((lo, hi)) => (
                parse_bracket_number(token, lo)?,
                parse_bracket_number(token, hi)?,
            ),
            None => {
                let n = parse_bracket_number(token, item)?;
                (n, n)
            }
        };

        if lo > hi {
            return Err(SystemError::invalid_host(
                token,
                format!("range start {} greater than end {}", lo, hi),
            ));
        }
        if (hi - lo) as usize >= limit.saturating_sub(values.len()) {
            return Err(SystemError::invalid_host(
                token,
                format!("pattern expands to more than {} hosts", limit),
            ));
        }
        values.extend(lo..=hi);
    }

    Ok(values)
}

fn parse_bracket_number(token: &str, s: &str) -> Result<u32, SystemError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SystemError::invalid_host(
            token,
            format!("invalid range value {:?}", s),
        ));
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(SystemError::invalid_host(
            token,
            format!("zero-padded range value {:?}", s),
        ));
    }
    s.parse::<u32>().map_err(|e| {
        SystemError::invalid_host(token, format!("invalid range value {:?}: {}", s, e))
    })
}

impl FromStr for HostSet {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostSet::parse(s)
    }
}

impl FromIterator<Host> for HostSet {
    fn from_iter<I: IntoIterator<Item = Host>>(iter: I) -> Self {
        Self {
            hosts: iter.into_iter().collect(),
        }
    }
}

impl Extend<Host> for HostSet {
    fn extend<I: IntoIterator<Item = Host>>(&mut self, iter: I) {
        self.hosts.extend(iter);
    }
}

impl fmt::Display for HostSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // (prefix, port) -> ascending suffixes
        let mut groups: BTreeMap<(&str, Option<u16>), Vec<u32>> = BTreeMap::new();
        let mut entries: Vec<(Option<u32>, &str, Option<u16>, String)> = Vec::new();

        for host in &self.hosts {
            match host.suffix {
                Some(n) => groups
                    .entry((host.prefix.as_str(), host.port))
                    .or_default()
                    .push(n),
                None => entries.push((None, host.prefix.as_str(), host.port, host.to_string())),
            }
        }

        for ((prefix, port), values) in groups {
            let name = match values.as_slice() {
                [single] => format!("{}{}", prefix, single),
                _ => format!("{}[{}]", prefix, format_runs(&values)),
            };
            let rendered = match port {
                Some(port) => format!("{}:{}", name, port),
                None => name,
            };
            entries.push((values.first().copied(), prefix, port, rendered));
        }

        entries.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        let rendered: Vec<String> = entries.into_iter().map(|e| e.3).collect();
        f.write_str(&rendered.join(","))
    }
}

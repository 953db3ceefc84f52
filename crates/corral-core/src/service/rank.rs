// Rank identity and compact rank sets
// Ranks are rendered and parsed in range notation, e.g. "0-3,5,7-9"

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::SystemError;

/// Identity of a cluster member, unique within a membership
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rank(pub u32);

impl Rank {
    pub const fn new(rank: u32) -> Self {
        Self(rank)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Rank {
    fn from(rank: u32) -> Self {
        Rank(rank)
    }
}

impl From<Rank> for u32 {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Rank {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rank(s, s)
    }
}

fn parse_rank(token: &str, input: &str) -> Result<Rank, SystemError> {
    if token.is_empty() {
        return Err(SystemError::invalid_rank_list(input, "missing rank number"));
    }
    token
        .parse::<u32>()
        .map(Rank)
        .map_err(|e| SystemError::invalid_rank_list(input, format!("rank {:?}: {}", token, e)))
}

/// Set of ranks with compact range notation
///
/// Ranks are held as disjoint, non-adjacent inclusive runs, so a range such
/// as "0-4294967295" costs one entry. The empty set renders as an empty
/// string. Callers treat an empty set as "no restriction" when filtering
/// membership queries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct RankSet {
    // run start -> run end (inclusive)
    runs: BTreeMap<u32, u32>,
}

impl RankSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list of ranks and inclusive `a-b` ranges
    pub fn parse(s: &str) -> Result<Self, SystemError> {
        let input = s.trim();
        let mut set = RankSet::new();
        if input.is_empty() {
            return Ok(set);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_digit() || *c == '-' || *c == ','))
        {
            let reason = if c.is_alphabetic() {
                "unexpected alphabetic character(s)".to_string()
            } else {
                format!("unexpected character {:?}", c)
            };
            return Err(SystemError::invalid_rank_list(input, reason));
        }

        for token in input.split(',') {
            match token.split_once('-') {
                None => {
                    set.insert(parse_rank(token, input)?);
                }
                Some((lo, hi)) => {
                    let lo = parse_rank(lo, input)?;
                    let hi = parse_rank(hi, input)?;
                    if lo > hi {
                        return Err(SystemError::invalid_rank_list(
                            input,
                            format!("range start {} greater than end {}", lo, hi),
                        ));
                    }
                    set.insert_range(lo.0, hi.0);
                }
            }
        }

        Ok(set)
    }

    pub fn insert(&mut self, rank: Rank) -> bool {
        self.insert_range(rank.0, rank.0)
    }

    /// Insert the inclusive range `lo..=hi`, merging touching runs
    ///
    /// Returns false when every rank in the range was already present.
    fn insert_range(&mut self, lo: u32, hi: u32) -> bool {
        let mut start = lo;
        let mut end = hi;

        if let Some((&s, &e)) = self.runs.range(..=lo).next_back() {
            if e >= hi {
                return false;
            }
            if u64::from(e) + 1 >= u64::from(lo) {
                start = s;
            }
        }

        let absorbed: Vec<(u32, u32)> = self
            .runs
            .range(start..)
            .take_while(|&(&s, _)| u64::from(s) <= u64::from(end) + 1)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in absorbed {
            self.runs.remove(&s);
            end = end.max(e);
        }

        self.runs.insert(start, end);
        true
    }

    pub fn contains(&self, rank: Rank) -> bool {
        self.runs
            .range(..=rank.0)
            .next_back()
            .is_some_and(|(_, &end)| end >= rank.0)
    }

    /// Ranks in ascending order
    pub fn ranks(&self) -> Vec<Rank> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Rank> + '_ {
        self.runs
            .iter()
            .flat_map(|(&start, &end)| (start..=end).map(Rank))
    }

    pub fn len(&self) -> usize {
        let total: u64 = self
            .runs
            .iter()
            .map(|(&start, &end)| u64::from(end - start) + 1)
            .sum();
        usize::try_from(total).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Runs overlapping `start..=end`, in ascending order
    fn overlapping(&self, start: u32, end: u32) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = self
            .runs
            .range(..=end)
            .rev()
            .take_while(|&(_, &e)| e >= start)
            .map(|(&s, &e)| (s, e))
            .collect();
        runs.reverse();
        runs
    }

    pub fn intersection(&self, other: &RankSet) -> RankSet {
        let mut out = RankSet::new();
        for (&start, &end) in &self.runs {
            for (s, e) in other.overlapping(start, end) {
                out.insert_range(start.max(s), end.min(e));
            }
        }
        out
    }

    pub fn difference(&self, other: &RankSet) -> RankSet {
        let mut out = RankSet::new();
        for (&start, &end) in &self.runs {
            let mut cursor = u64::from(start);
            for (s, e) in other.overlapping(start, end) {
                if u64::from(s) > cursor {
                    out.insert_range(cursor as u32, s - 1);
                }
                cursor = u64::from(e) + 1;
            }
            if cursor <= u64::from(end) {
                out.insert_range(cursor as u32, end);
            }
        }
        out
    }
}

impl FromStr for RankSet {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankSet::parse(s)
    }
}

impl FromIterator<Rank> for RankSet {
    fn from_iter<I: IntoIterator<Item = Rank>>(iter: I) -> Self {
        let mut set = RankSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Rank> for RankSet {
    fn extend<I: IntoIterator<Item = Rank>>(&mut self, iter: I) {
        for rank in iter {
            self.insert(rank);
        }
    }
}

impl fmt::Display for RankSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runs: Vec<String> = self
            .runs
            .iter()
            .map(|(&start, &end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{}-{}", start, end)
                }
            })
            .collect();
        f.write_str(&runs.join(","))
    }
}

/// Render ascending, distinct values as comma separated runs ("1-3,5")
pub(crate) fn format_runs(values: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = values.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if end.checked_add(1) != Some(next) {
                break;
            }
            end = next;
            iter.next();
        }

        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }

    parts.join(",")
}

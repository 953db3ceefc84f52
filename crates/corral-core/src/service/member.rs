// Member records, lifecycle states and per-rank operation results

use std::{
    fmt::{Display, Formatter},
    net::SocketAddr,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use corral_common::impl_vec_newtype;

use super::rank::Rank;

/// Lifecycle state of a storage engine member
///
/// Variants are declared in display order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum MemberState {
    #[default]
    Unknown,
    AwaitFormat,
    Starting,
    Ready,
    Joined,
    Stopping,
    Stopped,
    Evicted,
    Errored,
    Unresponsive,
}

impl MemberState {
    pub const ALL: [MemberState; 10] = [
        MemberState::Unknown,
        MemberState::AwaitFormat,
        MemberState::Starting,
        MemberState::Ready,
        MemberState::Joined,
        MemberState::Stopping,
        MemberState::Stopped,
        MemberState::Evicted,
        MemberState::Errored,
        MemberState::Unresponsive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberState::Unknown => "Unknown",
            MemberState::AwaitFormat => "AwaitFormat",
            MemberState::Starting => "Starting",
            MemberState::Ready => "Ready",
            MemberState::Joined => "Joined",
            MemberState::Stopping => "Stopping",
            MemberState::Stopped => "Stopped",
            MemberState::Evicted => "Evicted",
            MemberState::Errored => "Errored",
            MemberState::Unresponsive => "Unresponsive",
        }
    }

    /// Position in the Starting -> Ready -> Joined boot sequence
    pub fn progression_position(&self) -> Option<u8> {
        match self {
            MemberState::Starting => Some(0),
            MemberState::Ready => Some(1),
            MemberState::Joined => Some(2),
            _ => None,
        }
    }

    pub fn is_forward_progression(&self) -> bool {
        self.progression_position().is_some()
    }

    /// True when moving from `current` to `self` would walk a member backward
    /// or sideways through its boot sequence
    pub fn regresses(&self, current: MemberState) -> bool {
        match (self.progression_position(), current.progression_position()) {
            (Some(next), Some(now)) => next <= now,
            _ => false,
        }
    }
}

impl Display for MemberState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemberState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemberState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid member state: {}", s))
    }
}

/// Registry record for one rank
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub rank: Rank,
    /// Engine identity, changes across a reformat
    pub uuid: String,
    pub addr: SocketAddr,
    pub state: MemberState,
    /// Free-text reason for the current state, e.g. an exit message
    #[serde(default)]
    pub info: String,
}

impl Member {
    pub fn new(rank: Rank, uuid: impl Into<String>, addr: SocketAddr, state: MemberState) -> Self {
        Self {
            rank,
            uuid: uuid.into(),
            addr,
            state,
            info: String::new(),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rank {} ({}) at {}: {}",
            self.rank, self.uuid, self.addr, self.state
        )
    }
}

/// Ordered collection of members
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Members(Vec<Member>);

impl_vec_newtype!(Members, Member);

impl Members {
    pub fn ranks(&self) -> Vec<Rank> {
        self.0.iter().map(|m| m.rank).collect()
    }
}

/// Outcome of one operation issued against one rank
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResult {
    pub rank: Rank,
    /// Reported host address, back-filled from the member when empty
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub msg: String,
    pub state: MemberState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemberResult {
    pub fn new(rank: Rank, state: MemberState) -> Self {
        Self {
            rank,
            state,
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

/// Batch of operation results merged together
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberResults(Vec<MemberResult>);

impl_vec_newtype!(MemberResults, MemberResult);

impl MemberResults {
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(MemberResult::is_errored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_member_state_stringify() {
        let strs = [
            "Unknown",
            "AwaitFormat",
            "Starting",
            "Ready",
            "Joined",
            "Stopping",
            "Stopped",
            "Evicted",
            "Errored",
            "Unresponsive",
        ];

        for (state, expected) in MemberState::ALL.iter().zip(strs) {
            assert_eq!(state.to_string(), expected);
            assert_eq!(expected.parse::<MemberState>().unwrap(), *state);
        }
    }

    #[test]
    fn test_member_state_display_order() {
        let mut sorted = MemberState::ALL;
        sorted.sort();
        assert_eq!(sorted, MemberState::ALL);
        assert!(MemberState::Unknown < MemberState::Unresponsive);
    }

    #[test]
    fn test_member_state_parse() {
        assert_eq!(
            "joined".parse::<MemberState>().unwrap(),
            MemberState::Joined
        );
        assert!("Running".parse::<MemberState>().is_err());
        assert_eq!(MemberState::default(), MemberState::Unknown);
    }

    #[test]
    fn test_progression_chain() {
        assert_eq!(MemberState::Starting.progression_position(), Some(0));
        assert_eq!(MemberState::Ready.progression_position(), Some(1));
        assert_eq!(MemberState::Joined.progression_position(), Some(2));
        assert!(!MemberState::Stopped.is_forward_progression());

        assert!(MemberState::Ready.regresses(MemberState::Joined));
        assert!(MemberState::Joined.regresses(MemberState::Joined));
        assert!(!MemberState::Joined.regresses(MemberState::Ready));
        assert!(!MemberState::Ready.regresses(MemberState::Stopped));
        assert!(!MemberState::Stopped.regresses(MemberState::Joined));
    }

    #[test]
    fn test_member_display() {
        let member = Member::new(
            Rank(1),
            "abc",
            addr("127.0.0.1:10001"),
            MemberState::Joined,
        );
        assert_eq!(member.to_string(), "rank 1 (abc) at 127.0.0.1:10001: Joined");
    }

    #[test]
    fn test_members_convert() {
        let members_in: Members = vec![
            Member::new(
                Rank(1),
                "uuid-1",
                addr("127.0.0.1:10001"),
                MemberState::Joined,
            )
            .with_info("ok"),
        ]
        .into();

        let json = serde_json::to_string(&members_in).unwrap();
        let members_out: Members = serde_json::from_str(&json).unwrap();
        assert_eq!(members_in, members_out);
        assert_eq!(members_out.ranks(), vec![Rank(1)]);
    }

    #[test]
    fn test_member_results_convert() {
        let results_in: MemberResults = vec![
            MemberResult::new(Rank(1), MemberState::Stopped),
            MemberResult::new(Rank(2), MemberState::Unknown).with_error("can't stop"),
            MemberResult::new(Rank(1), MemberState::Errored)
                .with_msg("ping")
                .with_error("foobar"),
        ]
        .into();
        let empty = MemberResults::new();

        assert!(results_in.has_errors());
        assert!(!empty.has_errors());

        let json = serde_json::to_string(&results_in).unwrap();
        let results_out: MemberResults = serde_json::from_str(&json).unwrap();
        assert_eq!(results_in, results_out);
    }

    #[test]
    fn test_member_result_builders() {
        let result = MemberResult::new(Rank(4), MemberState::Ready)
            .with_addr("10.0.0.1:10001")
            .with_msg("started");
        assert_eq!(result.addr, "10.0.0.1:10001");
        assert_eq!(result.msg, "started");
        assert!(!result.is_errored());
        assert!(result.clone().with_error("x").is_errored());
    }
}

// Integration tests for Membership
// Tests registry consistency, selection queries and concurrent access

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use config::Config;
use corral_core::{
    Configuration, SystemError,
    system::{
        HostSet, Member, MemberChangeEvent, MemberChangeListener, MemberChangeType, MemberResult,
        MemberResults, MemberState, Membership, MembershipConfig, Rank, RankSet,
    },
};
use proptest::prelude::*;

fn member(rank: u32, octet: u8, state: MemberState) -> Member {
    Member::new(
        Rank(rank),
        format!("uuid-{}", rank),
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet)), 10001),
        state,
    )
}

fn resolve_literal(_network: &str, address: &str) -> Result<IpAddr, String> {
    address
        .parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .map_err(|e| e.to_string())
}

#[test]
fn test_membership_lifecycle() {
    let ms = Membership::new();
    assert!(ms.is_empty());

    // Two ranks per host
    for rank in 0..8 {
        ms.add(member(rank, (rank / 2) as u8 + 1, MemberState::Ready))
            .unwrap();
    }
    assert_eq!(ms.len(), 8);
    assert_eq!(ms.host_list(&RankSet::new()).len(), 4);

    // Boot sequence completes for every rank
    let mut results: MemberResults = (0..8)
        .map(|rank| MemberResult::new(Rank(rank), MemberState::Joined))
        .collect();
    ms.update_member_states(&mut results, false).unwrap();
    assert!(
        ms.members(&RankSet::new())
            .iter()
            .all(|m| m.state == MemberState::Joined)
    );
    assert_eq!(results[7].addr, "10.0.0.4:10001");

    // Stop the ranks on one host
    let (hit, missing) = ms
        .check_hosts("10.0.0.2", 10001, resolve_literal)
        .unwrap();
    assert_eq!(hit.to_string(), "2-3");
    assert!(missing.is_empty());

    let mut results: MemberResults = hit
        .iter()
        .map(|rank| MemberResult::new(rank, MemberState::Stopped).with_msg("shutdown"))
        .collect();
    ms.update_member_states(&mut results, true).unwrap();

    let stopped = ms.members(&"2-3".parse().unwrap());
    assert!(stopped.iter().all(|m| m.state == MemberState::Stopped));
    assert!(stopped.iter().all(|m| m.info == "shutdown"));

    // Decommission the host
    for rank in hit.iter() {
        assert!(ms.remove(rank).is_some());
    }
    let (hit, missing) = ms
        .check_hosts("10.0.0.[1-2]", 10001, resolve_literal)
        .unwrap();
    assert_eq!(hit.to_string(), "0-1");
    assert_eq!(missing.to_string(), "10.0.0.2");

    let (_, missing_ranks) = ms.check_ranks("0-7").unwrap();
    assert_eq!(missing_ranks.to_string(), "2-3");
}

#[test]
fn test_check_ranks_partition() {
    let ms = Membership::new();
    for rank in [0, 1, 2, 5, 9] {
        ms.add(member(rank, 1, MemberState::Joined)).unwrap();
    }

    let requested: RankSet = "0-5,8-10".parse().unwrap();
    let (hit, missing) = ms.check_ranks(&requested.to_string()).unwrap();

    assert_eq!(hit.to_string(), "0-2,5,9");
    assert_eq!(missing.to_string(), "3-4,8,10");
    assert!(hit.intersection(&missing).is_empty());
    assert_eq!(hit.len() + missing.len(), requested.len());
}

#[test]
fn test_check_hosts_with_system_resolver() {
    let ms = Membership::new();
    ms.add(Member::new(
        Rank(0),
        "uuid-0",
        "127.0.0.1:10001".parse().unwrap(),
        MemberState::Joined,
    ))
    .unwrap();

    let (hit, missing) = ms
        .check_hosts(
            "127.0.0.1,127.0.0.1:10002",
            10001,
            corral_core::system::system_resolver,
        )
        .unwrap();

    assert_eq!(hit.to_string(), "0");
    assert_eq!(missing.to_string(), "127.0.0.1:10002");
}

#[test]
fn test_invalid_selections() {
    let ms = Membership::new();

    let err = ms.check_ranks("1-").unwrap_err();
    assert!(matches!(err, SystemError::InvalidRankListFormat { .. }));

    let err = ms
        .check_hosts("node[1-3", 10001, resolve_literal)
        .unwrap_err();
    assert!(matches!(err, SystemError::InvalidHostFormat { .. }));
}

#[test]
fn test_membership_from_configuration() {
    let config = Config::builder()
        .set_default("corral.membership.max-host-expansion", 4)
        .unwrap()
        .build()
        .unwrap();
    let configuration = Configuration::from_config(config);

    let ms = Membership::with_config(MembershipConfig::from_configuration(&configuration));
    assert_eq!(ms.config().max_host_expansion, 4);

    assert!(ms.check_hosts("node[1-4]", 10001, resolve_literal).is_ok());
    assert!(matches!(
        ms.check_hosts("node[1-5]", 10001, resolve_literal),
        Err(SystemError::InvalidHostFormat { .. })
    ));
}

struct RecordingListener {
    events: parking_lot::Mutex<Vec<MemberChangeType>>,
}

impl MemberChangeListener for RecordingListener {
    fn on_member_change(&self, event: &MemberChangeEvent) {
        self.events.lock().push(event.change_type);
    }
}

#[test]
fn test_listener_sees_committed_changes() {
    let ms = Membership::new();
    let listener = Arc::new(RecordingListener {
        events: parking_lot::Mutex::new(Vec::new()),
    });
    ms.register_listener(listener.clone());

    ms.add(member(1, 1, MemberState::Starting)).unwrap();
    assert!(ms.add(member(1, 1, MemberState::Starting)).is_err());

    // Ready then a stale Starting; only the first changes state
    let mut results: MemberResults = vec![
        MemberResult::new(Rank(1), MemberState::Ready),
        MemberResult::new(Rank(1), MemberState::Starting),
    ]
    .into();
    ms.update_member_states(&mut results, true).unwrap();

    // Rejected batch publishes nothing
    let mut results: MemberResults =
        vec![MemberResult::new(Rank(1), MemberState::Ready).with_error("boom")].into();
    assert!(ms.update_member_states(&mut results, true).is_err());

    ms.remove(Rank(1));

    assert_eq!(
        *listener.events.lock(),
        vec![
            MemberChangeType::MemberJoin,
            MemberChangeType::MemberStateChange,
            MemberChangeType::MemberLeave,
        ]
    );
}

#[test]
fn test_concurrent_access() {
    let ms = Membership::new();
    let adds = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        // Writers race to add overlapping ranks
        for worker in 0..4u32 {
            let ms = ms.clone();
            let adds = adds.clone();
            s.spawn(move || {
                for rank in 0..64u32 {
                    let octet = (rank % 16) as u8 + 1;
                    if ms.add(member(rank, octet, MemberState::Ready)).is_ok() {
                        adds.fetch_add(1, Ordering::SeqCst);
                    }
                    if rank % 4 == worker {
                        let mut results: MemberResults =
                            vec![MemberResult::new(Rank(rank), MemberState::Joined)].into();
                        ms.update_member_states(&mut results, true).unwrap();
                    }
                }
            });
        }

        // Readers observe a consistent registry throughout
        for _ in 0..2 {
            let ms = ms.clone();
            s.spawn(move || {
                for _ in 0..64 {
                    let members = ms.members(&RankSet::new());
                    let host_ranks = ms.host_ranks(&RankSet::new());
                    let total: usize = host_ranks.values().map(Vec::len).sum();
                    assert!(total <= 64);
                    assert!(members.len() <= 64);
                    let (hit, missing) = ms.check_ranks("0-63").unwrap();
                    assert_eq!(hit.len() + missing.len(), 64);
                }
            });
        }
    });

    // Each rank was added exactly once
    assert_eq!(adds.load(Ordering::SeqCst), 64);
    assert_eq!(ms.len(), 64);

    let host_ranks = ms.host_ranks(&RankSet::new());
    assert_eq!(host_ranks.len(), 16);
    assert!(host_ranks.values().all(|ranks| ranks.len() == 4));
}

#[test]
fn test_subscribers_see_commit_order() {
    let ms = Membership::with_config(MembershipConfig {
        event_queue_size: 4096,
        ..Default::default()
    });
    let mut rx = ms.subscribe();

    // Writers race to add and remove the same rank
    thread::scope(|s| {
        for _ in 0..4 {
            let ms = ms.clone();
            s.spawn(move || {
                for _ in 0..200 {
                    let _ = ms.add(member(0, 1, MemberState::Joined));
                    ms.remove(Rank(0));
                }
            });
        }
    });

    let mut present = false;
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        match event.change_type {
            MemberChangeType::MemberJoin => assert!(!present, "join while present"),
            MemberChangeType::MemberLeave => assert!(present, "leave while absent"),
            other => panic!("unexpected event {}", other),
        }
        present = !present;
        count += 1;
    }

    assert!(count > 0);
    assert_eq!(present, ms.get(Rank(0)).is_ok());
}

#[test]
fn test_selection_sets_serde() {
    let ranks: RankSet = "0-3,7".parse().unwrap();
    let hosts: HostSet = "node[1-3]:10001,node5:10001".parse().unwrap();

    assert_eq!(serde_json::to_string(&ranks).unwrap(), "\"0-3,7\"");
    assert_eq!(
        serde_json::to_string(&hosts).unwrap(),
        "\"node[1-3,5]:10001\""
    );

    let ranks_out: RankSet = serde_json::from_str("\"7,0-3\"").unwrap();
    assert_eq!(ranks_out, ranks);
    assert!(serde_json::from_str::<RankSet>("\"3-1\"").is_err());
}

proptest! {
    #[test]
    fn prop_check_ranks_partitions_request(
        known in proptest::collection::btree_set(0u32..200, 0..40),
        requested in proptest::collection::btree_set(0u32..200, 1..40),
    ) {
        let ms = Membership::new();
        for rank in &known {
            ms.add(member(*rank, 1, MemberState::Joined)).unwrap();
        }

        let request: RankSet = requested.iter().copied().map(Rank).collect();
        let (hit, missing) = ms.check_ranks(&request.to_string()).unwrap();

        prop_assert!(hit.intersection(&missing).is_empty());
        prop_assert_eq!(hit.len() + missing.len(), request.len());
        for rank in hit.iter() {
            prop_assert!(known.contains(&rank.get()));
        }
        for rank in missing.iter() {
            prop_assert!(!known.contains(&rank.get()));
        }
    }
}

// Cluster membership registry
// Tracks every member by rank, resolves rank and host selections, and merges
// operation results back into member state

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    sync::Arc,
};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use corral_common::{DEFAULT_EVENT_QUEUE_SIZE, DEFAULT_MAX_HOST_EXPANSION, NETWORK_TCP};

use crate::{error::SystemError, model::Configuration};

use super::{
    host_set::{Host, HostSet},
    member::{Member, MemberResults, MemberState, Members},
    member_event::{MemberChangeEvent, MemberChangeEventPublisher, MemberChangeListener},
    rank::{Rank, RankSet},
};

/// Membership configuration
#[derive(Clone, Debug)]
pub struct MembershipConfig {
    /// Capacity of the member change event channel
    pub event_queue_size: usize,
    /// Maximum number of hosts a single host pattern may expand to
    pub max_host_expansion: usize,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
            max_host_expansion: DEFAULT_MAX_HOST_EXPANSION,
        }
    }
}

impl MembershipConfig {
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            event_queue_size: config.membership_event_queue_size(),
            max_host_expansion: config.membership_max_host_expansion(),
        }
    }
}

/// Rank-keyed member map plus an index of ranks by member address
#[derive(Debug, Default)]
struct Registry {
    members: BTreeMap<Rank, Member>,
    addr_index: HashMap<SocketAddr, BTreeSet<Rank>>,
}

impl Registry {
    fn insert(&mut self, member: Member) -> Option<Member> {
        let rank = member.rank;
        let addr = member.addr;
        self.addr_index.entry(addr).or_default().insert(rank);

        let previous = self.members.insert(rank, member);
        if let Some(prev) = &previous
            && prev.addr != addr
        {
            self.unindex(prev.addr, rank);
        }
        previous
    }

    fn remove(&mut self, rank: Rank) -> Option<Member> {
        let member = self.members.remove(&rank)?;
        self.unindex(member.addr, rank);
        Some(member)
    }

    fn unindex(&mut self, addr: SocketAddr, rank: Rank) {
        if let Some(ranks) = self.addr_index.get_mut(&addr) {
            ranks.remove(&rank);
            if ranks.is_empty() {
                self.addr_index.remove(&addr);
            }
        }
    }

    fn ranks_at(&self, addr: &SocketAddr) -> Vec<Rank> {
        self.addr_index
            .get(addr)
            .map(|ranks| ranks.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Members in rank order, restricted to `ranks` unless it is empty
    fn filtered<'a>(&'a self, ranks: &'a RankSet) -> impl Iterator<Item = &'a Member> + 'a {
        self.members
            .values()
            .filter(move |m| ranks.is_empty() || ranks.contains(m.rank))
    }
}

/// Cluster membership registry
///
/// Every public operation takes the registry lock once, so each call is
/// atomic with respect to every other call. Queries share read access and
/// mutations take exclusive access. Change events reach subscribers in
/// commit order; listeners run after the lock has been released.
#[derive(Clone)]
pub struct Membership {
    registry: Arc<RwLock<Registry>>,
    config: MembershipConfig,
    event_publisher: Arc<MemberChangeEventPublisher>,
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("member_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Membership {
    fn default() -> Self {
        Self::new()
    }
}

impl Membership {
    pub fn new() -> Self {
        Self::with_config(MembershipConfig::default())
    }

    pub fn with_config(config: MembershipConfig) -> Self {
        let event_publisher = Arc::new(MemberChangeEventPublisher::new(config.event_queue_size));

        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config,
            event_publisher,
        }
    }

    /// Add a new member, failing if its rank is already registered
    ///
    /// Returns the number of members after the insertion.
    pub fn add(&self, member: Member) -> Result<usize, SystemError> {
        let (count, event) = {
            let mut registry = self.registry.write();
            if registry.members.contains_key(&member.rank) {
                return Err(SystemError::MemberExists(member.rank));
            }
            registry.insert(member.clone());

            let event = MemberChangeEvent::member_join(member);
            self.event_publisher.broadcast(&event);
            (registry.members.len(), event)
        };

        info!("Adding cluster member: {}", event.member);
        self.event_publisher.notify_listeners(&event);

        Ok(count)
    }

    /// Remove the member with the given rank, if any
    pub fn remove(&self, rank: Rank) -> Option<Member> {
        let event = {
            let mut registry = self.registry.write();
            let member = registry.remove(rank)?;

            let event = MemberChangeEvent::member_leave(member);
            self.event_publisher.broadcast(&event);
            event
        };

        info!("Removing cluster member: {}", event.member);
        self.event_publisher.notify_listeners(&event);

        Some(event.member)
    }

    /// Insert a member or overwrite the existing record for its rank
    ///
    /// Used when a rank's identity legitimately changes, e.g. after a
    /// reformat. Returns the replaced record.
    pub fn add_or_replace(&self, member: Member) -> Option<Member> {
        let (previous, event) = {
            let mut registry = self.registry.write();
            let previous = registry.insert(member.clone());

            let event = match &previous {
                Some(prev) => MemberChangeEvent::member_replace(member, prev.state),
                None => MemberChangeEvent::member_join(member),
            };
            self.event_publisher.broadcast(&event);
            (previous, event)
        };

        match &previous {
            Some(prev) => info!(
                rank = %event.member.rank,
                old_uuid = %prev.uuid,
                old_addr = %prev.addr,
                "Replacing cluster member: {}",
                event.member
            ),
            None => info!("Adding cluster member: {}", event.member),
        }
        self.event_publisher.notify_listeners(&event);

        previous
    }

    /// Get a member by rank
    pub fn get(&self, rank: Rank) -> Result<Member, SystemError> {
        self.registry
            .read()
            .members
            .get(&rank)
            .cloned()
            .ok_or(SystemError::MemberMissing(rank))
    }

    /// Get member count
    pub fn len(&self) -> usize {
        self.registry.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().members.is_empty()
    }

    /// Members whose rank is in `ranks`, in rank order; an empty set selects all
    pub fn members(&self, ranks: &RankSet) -> Members {
        self.registry.read().filtered(ranks).cloned().collect()
    }

    /// All known ranks in ascending order
    pub fn rank_list(&self) -> Vec<Rank> {
        self.registry.read().members.keys().copied().collect()
    }

    /// Ranks grouped by member address; an empty set selects all members
    pub fn host_ranks(&self, ranks: &RankSet) -> BTreeMap<String, Vec<Rank>> {
        let registry = self.registry.read();
        let mut host_ranks: BTreeMap<String, Vec<Rank>> = BTreeMap::new();

        for member in registry.filtered(ranks) {
            host_ranks
                .entry(member.addr.to_string())
                .or_default()
                .push(member.rank);
        }

        host_ranks
    }

    /// Distinct member addresses, ordered like the keys of [`Membership::host_ranks`];
    /// an empty set selects all members
    pub fn host_list(&self, ranks: &RankSet) -> Vec<String> {
        self.host_ranks(ranks).into_keys().collect()
    }

    /// Split a rank list into known and unknown ranks
    ///
    /// An empty rank list selects every known rank.
    pub fn check_ranks(&self, rank_list: &str) -> Result<(RankSet, RankSet), SystemError> {
        let requested = RankSet::parse(rank_list)?;

        let registry = self.registry.read();
        let known: RankSet = registry.members.keys().copied().collect();

        if requested.is_empty() {
            return Ok((known, RankSet::new()));
        }

        Ok((requested.intersection(&known), requested.difference(&known)))
    }

    /// Resolve a host pattern into the ranks of matching members
    ///
    /// Each expanded host is resolved with `resolve("tcp", "host:port")`,
    /// using `default_port` when the host carries none. A member matches when
    /// its address equals the resolved IP and port. Hosts that fail to
    /// resolve or match no member are returned in the missing set, in the form
    /// they were supplied. The resolver runs before the registry lock is
    /// taken.
    pub fn check_hosts<F, E>(
        &self,
        host_list: &str,
        default_port: u16,
        resolve: F,
    ) -> Result<(RankSet, HostSet), SystemError>
    where
        F: Fn(&str, &str) -> Result<IpAddr, E>,
        E: Display,
    {
        let candidates = HostSet::parse_with_limit(host_list, self.config.max_host_expansion)?;

        let mut hit = RankSet::new();
        let mut missing = HostSet::new();
        if candidates.is_empty() {
            return Ok((hit, missing));
        }

        let resolved: Vec<(&Host, Option<SocketAddr>)> = candidates
            .iter()
            .map(|host| {
                let address = host.address(default_port);
                match resolve(NETWORK_TCP, &address) {
                    Ok(ip) => (
                        host,
                        Some(SocketAddr::new(ip, host.effective_port(default_port))),
                    ),
                    Err(e) => {
                        debug!("Failed to resolve host {}: {}", address, e);
                        (host, None)
                    }
                }
            })
            .collect();

        let registry = self.registry.read();
        for (host, addr) in resolved {
            let ranks = addr.map(|a| registry.ranks_at(&a)).unwrap_or_default();
            if ranks.is_empty() {
                missing.insert(host.clone());
            } else {
                hit.extend(ranks);
            }
        }

        Ok((hit, missing))
    }

    /// Merge a batch of operation results into member state
    ///
    /// Every result of a known rank first has an empty address filled in
    /// from its member. The batch is then rejected without any member change
    /// if an errored result reports a Starting, Ready or Joined state.
    /// Otherwise, for each result of a known rank:
    /// - an errored result marks the member Errored with the error as info,
    ///   or is skipped when `apply_errored_state` is false
    /// - a successful result sets the reported state (and info, when the
    ///   message is non-empty) unless it would move the member backward or
    ///   sideways through Starting, Ready and Joined
    pub fn update_member_states(
        &self,
        results: &mut MemberResults,
        apply_errored_state: bool,
    ) -> Result<(), SystemError> {
        let mut events = Vec::new();

        {
            let mut registry = self.registry.write();

            for result in results.iter_mut() {
                if result.addr.is_empty()
                    && let Some(member) = registry.members.get(&result.rank)
                {
                    result.addr = member.addr.to_string();
                }
            }

            if let Some(result) = results
                .iter()
                .find(|r| r.is_errored() && r.state.is_forward_progression())
            {
                warn!(
                    "Rejecting result batch: errored result for rank {} reports state {}",
                    result.rank, result.state
                );
                return Err(SystemError::ConflictingResultState {
                    rank: result.rank,
                    state: result.state,
                });
            }

            for result in results.iter() {
                let Some(member) = registry.members.get_mut(&result.rank) else {
                    warn!("Ignoring result for unknown rank {}", result.rank);
                    continue;
                };

                let previous_state = member.state;
                match &result.error {
                    Some(err) if apply_errored_state => {
                        member.state = MemberState::Errored;
                        member.info = err.clone();
                    }
                    Some(err) => {
                        debug!(
                            "Skipping errored result for rank {}: {}",
                            result.rank, err
                        );
                        continue;
                    }
                    None if result.state.regresses(member.state) => {
                        debug!(
                            "Skipping stale result for rank {}: {} -> {}",
                            result.rank, member.state, result.state
                        );
                        continue;
                    }
                    None => {
                        member.state = result.state;
                        if !result.msg.is_empty() {
                            member.info = result.msg.clone();
                        }
                    }
                }

                if member.state != previous_state {
                    let event = MemberChangeEvent::member_state_change(
                        member.clone(),
                        previous_state,
                    );
                    self.event_publisher.broadcast(&event);
                    events.push(event);
                }
            }
        }

        for event in &events {
            self.event_publisher.notify_listeners(event);
        }
        Ok(())
    }

    /// Subscribe to member change events
    pub fn subscribe(&self) -> broadcast::Receiver<MemberChangeEvent> {
        self.event_publisher.subscribe()
    }

    /// Register a member change listener
    pub fn register_listener(&self, listener: Arc<dyn MemberChangeListener>) {
        self.event_publisher.register_listener(listener);
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }
}

/// Resolve `host:port` with the operating system resolver
///
/// Suitable as the `resolve` argument of [`Membership::check_hosts`]. Only
/// the "tcp" network is supported.
pub fn system_resolver(network: &str, address: &str) -> io::Result<IpAddr> {
    if network != NETWORK_TCP {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported network type: {}", network),
        ));
    }

    address
        .to_socket_addrs()?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {}", address),
            )
        })
}

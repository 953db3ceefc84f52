// Member change event handling
// Provides notifications for committed membership changes

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::member::{Member, MemberState};

/// Type of member change event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberChangeType {
    /// A rank was added to the membership
    MemberJoin,
    /// An existing rank was overwritten, e.g. after a reformat
    MemberReplace,
    /// A rank was removed from the membership
    MemberLeave,
    /// A member's state changed through a result merge
    MemberStateChange,
}

impl std::fmt::Display for MemberChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberChangeType::MemberJoin => write!(f, "MEMBER_JOIN"),
            MemberChangeType::MemberReplace => write!(f, "MEMBER_REPLACE"),
            MemberChangeType::MemberLeave => write!(f, "MEMBER_LEAVE"),
            MemberChangeType::MemberStateChange => write!(f, "MEMBER_STATE_CHANGE"),
        }
    }
}

/// Member change event
#[derive(Clone, Debug)]
pub struct MemberChangeEvent {
    /// Type of change
    pub change_type: MemberChangeType,
    /// The affected member, as committed
    pub member: Member,
    /// Previous state (for replacements and state changes)
    pub previous_state: Option<MemberState>,
    /// Timestamp of the event
    pub timestamp: i64,
}

impl MemberChangeEvent {
    fn new(
        change_type: MemberChangeType,
        member: Member,
        previous_state: Option<MemberState>,
    ) -> Self {
        Self {
            change_type,
            member,
            previous_state,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn member_join(member: Member) -> Self {
        Self::new(MemberChangeType::MemberJoin, member, None)
    }

    pub fn member_replace(member: Member, previous_state: MemberState) -> Self {
        Self::new(MemberChangeType::MemberReplace, member, Some(previous_state))
    }

    pub fn member_leave(member: Member) -> Self {
        Self::new(MemberChangeType::MemberLeave, member, None)
    }

    pub fn member_state_change(member: Member, previous_state: MemberState) -> Self {
        Self::new(
            MemberChangeType::MemberStateChange,
            member,
            Some(previous_state),
        )
    }
}

/// Trait for handling member change events
///
/// Listeners run on the caller's thread after the registry lock has been
/// released and must not block.
pub trait MemberChangeListener: Send + Sync {
    /// Called when a member change event occurs
    fn on_member_change(&self, event: &MemberChangeEvent);
}

/// Member change event publisher
/// Broadcasts events to subscribers and registered listeners
pub struct MemberChangeEventPublisher {
    /// Broadcast sender for events
    broadcast_tx: broadcast::Sender<MemberChangeEvent>,
    /// Registered listeners
    listeners: RwLock<Vec<Arc<dyn MemberChangeListener>>>,
}

impl MemberChangeEventPublisher {
    /// Create a new event publisher
    pub fn new(queue_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(queue_size.max(1));

        Self {
            broadcast_tx,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener for member change events
    pub fn register_listener(&self, listener: Arc<dyn MemberChangeListener>) {
        let mut listeners = self.listeners.write();
        listeners.push(listener);
        debug!(
            "Registered member change listener, total: {}",
            listeners.len()
        );
    }

    /// Publish a member change event to subscribers and listeners
    pub fn publish(&self, event: MemberChangeEvent) {
        self.broadcast(&event);
        self.notify_listeners(&event);
    }

    /// Send an event to broadcast subscribers
    ///
    /// Never blocks, so it may be called while the registry lock is held.
    pub fn broadcast(&self, event: &MemberChangeEvent) {
        debug!(
            "Publishing member change event: {} for rank {}",
            event.change_type, event.member.rank
        );

        // Send only fails when nobody is subscribed
        let _ = self.broadcast_tx.send(event.clone());
    }

    /// Run registered listeners for an event
    pub fn notify_listeners(&self, event: &MemberChangeEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners.iter() {
            listener.on_member_change(event);
        }
    }

    /// Subscribe to member change events
    pub fn subscribe(&self) -> broadcast::Receiver<MemberChangeEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for MemberChangeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberChangeEventPublisher")
            .field("subscribers", &self.broadcast_tx.receiver_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A simple logging listener for debugging
pub struct LoggingMemberChangeListener;

impl MemberChangeListener for LoggingMemberChangeListener {
    fn on_member_change(&self, event: &MemberChangeEvent) {
        match event.change_type {
            MemberChangeType::MemberJoin => {
                info!(
                    "[MemberEvent] Member joined: rank {} at {} (state: {})",
                    event.member.rank, event.member.addr, event.member.state
                );
            }
            MemberChangeType::MemberReplace => {
                info!(
                    "[MemberEvent] Member replaced: rank {} now {} at {}",
                    event.member.rank, event.member.uuid, event.member.addr
                );
            }
            MemberChangeType::MemberLeave => {
                info!("[MemberEvent] Member left: rank {}", event.member.rank);
            }
            MemberChangeType::MemberStateChange => {
                if let Some(prev_state) = &event.previous_state {
                    info!(
                        "[MemberEvent] Member state changed: rank {} ({} -> {})",
                        event.member.rank, prev_state, event.member.state
                    );
                }
            }
        }
    }
}

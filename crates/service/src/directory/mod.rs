//! In-memory state: users, channel membership, peers, the routing
//! table, and the ID cache (spec §3, §4.2).

mod id_cache;
mod ordered_set;
mod table;

pub use id_cache::{IdCache, MSGQ_SIZE};
pub use ordered_set::OrderedSet;
pub use table::Table;

use std::net::SocketAddr;

/// Fixed string "Common" (spec §6). A channel by this name exists from
/// construction and is never destroyed, even when its membership and
/// routing-table entries are both empty.
pub const DEFAULT_CHANNEL: &str = "Common";

/// Ticks between soft-state refresh passes that also trigger a reap
/// (spec §4.5): every `REFRESH_RATE`-th tick runs the reap pass, and
/// a user/peer is reaped once its minute-diff from now exceeds it.
pub const REFRESH_RATE: u8 = 2;

#[derive(Debug, Clone)]
pub struct User {
    pub endpoint: String,
    pub username: String,
    pub addr: SocketAddr,
    pub channels: OrderedSet<String>,
    pub last_active_minute: u8,
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub endpoint: String,
    pub addr: SocketAddr,
    pub last_active_minute: u8,
}

/// The coherent state bundle owned by the event loop (spec §9 "global
/// state"). Every map is keyed by endpoint string or channel name;
/// the cyclic peer-graph/routing-table relationship is expressed as
/// keys into these tables, never as pointers (spec §9).
pub struct Directory {
    users: Table<String, User>,
    channels: Table<String, OrderedSet<String>>,
    peers: Table<String, Peer>,
    routing: Table<String, OrderedSet<String>>,
    id_cache: IdCache,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        let mut channels = Table::default();
        channels.insert(DEFAULT_CHANNEL.to_string(), OrderedSet::new());
        Self {
            users: Table::default(),
            channels,
            peers: Table::default(),
            routing: Table::default(),
            id_cache: IdCache::default(),
        }
    }

    // -- users --------------------------------------------------------

    pub fn user(&self, endpoint: &str) -> Option<&User> {
        self.users.get(&endpoint.to_string())
    }

    pub fn user_mut(&mut self, endpoint: &str) -> Option<&mut User> {
        self.users.get_mut(&endpoint.to_string())
    }

    pub fn is_logged_in(&self, endpoint: &str) -> bool {
        self.users.contains(&endpoint.to_string())
    }

    /// Create a user record. I5: a second LOGIN for an already-known
    /// endpoint is a no-op (the handler treats this as "reserved"
    /// silent success, spec §4.3).
    pub fn login(&mut self, endpoint: &str, username: &str, addr: SocketAddr, minute: u8) {
        if self.users.contains(&endpoint.to_string()) {
            return;
        }
        self.users.insert(
            endpoint.to_string(),
            User {
                endpoint: endpoint.to_string(),
                username: username.to_string(),
                addr,
                channels: OrderedSet::new(),
                last_active_minute: minute,
            },
        );
    }

    /// Remove the user and every membership entry naming it, returning
    /// the channels it was on (so the caller can run leaf pruning for
    /// each, spec §4.3 LOGOUT).
    pub fn logout(&mut self, endpoint: &str) -> Vec<String> {
        let Some(user) = self.users.remove(&endpoint.to_string()) else {
            return Vec::new();
        };
        let channels = user.channels.snapshot();
        for channel in &channels {
            self.remove_member(channel, endpoint);
        }
        channels
    }

    pub fn touch_user(&mut self, endpoint: &str, minute: u8) {
        if let Some(user) = self.user_mut(endpoint) {
            user.last_active_minute = minute;
        }
    }

    pub fn all_user_endpoints(&self) -> Vec<String> {
        self.users.key_snapshot()
    }

    /// Scan local users for `username` (spec §4.3 VERIFY).
    pub fn find_user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|user| user.username == username)
    }

    // -- channel membership --------------------------------------------

    pub fn channel_exists(&self, channel: &str) -> bool {
        self.channels.contains(&channel.to_string())
    }

    pub fn channel_members(&self, channel: &str) -> Vec<String> {
        self.channels
            .get(&channel.to_string())
            .map(OrderedSet::snapshot)
            .unwrap_or_default()
    }

    pub fn channel_member_count(&self, channel: &str) -> usize {
        self.channels.get(&channel.to_string()).map_or(0, OrderedSet::len)
    }

    pub fn all_channel_names(&self) -> Vec<String> {
        self.channels.key_snapshot()
    }

    /// Add `endpoint` to `channel`'s membership and to the user's own
    /// channel list, creating the channel if missing. Dedup on both
    /// sides (spec.md §9's resolved open question, SPEC_FULL §4.3):
    /// rejoining an already-joined channel is a no-op.
    pub fn join_channel(&mut self, channel: &str, endpoint: &str) {
        self.channels
            .get_mut(&channel.to_string())
            .map(|members| members.insert_if_absent(endpoint.to_string()))
            .unwrap_or_else(|| {
                let mut members = OrderedSet::new();
                members.insert_if_absent(endpoint.to_string());
                self.channels.insert(channel.to_string(), members);
                true
            });
        if let Some(user) = self.user_mut(endpoint) {
            user.channels.insert_if_absent(channel.to_string());
        }
    }

    /// Remove `endpoint` from `channel`'s membership and from the
    /// user's own channel list. Destroys the channel if it becomes
    /// empty and is not the default channel. Returns `true` if the
    /// channel was destroyed.
    pub fn leave_channel(&mut self, channel: &str, endpoint: &str) -> bool {
        if let Some(user) = self.user_mut(endpoint) {
            user.channels.remove(&channel.to_string());
        }
        self.remove_member(channel, endpoint)
    }

    fn remove_member(&mut self, channel: &str, endpoint: &str) -> bool {
        let key = channel.to_string();
        let Some(members) = self.channels.get_mut(&key) else {
            return false;
        };
        members.remove(&endpoint.to_string());
        if members.is_empty() && channel != DEFAULT_CHANNEL {
            self.channels.remove(&key);
            return true;
        }
        false
    }

    // -- peers -----------------------------------------------------------

    pub fn peer(&self, endpoint: &str) -> Option<&Peer> {
        self.peers.get(&endpoint.to_string())
    }

    pub fn has_peers(&self) -> bool {
        !self.peers.is_empty()
    }

    pub fn add_peer(&mut self, endpoint: &str, addr: SocketAddr, minute: u8) {
        self.peers.insert(
            endpoint.to_string(),
            Peer {
                endpoint: endpoint.to_string(),
                addr,
                last_active_minute: minute,
            },
        );
    }

    pub fn remove_peer(&mut self, endpoint: &str) {
        self.peers.remove(&endpoint.to_string());
    }

    pub fn touch_peer(&mut self, endpoint: &str, minute: u8) {
        if let Some(peer) = self.peers.get_mut(&endpoint.to_string()) {
            peer.last_active_minute = minute;
        }
    }

    pub fn all_peer_endpoints(&self) -> Vec<String> {
        self.peers.key_snapshot()
    }

    /// All peer endpoints except `exclude`, in table order.
    pub fn peers_except(&self, exclude: &str) -> Vec<String> {
        self.peers
            .keys()
            .filter(|endpoint| endpoint.as_str() != exclude)
            .cloned()
            .collect()
    }

    // -- routing table -----------------------------------------------------

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.routing.contains(&channel.to_string())
    }

    pub fn subscribers(&self, channel: &str) -> Vec<String> {
        self.routing
            .get(&channel.to_string())
            .map(OrderedSet::snapshot)
            .unwrap_or_default()
    }

    pub fn all_routed_channels(&self) -> Vec<String> {
        self.routing.key_snapshot()
    }

    /// Subscribe this node to `channel`, seeding the subscriber list
    /// with the given peer set (spec §4.4 S2S JOIN, "seed with the set
    /// of all current peers" when joining fresh).
    pub fn subscribe(&mut self, channel: &str, initial_subscribers: Vec<String>) {
        let mut set = OrderedSet::new();
        for endpoint in initial_subscribers {
            set.insert_if_absent(endpoint);
        }
        self.routing.insert(channel.to_string(), set);
    }

    /// Add `endpoint` to `channel`'s subscriber list if absent. Returns
    /// `true` if it was newly added.
    pub fn add_subscriber(&mut self, channel: &str, endpoint: &str) -> bool {
        self.routing
            .get_mut(&channel.to_string())
            .is_some_and(|subs| subs.insert_if_absent(endpoint.to_string()))
    }

    pub fn remove_subscriber(&mut self, channel: &str, endpoint: &str) {
        if let Some(subs) = self.routing.get_mut(&channel.to_string()) {
            subs.remove(&endpoint.to_string());
        }
    }

    pub fn unsubscribe(&mut self, channel: &str) -> Option<OrderedSet<String>> {
        self.routing.remove(&channel.to_string())
    }

    // -- ID cache ------------------------------------------------------

    /// If `id` is new, queue it and return `true`. If it was already
    /// present (a loop echo), return `false` without mutating the
    /// cache's recency.
    pub fn observe_id(&mut self, id: u64) -> bool {
        if self.id_cache.contains(id) {
            return false;
        }
        self.id_cache.insert(id);
        true
    }
}

//! Leaf pruning, soft-state refresh, and inactivity reaping (spec §4.5).

use codec::ChannelName;
use codec::peer::PeerRequest;

use crate::client::logout_user;
use crate::directory::Directory;
use crate::outbound::Outbound;

/// A node is a leaf for `channel` iff it has no peers at all, or its
/// routing-table entry has fewer than 2 subscribers and no local
/// channel members (spec §4.5).
fn is_leaf(dir: &Directory, channel: &str) -> bool {
    if !dir.has_peers() {
        return true;
    }
    dir.subscribers(channel).len() < 2 && dir.channel_member_count(channel) == 0
}

/// Attempt leaf pruning for `channel`. Removes the routing-table entry
/// if this node is a leaf and, if exactly one subscriber remained
/// (the upstream), sends it S2S LEAVE. A no-op if the node is not a
/// leaf, or has no routing entry for the channel to begin with.
/// Idempotent (P7): a second call with no intervening events finds no
/// routing entry left and does nothing.
pub fn prune(dir: &mut Directory, channel: &str) -> Vec<Outbound> {
    if !is_leaf(dir, channel) {
        return Vec::new();
    }
    let Some(subscribers) = dir.unsubscribe(channel) else {
        return Vec::new();
    };
    let subscribers = subscribers.snapshot();
    if subscribers.len() == 1 {
        let upstream = &subscribers[0];
        if let Some(peer) = dir.peer(upstream) {
            let bytes = PeerRequest::Leave {
                channel: ChannelName::new(channel),
            }
            .encode();
            return vec![Outbound::new(peer.addr, bytes)];
        }
    }
    Vec::new()
}

/// Soft-state refresh, ticked every ~60s by the event loop: KEEP-ALIVE
/// to every peer, and a re-asserting S2S JOIN to every peer for every
/// channel this node is currently subscribed to.
pub fn refresh_tick(dir: &Directory) -> Vec<Outbound> {
    let mut out = Vec::new();

    for endpoint in dir.all_peer_endpoints() {
        if let Some(peer) = dir.peer(&endpoint) {
            out.push(Outbound::new(peer.addr, PeerRequest::KeepAlive.encode()));
        }
    }

    for channel in dir.all_routed_channels() {
        for endpoint in dir.all_peer_endpoints() {
            if let Some(peer) = dir.peer(&endpoint) {
                let bytes = PeerRequest::Join {
                    channel: ChannelName::new(&channel),
                }
                .encode();
                out.push(Outbound::new(peer.addr, bytes));
            }
        }
    }

    out
}

/// Coarse, deliberately clock-jump-tolerant minute distance (spec §4.5).
fn minute_diff(now: u8, then: u8) -> u8 {
    if now >= then {
        now - then
    } else {
        (60 - then) + now
    }
}

/// Reap inactive users and peers. Runs every `REFRESH_RATE`-th tick.
/// Inactive users are logged out through the same path as REQ_LOGOUT
/// (triggering membership cleanup and leaf pruning); inactive peers
/// are dropped from every routing-table entry, each followed by a
/// leaf-pruning attempt.
pub fn reap(dir: &mut Directory, now_minute: u8, refresh_rate: u8) -> Vec<Outbound> {
    let mut out = Vec::new();

    let stale_users: Vec<String> = dir
        .all_user_endpoints()
        .into_iter()
        .filter(|endpoint| {
            let minute = dir.user(endpoint).map(|u| u.last_active_minute).unwrap_or(now_minute);
            minute_diff(now_minute, minute) > refresh_rate
        })
        .collect();
    for endpoint in stale_users {
        out.extend(logout_user(dir, &endpoint));
    }

    let stale_peers: Vec<String> = dir
        .all_peer_endpoints()
        .into_iter()
        .filter(|endpoint| {
            let minute = dir.peer(endpoint).map(|p| p.last_active_minute).unwrap_or(now_minute);
            minute_diff(now_minute, minute) > refresh_rate
        })
        .collect();
    for endpoint in stale_peers {
        dir.remove_peer(&endpoint);
        for channel in dir.all_routed_channels() {
            dir.remove_subscriber(&channel, &endpoint);
            out.extend(prune(dir, &channel));
        }
    }

    out
}

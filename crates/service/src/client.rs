//! Client → server request handlers (spec §4.3).

use std::net::SocketAddr;

use codec::client::ClientRequest;
use codec::server::ServerText;

use crate::directory::Directory;
use crate::generate_id;
use crate::outbound::Outbound;
use crate::subtree;

/// Dispatch one client request. `minute` is the current wall-clock
/// minute (0-59). Handlers update the sender's last-activity minute
/// on entry, except LOGIN, which sets it as part of creating the
/// record (spec §4.3).
pub fn handle(
    dir: &mut Directory,
    endpoint: &str,
    addr: SocketAddr,
    minute: u8,
    request: ClientRequest,
) -> Vec<Outbound> {
    if !matches!(request, ClientRequest::Login { .. }) {
        dir.touch_user(endpoint, minute);
    }

    match request {
        ClientRequest::Login { username } => {
            dir.login(endpoint, &username.as_str(), addr, minute);
            Vec::new()
        }
        ClientRequest::Logout => logout_user(dir, endpoint),
        ClientRequest::Join { channel } => join(dir, endpoint, &channel.as_str()),
        ClientRequest::Leave { channel } => leave(dir, endpoint, addr, &channel.as_str()),
        ClientRequest::Say { channel, text } => say(dir, endpoint, &channel.as_str(), &text.as_str()),
        ClientRequest::List => list(dir, endpoint, addr),
        ClientRequest::Who { channel } => who(dir, endpoint, addr, &channel.as_str()),
        ClientRequest::KeepAlive => Vec::new(),
        ClientRequest::Verify { username } => verify(dir, endpoint, addr, &username.as_str()),
    }
}

/// Remove the user and prune every channel it leaves behind. Shared
/// with [`crate::subtree::reap`] for inactivity-triggered logouts.
pub fn logout_user(dir: &mut Directory, endpoint: &str) -> Vec<Outbound> {
    let channels = dir.logout(endpoint);
    let mut out = Vec::new();
    for channel in channels {
        out.extend(subtree::prune(dir, &channel));
    }
    out
}

fn join(dir: &mut Directory, endpoint: &str, channel: &str) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) {
        return Vec::new();
    }

    dir.join_channel(channel, endpoint);

    let mut out = Vec::new();
    if !dir.is_subscribed(channel) && dir.has_peers() {
        let peers = dir.all_peer_endpoints();
        dir.subscribe(channel, peers.clone());
        for peer_endpoint in peers {
            if let Some(peer) = dir.peer(&peer_endpoint) {
                let bytes = codec::peer::PeerRequest::Join {
                    channel: codec::ChannelName::new(channel),
                }
                .encode();
                out.push(Outbound::new(peer.addr, bytes));
            }
        }
    }
    out
}

fn leave(dir: &mut Directory, endpoint: &str, addr: SocketAddr, channel: &str) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) {
        return Vec::new();
    }
    if !dir.channel_exists(channel) {
        let text = format!("No channel by the name {channel}.");
        return vec![Outbound::new(addr, ServerText::error(&text).encode())];
    }

    dir.leave_channel(channel, endpoint);

    let pruned = subtree::prune(dir, channel);
    if !pruned.is_empty() {
        return pruned;
    }

    if dir.channel_member_count(channel) == 0 {
        let id = generate_id();
        dir.observe_id(id);
        let subscribers = dir.subscribers(channel);
        let mut out = Vec::new();
        for subscriber in subscribers {
            if let Some(peer) = dir.peer(&subscriber) {
                let bytes = codec::peer::PeerRequest::Leaf {
                    id,
                    channel: codec::ChannelName::new(channel),
                }
                .encode();
                out.push(Outbound::new(peer.addr, bytes));
            }
        }
        return out;
    }

    Vec::new()
}

fn say(dir: &mut Directory, endpoint: &str, channel: &str, text: &str) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) || !dir.channel_exists(channel) {
        return Vec::new();
    }

    let username = dir
        .user(endpoint)
        .map(|u| u.username.clone())
        .unwrap_or_default();

    let mut out = Vec::new();
    for member in dir.channel_members(channel) {
        if let Some(user) = dir.user(&member) {
            let bytes = ServerText::Say {
                channel: codec::ChannelName::new(channel),
                username: codec::Username::new(&username),
                text: codec::SayText::new(text),
            }
            .encode();
            out.push(Outbound::new(user.addr, bytes));
        }
    }

    let id = generate_id();
    dir.observe_id(id);
    for subscriber in dir.subscribers(channel) {
        if let Some(peer) = dir.peer(&subscriber) {
            let bytes = codec::peer::PeerRequest::Say {
                id,
                channel: codec::ChannelName::new(channel),
                username: codec::Username::new(&username),
                text: codec::SayText::new(text),
            }
            .encode();
            out.push(Outbound::new(peer.addr, bytes));
        }
    }

    out
}

fn list(dir: &mut Directory, endpoint: &str, addr: SocketAddr) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) {
        return Vec::new();
    }

    if !dir.has_peers() {
        let channels = dir
            .all_channel_names()
            .into_iter()
            .map(|c| codec::ChannelName::new(&c))
            .collect();
        let bytes = ServerText::List { channels }.encode();
        return vec![Outbound::new(addr, bytes)];
    }

    let peers = dir.all_peer_endpoints();
    let first = &peers[0];
    let to_visit = peers[1..]
        .iter()
        .map(|e| codec::Endpoint::new(e))
        .collect();
    let channels_so_far = dir
        .all_channel_names()
        .into_iter()
        .map(|c| codec::ChannelName::new(&c))
        .collect();

    let id = generate_id();
    dir.observe_id(id);
    let Some(peer) = dir.peer(first) else {
        return Vec::new();
    };
    let bytes = codec::peer::PeerRequest::List {
        id,
        requester: codec::Endpoint::new(endpoint),
        channels_so_far,
        to_visit,
    }
    .encode();
    vec![Outbound::new(peer.addr, bytes)]
}

fn who(dir: &mut Directory, endpoint: &str, addr: SocketAddr, channel: &str) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) {
        return Vec::new();
    }

    if !dir.has_peers() {
        if !dir.channel_exists(channel) {
            let text = format!("No channel by the name {channel}.");
            return vec![Outbound::new(addr, ServerText::error(&text).encode())];
        }
        let usernames = dir
            .channel_members(channel)
            .into_iter()
            .filter_map(|m| dir.user(&m).map(|u| codec::Username::new(&u.username)))
            .collect();
        let bytes = ServerText::Who {
            channel: codec::ChannelName::new(channel),
            usernames,
        }
        .encode();
        return vec![Outbound::new(addr, bytes)];
    }

    let peers = dir.all_peer_endpoints();
    let first = &peers[0];
    let to_visit = peers[1..]
        .iter()
        .map(|e| codec::Endpoint::new(e))
        .collect();
    let users_so_far = dir
        .channel_members(channel)
        .into_iter()
        .filter_map(|m| dir.user(&m).map(|u| codec::Username::new(&u.username)))
        .collect();

    let id = generate_id();
    dir.observe_id(id);
    let Some(peer) = dir.peer(first) else {
        return Vec::new();
    };
    let bytes = codec::peer::PeerRequest::Who {
        id,
        channel: codec::ChannelName::new(channel),
        requester: codec::Endpoint::new(endpoint),
        users_so_far,
        to_visit,
    }
    .encode();
    vec![Outbound::new(peer.addr, bytes)]
}

fn verify(dir: &mut Directory, endpoint: &str, addr: SocketAddr, username: &str) -> Vec<Outbound> {
    if !dir.is_logged_in(endpoint) {
        return Vec::new();
    }

    if dir.find_user_by_username(username).is_some() {
        let bytes = ServerText::Verify { valid: false }.encode();
        return vec![Outbound::new(addr, bytes)];
    }

    if !dir.has_peers() {
        let bytes = ServerText::Verify { valid: true }.encode();
        return vec![Outbound::new(addr, bytes)];
    }

    let peers = dir.all_peer_endpoints();
    let first = &peers[0];
    let to_visit = peers[1..]
        .iter()
        .map(|e| codec::Endpoint::new(e))
        .collect();

    let id = generate_id();
    dir.observe_id(id);
    let Some(peer) = dir.peer(first) else {
        return Vec::new();
    };
    let bytes = codec::peer::PeerRequest::Verify {
        id,
        username: codec::Username::new(username),
        requester: codec::Endpoint::new(endpoint),
        to_visit,
    }
    .encode();
    vec![Outbound::new(peer.addr, bytes)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn login_then_join_with_no_peers_touches_no_network() {
        let mut dir = Directory::new();
        let out = handle(
            &mut dir,
            "127.0.0.1:1",
            addr(1),
            0,
            ClientRequest::Login {
                username: codec::Username::new("alice"),
            },
        );
        assert!(out.is_empty());
        let out = handle(
            &mut dir,
            "127.0.0.1:1",
            addr(1),
            0,
            ClientRequest::Join {
                channel: codec::ChannelName::new("games"),
            },
        );
        assert!(out.is_empty());
        assert!(dir.channel_exists("games"));
    }

    #[test]
    fn say_with_no_channel_members_other_than_self_echoes_once() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        dir.join_channel("games", "127.0.0.1:1");
        let out = say(&mut dir, "127.0.0.1:1", "games", "hi");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, addr(1));
    }

    #[test]
    fn leave_unknown_channel_replies_with_error() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        let out = leave(&mut dir, "127.0.0.1:1", addr(1), "nope");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn verify_finds_local_collision() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        dir.login("127.0.0.1:2", "bob", addr(2), 0);
        let out = verify(&mut dir, "127.0.0.1:2", addr(2), "alice");
        assert_eq!(out.len(), 1);
        let decoded = ServerText::decode(codec::Tag::TxtVerify, &out[0].bytes[4..]).unwrap();
        assert_eq!(decoded, ServerText::Verify { valid: false });
    }

    #[test]
    fn verify_with_no_collision_and_no_peers_is_valid() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        let out = verify(&mut dir, "127.0.0.1:1", addr(1), "bob");
        let decoded = ServerText::decode(codec::Tag::TxtVerify, &out[0].bytes[4..]).unwrap();
        assert_eq!(decoded, ServerText::Verify { valid: true });
    }

    #[test]
    fn list_with_no_peers_returns_local_channels() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        dir.join_channel("games", "127.0.0.1:1");
        let out = list(&mut dir, "127.0.0.1:1", addr(1));
        assert_eq!(out.len(), 1);
        let decoded = ServerText::decode(codec::Tag::TxtList, &out[0].bytes[4..]).unwrap();
        match decoded {
            ServerText::List { channels } => assert_eq!(channels.len(), 2),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn logout_prunes_every_joined_channel() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        dir.join_channel("games", "127.0.0.1:1");
        logout_user(&mut dir, "127.0.0.1:1");
        assert!(!dir.is_logged_in("127.0.0.1:1"));
        assert!(!dir.channel_exists("games"));
    }
}

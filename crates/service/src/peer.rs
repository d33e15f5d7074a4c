//! Server → server request handlers and the gather-packet pattern
//! (spec §4.4).

use std::net::SocketAddr;

use codec::peer::PeerRequest;
use codec::server::ServerText;
use codec::{ChannelName, Endpoint, Username};

use crate::directory::{DEFAULT_CHANNEL, Directory};
use crate::outbound::Outbound;
use crate::subtree;

/// Dispatch one S2S request. Every handler first refreshes the
/// sending peer's last-activity minute (spec §4.4).
pub fn handle(
    dir: &mut Directory,
    sender: &str,
    minute: u8,
    request: PeerRequest,
) -> Vec<Outbound> {
    dir.touch_peer(sender, minute);

    match request {
        PeerRequest::Join { channel } => join(dir, sender, &channel.as_str()),
        PeerRequest::Leave { channel } => leave(dir, sender, &channel.as_str()),
        PeerRequest::Say {
            id,
            channel,
            username,
            text,
        } => say(dir, sender, id, &channel.as_str(), &username.as_str(), &text.as_str()),
        PeerRequest::List {
            id,
            requester,
            channels_so_far,
            to_visit,
        } => list(
            dir,
            sender,
            id,
            &requester.as_str(),
            channels_so_far.iter().map(|c| c.as_str().into_owned()).collect(),
            to_visit.iter().map(|e| e.as_str().into_owned()).collect(),
        ),
        PeerRequest::Who {
            id,
            channel,
            requester,
            users_so_far,
            to_visit,
        } => who(
            dir,
            sender,
            id,
            &channel.as_str(),
            &requester.as_str(),
            users_so_far.iter().map(|u| u.as_str().into_owned()).collect(),
            to_visit.iter().map(|e| e.as_str().into_owned()).collect(),
        ),
        PeerRequest::Leaf { id, channel } => leaf(dir, sender, id, &channel.as_str()),
        PeerRequest::Verify {
            id,
            username,
            requester,
            to_visit,
        } => verify(
            dir,
            sender,
            id,
            &username.as_str(),
            &requester.as_str(),
            to_visit.iter().map(|e| e.as_str().into_owned()).collect(),
        ),
        PeerRequest::KeepAlive => Vec::new(),
    }
}

fn send_to_endpoint(endpoint: &str, bytes: bytes::BytesMut) -> Vec<Outbound> {
    match endpoint.parse::<SocketAddr>() {
        Ok(addr) => vec![Outbound::new(addr, bytes)],
        Err(_) => Vec::new(),
    }
}

fn join(dir: &mut Directory, sender: &str, channel: &str) -> Vec<Outbound> {
    if !dir.is_subscribed(channel) {
        let peers = dir.all_peer_endpoints();
        dir.subscribe(channel, peers);
        let mut out = Vec::new();
        for endpoint in dir.peers_except(sender) {
            if let Some(peer) = dir.peer(&endpoint) {
                let bytes = PeerRequest::Join {
                    channel: ChannelName::new(channel),
                }
                .encode();
                out.push(Outbound::new(peer.addr, bytes));
            }
        }
        out
    } else {
        dir.add_subscriber(channel, sender);
        Vec::new()
    }
}

fn leave(dir: &mut Directory, sender: &str, channel: &str) -> Vec<Outbound> {
    dir.remove_subscriber(channel, sender);
    subtree::prune(dir, channel)
}

fn say(
    dir: &mut Directory,
    sender: &str,
    id: u64,
    channel: &str,
    username: &str,
    text: &str,
) -> Vec<Outbound> {
    if !dir.observe_id(id) {
        if let Some(peer) = dir.peer(sender) {
            let bytes = PeerRequest::Leave {
                channel: ChannelName::new(channel),
            }
            .encode();
            return vec![Outbound::new(peer.addr, bytes)];
        }
        return Vec::new();
    }

    let mut out = Vec::new();
    if dir.channel_exists(channel) {
        for member in dir.channel_members(channel) {
            if let Some(user) = dir.user(&member) {
                let bytes = ServerText::Say {
                    channel: ChannelName::new(channel),
                    username: Username::new(username),
                    text: codec::SayText::new(text),
                }
                .encode();
                out.push(Outbound::new(user.addr, bytes));
            }
        }
    }

    let pruned = subtree::prune(dir, channel);
    if !pruned.is_empty() {
        out.extend(pruned);
        return out;
    }

    for subscriber in dir.subscribers(channel) {
        if subscriber == sender {
            continue;
        }
        if let Some(peer) = dir.peer(&subscriber) {
            let bytes = PeerRequest::Say {
                id,
                channel: ChannelName::new(channel),
                username: Username::new(username),
                text: codec::SayText::new(text),
            }
            .encode();
            out.push(Outbound::new(peer.addr, bytes));
        }
    }
    out
}

fn leaf(dir: &mut Directory, sender: &str, id: u64, channel: &str) -> Vec<Outbound> {
    let mut out = subtree::prune(dir, channel);

    if !dir.observe_id(id) {
        dir.remove_subscriber(channel, sender);
        if let Some(peer) = dir.peer(sender) {
            let bytes = PeerRequest::Leave {
                channel: ChannelName::new(channel),
            }
            .encode();
            out.push(Outbound::new(peer.addr, bytes));
        }
        return out;
    }

    if dir.channel_member_count(channel) > 0 {
        return out;
    }

    for subscriber in dir.subscribers(channel) {
        if subscriber == sender {
            continue;
        }
        if let Some(peer) = dir.peer(&subscriber) {
            let bytes = PeerRequest::Leaf {
                id,
                channel: ChannelName::new(channel),
            }
            .encode();
            out.push(Outbound::new(peer.addr, bytes));
        }
    }
    out
}

fn verify(
    dir: &mut Directory,
    sender: &str,
    id: u64,
    username: &str,
    requester: &str,
    mut to_visit: Vec<String>,
) -> Vec<Outbound> {
    let fresh = dir.observe_id(id);
    if fresh {
        if dir.find_user_by_username(username).is_some() {
            let bytes = ServerText::Verify { valid: false }.encode();
            return send_to_endpoint(requester, bytes);
        }
        for endpoint in dir.peers_except(sender) {
            if !to_visit.contains(&endpoint) {
                to_visit.push(endpoint);
            }
        }
    }

    if to_visit.is_empty() {
        let bytes = ServerText::Verify { valid: true }.encode();
        return send_to_endpoint(requester, bytes);
    }

    let next = to_visit.remove(0);
    let Some(peer) = dir.peer(&next) else {
        return Vec::new();
    };
    let bytes = PeerRequest::Verify {
        id,
        username: Username::new(username),
        requester: Endpoint::new(requester),
        to_visit: to_visit.iter().map(|e| Endpoint::new(e)).collect(),
    }
    .encode();
    vec![Outbound::new(peer.addr, bytes)]
}

fn list(
    dir: &mut Directory,
    sender: &str,
    id: u64,
    requester: &str,
    mut channels_so_far: Vec<String>,
    mut to_visit: Vec<String>,
) -> Vec<Outbound> {
    if dir.observe_id(id) {
        for channel in dir.all_channel_names() {
            if !channels_so_far.contains(&channel) {
                channels_so_far.push(channel);
            }
        }
        for endpoint in dir.peers_except(sender) {
            if !to_visit.contains(&endpoint) {
                to_visit.push(endpoint);
            }
        }
    }

    if to_visit.is_empty() {
        let channels = channels_so_far.iter().map(|c| ChannelName::new(c)).collect();
        let bytes = ServerText::List { channels }.encode();
        return send_to_endpoint(requester, bytes);
    }

    let next = to_visit.remove(0);
    let Some(peer) = dir.peer(&next) else {
        return Vec::new();
    };
    let bytes = PeerRequest::List {
        id,
        requester: Endpoint::new(requester),
        channels_so_far: channels_so_far.iter().map(|c| ChannelName::new(c)).collect(),
        to_visit: to_visit.iter().map(|e| Endpoint::new(e)).collect(),
    }
    .encode();
    vec![Outbound::new(peer.addr, bytes)]
}

fn who(
    dir: &mut Directory,
    sender: &str,
    id: u64,
    channel: &str,
    requester: &str,
    mut users_so_far: Vec<String>,
    mut to_visit: Vec<String>,
) -> Vec<Outbound> {
    if dir.observe_id(id) {
        for member in dir.channel_members(channel) {
            if let Some(user) = dir.user(&member) {
                if !users_so_far.contains(&user.username) {
                    users_so_far.push(user.username.clone());
                }
            }
        }
        for endpoint in dir.peers_except(sender) {
            if !to_visit.contains(&endpoint) {
                to_visit.push(endpoint);
            }
        }
    }

    if to_visit.is_empty() {
        if users_so_far.is_empty() && channel != DEFAULT_CHANNEL {
            let text = format!("No channel by the name {channel}.");
            let bytes = ServerText::error(&text).encode();
            return send_to_endpoint(requester, bytes);
        }
        let usernames = users_so_far.iter().map(|u| Username::new(u)).collect();
        let bytes = ServerText::Who {
            channel: ChannelName::new(channel),
            usernames,
        }
        .encode();
        return send_to_endpoint(requester, bytes);
    }

    let next = to_visit.remove(0);
    let Some(peer) = dir.peer(&next) else {
        return Vec::new();
    };
    let bytes = PeerRequest::Who {
        id,
        channel: ChannelName::new(channel),
        requester: Endpoint::new(requester),
        users_so_far: users_so_far.iter().map(|u| Username::new(u)).collect(),
        to_visit: to_visit.iter().map(|e| Endpoint::new(e)).collect(),
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
    fn fresh_join_subscribes_and_floods_to_other_peers() {
        let mut dir = Directory::new();
        dir.add_peer("127.0.0.1:6001", addr(6001), 0);
        dir.add_peer("127.0.0.1:6002", addr(6002), 0);
        let out = join(&mut dir, "127.0.0.1:6001", "games");
        assert!(dir.is_subscribed("games"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, addr(6002));
    }

    #[test]
    fn repeat_join_from_new_peer_just_adds_subscriber() {
        let mut dir = Directory::new();
        dir.add_peer("127.0.0.1:6001", addr(6001), 0);
        dir.subscribe("games", vec!["127.0.0.1:6001".to_string()]);
        let out = join(&mut dir, "127.0.0.1:6002", "games");
        assert!(out.is_empty());
        assert!(dir.subscribers("games").contains(&"127.0.0.1:6002".to_string()));
    }

    #[test]
    fn duplicate_say_id_replies_leave_to_sender() {
        let mut dir = Directory::new();
        dir.add_peer("127.0.0.1:6001", addr(6001), 0);
        dir.observe_id(42);
        let out = say(&mut dir, "127.0.0.1:6001", 42, "games", "alice", "hi");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, addr(6001));
    }

    #[test]
    fn duplicate_verify_drains_to_visit_without_re_enriching() {
        let mut dir = Directory::new();
        dir.add_peer("127.0.0.1:6001", addr(6001), 0);
        dir.add_peer("127.0.0.1:6002", addr(6002), 0);
        dir.observe_id(55);
        let out = verify(&mut dir, "127.0.0.1:6001", 55, "alice", "127.0.0.1:9", Vec::new());
        // duplicate: to_visit was empty and must not be re-enriched with
        // peers-except-sender, so the gather terminates here instead of
        // forwarding back into the peers that already saw this id.
        assert_eq!(out.len(), 1);
        let decoded = ServerText::decode(codec::Tag::TxtVerify, &out[0].bytes[4..]).unwrap();
        assert_eq!(decoded, ServerText::Verify { valid: true });
    }

    #[test]
    fn verify_collision_replies_directly_to_requester_address() {
        let mut dir = Directory::new();
        dir.login("127.0.0.1:1", "alice", addr(1), 0);
        let out = verify(&mut dir, "127.0.0.1:6001", 1, "alice", "127.0.0.1:9", Vec::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, "127.0.0.1:9".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn list_gather_terminates_when_to_visit_empties() {
        let mut dir = Directory::new();
        let out = list(&mut dir, "127.0.0.1:6001", 5, "127.0.0.1:9", vec!["games".to_string()], Vec::new());
        assert_eq!(out.len(), 1);
        let decoded = ServerText::decode(codec::Tag::TxtList, &out[0].bytes[4..]).unwrap();
        match decoded {
            ServerText::List { channels } => assert!(channels.len() >= 2),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn who_on_missing_channel_replies_error() {
        let mut dir = Directory::new();
        let out = who(&mut dir, "127.0.0.1:6001", 9, "nope", "127.0.0.1:9", Vec::new(), Vec::new());
        assert_eq!(out.len(), 1);
        let decoded = ServerText::decode(codec::Tag::TxtError, &out[0].bytes[4..]).unwrap();
        assert!(matches!(decoded, ServerText::Error { .. }));
    }

    #[test]
    fn leaf_duplicate_removes_subscriber_and_replies_leave() {
        let mut dir = Directory::new();
        dir.add_peer("127.0.0.1:6001", addr(6001), 0);
        dir.add_peer("127.0.0.1:6002", addr(6002), 0);
        dir.subscribe(
            "games",
            vec!["127.0.0.1:6001".to_string(), "127.0.0.1:6002".to_string()],
        );
        dir.observe_id(77);
        let out = leaf(&mut dir, "127.0.0.1:6001", 77, "games");
        assert!(!dir.subscribers("games").contains(&"127.0.0.1:6001".to_string()));
        assert!(out.iter().any(|o| o.to == addr(6001)));
    }
}

//! Single-threaded receive-or-tick dispatcher (spec §4.6, §5).
//!
//! Grounded on the teacher's `server/transports/udp.rs` blocking
//! `UdpSocket` receive loop, narrowed from "one thread per core,
//! `core_affinity`-pinned" down to the single thread spec §5 mandates
//! ("all state is owned by the event loop; no locking is required" —
//! there is exactly one `Directory`, so there is nothing to partition
//! across cores without breaking I1-I6).

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use codec::Tag;
use codec::client::ClientRequest;
use codec::peer::PeerRequest;
use service::Directory;
use service::directory::REFRESH_RATE;
use service::{client, peer, subtree};

use crate::config::Config;

const TICK_SECS: u64 = 60;
/// Large enough for any fixed-header kind plus a generous trailing
/// gather payload; the codec's own count-vs-length check is the real
/// admission control, this is just an allocation bound.
const MAX_DATAGRAM: usize = 16 * 1024;

/// Current wall-clock minute, 0-59 (spec §3). Deliberately coarse: the
/// subtree manager's reap arithmetic is modulo-60 and tolerates clock
/// jumps under a minute (spec §4.5).
fn wall_clock_minute() -> u8 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    ((secs / 60) % 60) as u8
}

/// Run the relay core until `shutdown` is set (by a SIGINT handler) or
/// the socket is unusable. Owns the socket and the [`Directory`] by
/// value; no `Arc`, no lock (spec §5, §9).
pub fn run(config: &Config, shutdown: Arc<AtomicBool>) -> Result<()> {
    let socket = UdpSocket::bind(config.bind).with_context(|| format!("failed to bind {}", config.bind))?;
    socket
        .set_read_timeout(Some(Duration::from_secs(TICK_SECS)))
        .context("failed to set recv timeout")?;

    log::info!("chat relay listening on {}", config.bind);

    let mut dir = Directory::new();
    let minute = wall_clock_minute();
    for peer in &config.peers {
        let endpoint = peer.addr.to_string();
        dir.add_peer(&endpoint, peer.addr, minute);
        log::info!("registered peer {endpoint}");
    }

    let mut buffer = vec![0u8; MAX_DATAGRAM];
    let mut ticks_since_reap: u8 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buffer) {
            Ok((size, addr)) => {
                let minute = wall_clock_minute();
                let outbound = dispatch(&mut dir, &buffer[..size], addr, minute);
                send_all(&socket, outbound);
            }
            Err(err) if is_timeout(&err) => {
                let minute = wall_clock_minute();
                send_all(&socket, subtree::refresh_tick(&dir));

                ticks_since_reap = ticks_since_reap.saturating_add(1);
                if ticks_since_reap >= REFRESH_RATE {
                    ticks_since_reap = 0;
                    send_all(&socket, subtree::reap(&mut dir, minute, REFRESH_RATE));
                }
            }
            Err(err) => {
                // A genuinely broken socket (not just a timed-out recv):
                // nothing in spec calls for retrying it indefinitely.
                log::error!("recv_from failed: {err}");
                return Err(err.into());
            }
        }
    }

    Ok(())
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Decode the datagram's tag and demux to the client or peer handler.
/// Unknown tags, decode failures, and tags that don't belong to the
/// sender's side of the protocol are silently dropped (spec §7.3).
fn dispatch(
    dir: &mut Directory,
    datagram: &[u8],
    addr: std::net::SocketAddr,
    minute: u8,
) -> Vec<service::Outbound> {
    let Some(tag) = Tag::peek(datagram) else {
        log::trace!("dropping datagram with unknown/short tag from {addr}");
        return Vec::new();
    };

    let body = &datagram[4..];
    let endpoint = addr.to_string();

    if tag.is_client_facing() {
        match ClientRequest::decode(tag, body) {
            Ok(request) => client::handle(dir, &endpoint, addr, minute, request),
            Err(err) => {
                log::trace!("dropping malformed client request from {addr}: {err}");
                Vec::new()
            }
        }
    } else if tag.is_peer_facing() {
        match PeerRequest::decode(tag, body) {
            Ok(request) => peer::handle(dir, &endpoint, minute, request),
            Err(err) => {
                log::trace!("dropping malformed peer request from {addr}: {err}");
                Vec::new()
            }
        }
    } else {
        log::trace!("dropping datagram with unroutable tag from {addr}");
        Vec::new()
    }
}

/// Fire-and-forget send of every outbound datagram; send errors are
/// logged and otherwise ignored (spec §5, §7).
fn send_all(socket: &UdpSocket, outbound: Vec<service::Outbound>) {
    for out in outbound {
        if let Err(err) = socket.send_to(&out.bytes, out.to) {
            log::debug!("send to {} failed: {err}", out.to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_minute_is_in_range() {
        assert!(wall_clock_minute() < 60);
    }

    #[test]
    fn dispatch_drops_unknown_tag() {
        let mut dir = Directory::new();
        let addr = "127.0.0.1:1".parse().unwrap();
        let out = dispatch(&mut dir, &9999u32.to_le_bytes(), addr, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn dispatch_drops_truncated_datagram() {
        let mut dir = Directory::new();
        let addr = "127.0.0.1:1".parse().unwrap();
        let out = dispatch(&mut dir, &[1, 2], addr, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn dispatch_routes_login_to_client_handler() {
        let mut dir = Directory::new();
        let addr = "127.0.0.1:1".parse().unwrap();
        let req = ClientRequest::Login {
            username: codec::Username::new("alice"),
        };
        let bytes = req.encode();
        let out = dispatch(&mut dir, &bytes, addr, 0);
        assert!(out.is_empty());
        assert!(dir.is_logged_in("127.0.0.1:1"));
    }
}

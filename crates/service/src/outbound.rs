use std::net::SocketAddr;

use bytes::BytesMut;

/// One datagram to send, fire-and-forget (spec §5). The event loop
/// sends each and ignores failures; handlers never learn whether a
/// send succeeded.
pub struct Outbound {
    pub to: SocketAddr,
    pub bytes: BytesMut,
}

impl Outbound {
    pub fn new(to: SocketAddr, bytes: BytesMut) -> Self {
        Self { to, bytes }
    }
}

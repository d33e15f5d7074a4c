//! The 4-byte little-endian tag every datagram begins with.
//!
//! Numbering is fixed once here and never renumbered (see SPEC_FULL.md
//! §4.1): it mirrors the order packet kinds are listed in spec §6
//! (client→server, then server→client, then server→server).

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Tag {
    ReqLogin = 0,
    ReqLogout = 1,
    ReqJoin = 2,
    ReqLeave = 3,
    ReqSay = 4,
    ReqList = 5,
    ReqWho = 6,
    ReqKeepAlive = 7,
    ReqVerify = 8,

    TxtSay = 9,
    TxtList = 10,
    TxtWho = 11,
    TxtError = 12,
    TxtVerify = 13,

    ReqS2sJoin = 14,
    ReqS2sLeave = 15,
    ReqS2sSay = 16,
    ReqS2sList = 17,
    ReqS2sWho = 18,
    ReqS2sLeaf = 19,
    ReqS2sVerify = 20,
    ReqS2sKeepAlive = 21,
}

impl Tag {
    /// Read the tag from the first 4 bytes of a datagram, little-endian.
    /// Returns `None` for anything shorter than 4 bytes or an unknown
    /// value (spec §7.3: unknown tags are silently dropped).
    pub fn peek(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Tag::try_from(u32::from_le_bytes(raw)).ok()
    }

    pub fn write(self, bytes: &mut bytes::BytesMut) {
        use bytes::BufMut;
        bytes.put_u32_le(self.into());
    }

    /// Is this tag one a client is allowed to send to the server?
    pub fn is_client_facing(self) -> bool {
        matches!(
            self,
            Tag::ReqLogin
                | Tag::ReqLogout
                | Tag::ReqJoin
                | Tag::ReqLeave
                | Tag::ReqSay
                | Tag::ReqList
                | Tag::ReqWho
                | Tag::ReqKeepAlive
                | Tag::ReqVerify
        )
    }

    /// Is this tag one a peer server is allowed to send?
    pub fn is_peer_facing(self) -> bool {
        matches!(
            self,
            Tag::ReqS2sJoin
                | Tag::ReqS2sLeave
                | Tag::ReqS2sSay
                | Tag::ReqS2sList
                | Tag::ReqS2sWho
                | Tag::ReqS2sLeaf
                | Tag::ReqS2sVerify
                | Tag::ReqS2sKeepAlive
        )
    }
}

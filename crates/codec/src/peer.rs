//! Server → server request packets (spec §4.4, §6).
//!
//! `PeerRequest::List`/`Who`/`Verify` are gather packets: they carry
//! both their accumulated result so far and the remaining to-visit
//! set, so each node handles them exactly once and terminates without
//! a broadcast fan-out (spec §4.4).

use bytes::{BufMut, BytesMut};

use crate::{ChannelName, Cursor, Endpoint, Error, SayText, Tag, Username, write_fixed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    Join {
        channel: ChannelName,
    },
    Leave {
        channel: ChannelName,
    },
    Say {
        id: u64,
        channel: ChannelName,
        username: Username,
        text: SayText,
    },
    List {
        id: u64,
        requester: Endpoint,
        channels_so_far: Vec<ChannelName>,
        to_visit: Vec<Endpoint>,
    },
    Who {
        id: u64,
        channel: ChannelName,
        requester: Endpoint,
        users_so_far: Vec<Username>,
        to_visit: Vec<Endpoint>,
    },
    Leaf {
        id: u64,
        channel: ChannelName,
    },
    Verify {
        id: u64,
        username: Username,
        requester: Endpoint,
        to_visit: Vec<Endpoint>,
    },
    KeepAlive,
}

impl PeerRequest {
    pub fn decode(tag: Tag, body: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(body);

        Ok(match tag {
            Tag::ReqS2sJoin => PeerRequest::Join {
                channel: cursor.read_fixed()?,
            },
            Tag::ReqS2sLeave => PeerRequest::Leave {
                channel: cursor.read_fixed()?,
            },
            Tag::ReqS2sSay => {
                let id = cursor.read_u64()?;
                let channel = cursor.read_fixed()?;
                let username = cursor.read_fixed()?;
                let text = cursor.read_fixed()?;
                PeerRequest::Say {
                    id,
                    channel,
                    username,
                    text,
                }
            }
            Tag::ReqS2sList => {
                let id = cursor.read_u64()?;
                let requester = cursor.read_fixed()?;
                let n_channels = cursor.read_i32()?;
                let n_to_visit = cursor.read_i32()?;
                let n_channels = non_negative(n_channels)?;
                let n_to_visit = non_negative(n_to_visit)?;
                check_fits(&cursor, n_channels, crate::CHANNEL_MAX, n_to_visit, crate::IP_MAX)?;
                let channels_so_far = cursor.read_vec(n_channels)?;
                let to_visit = cursor.read_vec(n_to_visit)?;
                PeerRequest::List {
                    id,
                    requester,
                    channels_so_far,
                    to_visit,
                }
            }
            Tag::ReqS2sWho => {
                let id = cursor.read_u64()?;
                let channel = cursor.read_fixed()?;
                let requester = cursor.read_fixed()?;
                let n_users = cursor.read_i32()?;
                let n_to_visit = cursor.read_i32()?;
                let n_users = non_negative(n_users)?;
                let n_to_visit = non_negative(n_to_visit)?;
                check_fits(&cursor, n_users, crate::USERNAME_MAX, n_to_visit, crate::IP_MAX)?;
                let users_so_far = cursor.read_vec(n_users)?;
                let to_visit = cursor.read_vec(n_to_visit)?;
                PeerRequest::Who {
                    id,
                    channel,
                    requester,
                    users_so_far,
                    to_visit,
                }
            }
            Tag::ReqS2sLeaf => {
                let id = cursor.read_u64()?;
                let channel = cursor.read_fixed()?;
                PeerRequest::Leaf { id, channel }
            }
            Tag::ReqS2sVerify => {
                let id = cursor.read_u64()?;
                let username = cursor.read_fixed()?;
                let requester = cursor.read_fixed()?;
                let n_to_visit = cursor.read_count(crate::IP_MAX)?;
                let to_visit = cursor.read_vec(n_to_visit)?;
                PeerRequest::Verify {
                    id,
                    username,
                    requester,
                    to_visit,
                }
            }
            Tag::ReqS2sKeepAlive => PeerRequest::KeepAlive,
            _ => return Err(Error::UnknownTag),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut bytes = BytesMut::new();

        match self {
            PeerRequest::Join { channel } => {
                Tag::ReqS2sJoin.write(&mut bytes);
                write_fixed(&mut bytes, channel);
            }
            PeerRequest::Leave { channel } => {
                Tag::ReqS2sLeave.write(&mut bytes);
                write_fixed(&mut bytes, channel);
            }
            PeerRequest::Say {
                id,
                channel,
                username,
                text,
            } => {
                Tag::ReqS2sSay.write(&mut bytes);
                bytes.put_u64_le(*id);
                write_fixed(&mut bytes, channel);
                write_fixed(&mut bytes, username);
                write_fixed(&mut bytes, text);
            }
            PeerRequest::List {
                id,
                requester,
                channels_so_far,
                to_visit,
            } => {
                Tag::ReqS2sList.write(&mut bytes);
                bytes.put_u64_le(*id);
                write_fixed(&mut bytes, requester);
                bytes.put_i32_le(channels_so_far.len() as i32);
                bytes.put_i32_le(to_visit.len() as i32);
                for channel in channels_so_far {
                    write_fixed(&mut bytes, channel);
                }
                for endpoint in to_visit {
                    write_fixed(&mut bytes, endpoint);
                }
            }
            PeerRequest::Who {
                id,
                channel,
                requester,
                users_so_far,
                to_visit,
            } => {
                Tag::ReqS2sWho.write(&mut bytes);
                bytes.put_u64_le(*id);
                write_fixed(&mut bytes, channel);
                write_fixed(&mut bytes, requester);
                bytes.put_i32_le(users_so_far.len() as i32);
                bytes.put_i32_le(to_visit.len() as i32);
                for username in users_so_far {
                    write_fixed(&mut bytes, username);
                }
                for endpoint in to_visit {
                    write_fixed(&mut bytes, endpoint);
                }
            }
            PeerRequest::Leaf { id, channel } => {
                Tag::ReqS2sLeaf.write(&mut bytes);
                bytes.put_u64_le(*id);
                write_fixed(&mut bytes, channel);
            }
            PeerRequest::Verify {
                id,
                username,
                requester,
                to_visit,
            } => {
                Tag::ReqS2sVerify.write(&mut bytes);
                bytes.put_u64_le(*id);
                write_fixed(&mut bytes, username);
                write_fixed(&mut bytes, requester);
                bytes.put_i32_le(to_visit.len() as i32);
                for endpoint in to_visit {
                    write_fixed(&mut bytes, endpoint);
                }
            }
            PeerRequest::KeepAlive => Tag::ReqS2sKeepAlive.write(&mut bytes),
        }

        bytes
    }
}

fn non_negative(n: i32) -> Result<usize, Error> {
    if n < 0 {
        return Err(Error::CountOverflow);
    }
    Ok(n as usize)
}

/// Check that two trailing arrays of possibly different element sizes
/// both fit in what's left of the datagram, without consuming it.
fn check_fits(
    cursor: &Cursor<'_>,
    count_a: usize,
    size_a: usize,
    count_b: usize,
    size_b: usize,
) -> Result<(), Error> {
    let bytes_a = count_a.checked_mul(size_a).ok_or(Error::CountOverflow)?;
    let bytes_b = count_b.checked_mul(size_b).ok_or(Error::CountOverflow)?;
    let needed = bytes_a.checked_add(bytes_b).ok_or(Error::CountOverflow)?;
    if needed > cursor.remaining() {
        return Err(Error::CountOverflow);
    }
    Ok(())
}

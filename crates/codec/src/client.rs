//! Client → server request packets (spec §6).

use bytes::BytesMut;

use crate::{ChannelName, Cursor, Error, SayText, Tag, Username, write_fixed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Login { username: Username },
    Logout,
    Join { channel: ChannelName },
    Leave { channel: ChannelName },
    Say { channel: ChannelName, text: SayText },
    List,
    Who { channel: ChannelName },
    KeepAlive,
    Verify { username: Username },
}

impl ClientRequest {
    /// Decode a client request body. `tag` must already have been
    /// peeked from the datagram and matched
    /// [`Tag::is_client_facing`].
    pub fn decode(tag: Tag, body: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(body);

        Ok(match tag {
            Tag::ReqLogin => ClientRequest::Login {
                username: cursor.read_fixed()?,
            },
            Tag::ReqLogout => ClientRequest::Logout,
            Tag::ReqJoin => ClientRequest::Join {
                channel: cursor.read_fixed()?,
            },
            Tag::ReqLeave => ClientRequest::Leave {
                channel: cursor.read_fixed()?,
            },
            Tag::ReqSay => {
                let channel = cursor.read_fixed()?;
                let text = cursor.read_fixed()?;
                ClientRequest::Say { channel, text }
            }
            Tag::ReqList => ClientRequest::List,
            Tag::ReqWho => ClientRequest::Who {
                channel: cursor.read_fixed()?,
            },
            Tag::ReqKeepAlive => ClientRequest::KeepAlive,
            Tag::ReqVerify => ClientRequest::Verify {
                username: cursor.read_fixed()?,
            },
            _ => return Err(Error::UnknownTag),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut bytes = BytesMut::new();

        match self {
            ClientRequest::Login { username } => {
                Tag::ReqLogin.write(&mut bytes);
                write_fixed(&mut bytes, username);
            }
            ClientRequest::Logout => Tag::ReqLogout.write(&mut bytes),
            ClientRequest::Join { channel } => {
                Tag::ReqJoin.write(&mut bytes);
                write_fixed(&mut bytes, channel);
            }
            ClientRequest::Leave { channel } => {
                Tag::ReqLeave.write(&mut bytes);
                write_fixed(&mut bytes, channel);
            }
            ClientRequest::Say { channel, text } => {
                Tag::ReqSay.write(&mut bytes);
                write_fixed(&mut bytes, channel);
                write_fixed(&mut bytes, text);
            }
            ClientRequest::List => Tag::ReqList.write(&mut bytes),
            ClientRequest::Who { channel } => {
                Tag::ReqWho.write(&mut bytes);
                write_fixed(&mut bytes, channel);
            }
            ClientRequest::KeepAlive => Tag::ReqKeepAlive.write(&mut bytes),
            ClientRequest::Verify { username } => {
                Tag::ReqVerify.write(&mut bytes);
                write_fixed(&mut bytes, username);
            }
        }

        bytes
    }
}

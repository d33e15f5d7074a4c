//! Server → client reply packets (spec §6).

use bytes::{BufMut, BytesMut};

use crate::{ChannelName, Cursor, Error, SayText, Tag, Username, write_fixed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerText {
    Say {
        channel: ChannelName,
        username: Username,
        text: SayText,
    },
    List {
        channels: Vec<ChannelName>,
    },
    Who {
        channel: ChannelName,
        usernames: Vec<Username>,
    },
    Error {
        text: SayText,
    },
    Verify {
        valid: bool,
    },
}

impl ServerText {
    pub fn decode(tag: Tag, body: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(body);

        Ok(match tag {
            Tag::TxtSay => {
                let channel = cursor.read_fixed()?;
                let username = cursor.read_fixed()?;
                let text = cursor.read_fixed()?;
                ServerText::Say {
                    channel,
                    username,
                    text,
                }
            }
            Tag::TxtList => {
                let count = cursor.read_count(crate::CHANNEL_MAX)?;
                let channels = cursor.read_vec(count)?;
                ServerText::List { channels }
            }
            Tag::TxtWho => {
                let channel = cursor.read_fixed()?;
                let count = cursor.read_count(crate::USERNAME_MAX)?;
                let usernames = cursor.read_vec(count)?;
                ServerText::Who { channel, usernames }
            }
            Tag::TxtError => ServerText::Error {
                text: cursor.read_fixed()?,
            },
            Tag::TxtVerify => {
                let valid = cursor.read_u32()?;
                ServerText::Verify { valid: valid != 0 }
            }
            _ => return Err(Error::UnknownTag),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut bytes = BytesMut::new();

        match self {
            ServerText::Say {
                channel,
                username,
                text,
            } => {
                Tag::TxtSay.write(&mut bytes);
                write_fixed(&mut bytes, channel);
                write_fixed(&mut bytes, username);
                write_fixed(&mut bytes, text);
            }
            ServerText::List { channels } => {
                Tag::TxtList.write(&mut bytes);
                bytes.put_i32_le(channels.len() as i32);
                for channel in channels {
                    write_fixed(&mut bytes, channel);
                }
            }
            ServerText::Who { channel, usernames } => {
                Tag::TxtWho.write(&mut bytes);
                write_fixed(&mut bytes, channel);
                bytes.put_i32_le(usernames.len() as i32);
                for username in usernames {
                    write_fixed(&mut bytes, username);
                }
            }
            ServerText::Error { text } => {
                Tag::TxtError.write(&mut bytes);
                write_fixed(&mut bytes, text);
            }
            ServerText::Verify { valid } => {
                Tag::TxtVerify.write(&mut bytes);
                bytes.put_u32_le(*valid as u32);
            }
        }

        bytes
    }

    /// Build a `TXT_ERROR` carrying `text`, truncated to `SAY_MAX - 1`
    /// bytes like every other fixed field on the wire.
    pub fn error(text: &str) -> Self {
        ServerText::Error {
            text: SayText::new(text),
        }
    }
}

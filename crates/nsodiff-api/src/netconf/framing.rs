// NETCONF message framing (RFC 6242).
//
// base:1.0 peers delimit messages with `]]>]]>`; once both sides advertise
// base:1.1 every message after the hello uses chunked framing:
// `\n#<len>\n<bytes>` repeated, closed by `\n##\n`.

use crate::error::Error;

/// End-of-message marker for base:1.0 framing.
pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";

const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    EndOfMessage,
    Chunked,
}

impl Framing {
    /// Frame one outgoing message.
    pub fn encode(self, message: &str) -> Vec<u8> {
        match self {
            Self::EndOfMessage => {
                let mut out = Vec::with_capacity(message.len() + END_OF_MESSAGE.len());
                out.extend_from_slice(message.as_bytes());
                out.extend_from_slice(END_OF_MESSAGE);
                out
            }
            Self::Chunked => {
                let header = format!("\n#{}\n", message.len());
                let mut out = Vec::with_capacity(header.len() + message.len() + 4);
                out.extend_from_slice(header.as_bytes());
                out.extend_from_slice(message.as_bytes());
                out.extend_from_slice(b"\n##\n");
                out
            }
        }
    }

    /// Pull the first complete message out of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched while the message is
    /// still incomplete. Consumed bytes are drained on success.
    pub fn decode(self, buf: &mut Vec<u8>) -> Result<Option<String>, Error> {
        match self {
            Self::EndOfMessage => Ok(decode_end_of_message(buf)),
            Self::Chunked => decode_chunked(buf),
        }
    }
}

fn decode_end_of_message(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf
        .windows(END_OF_MESSAGE.len())
        .position(|w| w == END_OF_MESSAGE)?;
    let message = String::from_utf8_lossy(&buf[..pos]).into_owned();
    buf.drain(..pos + END_OF_MESSAGE.len());
    Some(message)
}

fn decode_chunked(buf: &mut Vec<u8>) -> Result<Option<String>, Error> {
    let mut cursor = 0;
    let mut message = Vec::new();

    loop {
        // Every chunk header and the end marker start with "\n#".
        let Some(header) = buf.get(cursor..cursor + 2) else {
            return Ok(None);
        };
        if header != b"\n#" {
            return Err(Error::Framing(format!(
                "expected chunk header at byte {cursor}, found {:?}",
                String::from_utf8_lossy(header)
            )));
        }
        cursor += 2;

        match buf.get(cursor) {
            None => return Ok(None),
            Some(b'#') => match buf.get(cursor + 1) {
                None => return Ok(None),
                Some(b'\n') => {
                    buf.drain(..cursor + 2);
                    return Ok(Some(String::from_utf8_lossy(&message).into_owned()));
                }
                Some(other) => {
                    return Err(Error::Framing(format!(
                        "malformed end-of-chunks marker (byte {other:#04x})"
                    )));
                }
            },
            Some(_) => {}
        }

        let Some(newline) = buf[cursor..].iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let digits = &buf[cursor..cursor + newline];
        let size = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|n| (1..=MAX_CHUNK_SIZE).contains(n))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::Framing(format!(
                    "invalid chunk size {:?}",
                    String::from_utf8_lossy(digits)
                ))
            })?;
        cursor += newline + 1;

        let Some(chunk) = buf.get(cursor..cursor + size) else {
            return Ok(None);
        };
        message.extend_from_slice(chunk);
        cursor += size;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn end_of_message_waits_for_marker() {
        let mut buf = b"<hello/>]]>".to_vec();
        assert_eq!(Framing::EndOfMessage.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"]]><rpc-reply/>");
        assert_eq!(
            Framing::EndOfMessage.decode(&mut buf).unwrap().as_deref(),
            Some("<hello/>")
        );
        assert_eq!(buf, b"<rpc-reply/>");
    }

    #[test]
    fn chunked_joins_chunks() {
        let mut buf = b"\n#4\n<rpc\n#8\n-reply/>\n##\ntrailing".to_vec();
        let msg = Framing::Chunked.decode(&mut buf).unwrap();
        assert_eq!(msg.as_deref(), Some("<rpc-reply/>"));
        assert_eq!(buf, b"trailing");
    }

    #[test]
    fn chunked_incomplete_leaves_buffer() {
        let mut buf = b"\n#12\n<rpc-re".to_vec();
        assert_eq!(Framing::Chunked.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn chunked_rejects_garbage_header() {
        let mut buf = b"<rpc-reply/>".to_vec();
        assert!(matches!(
            Framing::Chunked.decode(&mut buf),
            Err(Error::Framing(_))
        ));

        let mut buf = b"\n#0\n\n##\n".to_vec();
        assert!(matches!(
            Framing::Chunked.decode(&mut buf),
            Err(Error::Framing(_))
        ));
    }

    #[test]
    fn chunked_encode_decodes_back() {
        let mut buf = Framing::Chunked.encode("<close-session/>");
        assert_eq!(
            Framing::Chunked.decode(&mut buf).unwrap().as_deref(),
            Some("<close-session/>")
        );
        assert!(buf.is_empty());
    }
}

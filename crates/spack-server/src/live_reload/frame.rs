//! WebSocket framing, restricted to the live-reload subset.
//!
//! Only single, final frames with a 7-bit payload length (under 126 bytes)
//! are supported. Server frames are never masked; text and ping frames from
//! the client must be.

/// Text frame opcode.
pub(crate) const OP_TEXT: u8 = 0x1;
/// Close frame opcode.
pub(crate) const OP_CLOSE: u8 = 0x8;
/// Ping frame opcode.
pub(crate) const OP_PING: u8 = 0x9;

const FIN: u8 = 0b1000_0000;
const MASK: u8 = 0b1000_0000;
const MAX_PAYLOAD: usize = 125;

/// Frame that cannot be handled by the live-reload channel.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// Continuation frames are not supported.
    #[error("Fragmented frames are not supported")]
    NotFinal,

    /// Client text and ping frames must be masked.
    #[error("Client frame is not masked")]
    Unmasked,

    /// Extended payload lengths are not supported.
    #[error("Payload of {len} bytes exceeds the 125 byte limit")]
    PayloadTooLarge {
        /// Declared or actual payload length.
        len: usize,
    },

    /// Text payload is not valid UTF-8.
    #[error("Text payload is not valid UTF-8")]
    InvalidUtf8,
}

/// A decoded client frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Close,
    /// Any other opcode; carries no usable payload.
    Unsupported(u8),
}

/// Encode a final, unmasked server frame.
pub(crate) fn encode(payload: &[u8], opcode: u8) -> Result<Vec<u8>, FrameError> {
    let len = u8::try_from(payload.len())
        .ok()
        .filter(|&len| usize::from(len) <= MAX_PAYLOAD)
        .ok_or(FrameError::PayloadTooLarge { len: payload.len() })?;

    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.push(FIN | (opcode & 0x0F));
    frame.push(len);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encode a text frame.
pub(crate) fn text(payload: &str) -> Result<Vec<u8>, FrameError> {
    encode(payload.as_bytes(), OP_TEXT)
}

/// Decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` while the frame is incomplete, otherwise the frame and
/// the number of bytes it occupied.
pub(crate) fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    let [first, second, ..] = *buf else {
        return Ok(None);
    };

    if first & FIN == 0 {
        return Err(FrameError::NotFinal);
    }
    let opcode = first & 0x0F;
    let masked = second & MASK != 0;
    let len = usize::from(second & 0x7F);

    if len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge { len });
    }
    if matches!(opcode, OP_TEXT | OP_PING) && !masked {
        return Err(FrameError::Unmasked);
    }

    let header = if masked { 6 } else { 2 };
    let total = header + len;
    if buf.len() < total {
        return Ok(None);
    }

    let mut payload = buf[header..total].to_vec();
    if masked {
        let key = &buf[2..6];
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    let frame = match opcode {
        OP_TEXT => Frame::Text(String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?),
        OP_PING => Frame::Ping(payload),
        OP_CLOSE => Frame::Close,
        other => Frame::Unsupported(other),
    };
    Ok(Some((frame, total)))
}

#[cfg(test)]
pub(crate) fn masked(payload: &[u8], opcode: u8, key: [u8; 4]) -> Vec<u8> {
    let mut frame = vec![FIN | opcode, MASK | u8::try_from(payload.len()).unwrap()];
    frame.extend_from_slice(&key);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_encode_text() {
        assert_eq!(text("update").unwrap(), b"\x81\x06update".to_vec());
        assert_eq!(encode(b"", OP_PING).unwrap(), vec![0x89, 0x00]);
    }

    #[test]
    fn test_encode_rejects_extended_length() {
        assert!(encode(&[b'a'; 125], OP_TEXT).is_ok());
        assert_eq!(
            encode(&[b'a'; 126], OP_TEXT),
            Err(FrameError::PayloadTooLarge { len: 126 })
        );
    }

    #[test]
    fn test_decode_masked_text() {
        let frame = masked(b"watch:home", OP_TEXT, KEY);

        let (decoded, used) = decode(&frame).unwrap().unwrap();

        assert_eq!(decoded, Frame::Text("watch:home".to_owned()));
        assert_eq!(used, 16);
    }

    #[test]
    fn test_decode_rfc_example() {
        // Masked "Hello" from RFC 6455 section 5.7.
        let frame = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        assert_eq!(
            decode(&frame).unwrap(),
            Some((Frame::Text("Hello".to_owned()), 11))
        );
    }

    #[test]
    fn test_decode_incomplete() {
        let frame = masked(b"watch:home", OP_TEXT, KEY);
        assert_eq!(decode(&frame[..1]), Ok(None));
        assert_eq!(decode(&frame[..9]), Ok(None));
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = masked(b"a", OP_TEXT, KEY);
        buf.extend(masked(b"b", OP_TEXT, KEY));

        let (_, used) = decode(&buf).unwrap().unwrap();
        assert_eq!(decode(&buf[used..]).unwrap().unwrap().0, Frame::Text("b".to_owned()));
    }

    #[test]
    fn test_decode_rejects_unsupported_shapes() {
        assert_eq!(decode(&[0x01, 0x80, 0, 0, 0, 0]), Err(FrameError::NotFinal));
        assert_eq!(decode(b"\x81\x02hi"), Err(FrameError::Unmasked));
        assert_eq!(
            decode(&[0x81, 0xFE, 0, 200]),
            Err(FrameError::PayloadTooLarge { len: 126 })
        );
        assert_eq!(
            decode(&masked(&[0xff, 0xfe], OP_TEXT, KEY)),
            Err(FrameError::InvalidUtf8)
        );
    }

    #[test]
    fn test_decode_control_frames() {
        assert_eq!(
            decode(&masked(b"hb", OP_PING, KEY)).unwrap(),
            Some((Frame::Ping(b"hb".to_vec()), 8))
        );
        assert_eq!(
            decode(&masked(&[0x03, 0xe8], OP_CLOSE, KEY)).unwrap(),
            Some((Frame::Close, 8))
        );
        // Binary frames carry nothing the channel understands.
        assert_eq!(decode(&[0x82, 0x00]).unwrap(), Some((Frame::Unsupported(2), 2)));
    }
}

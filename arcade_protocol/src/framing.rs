// Length-delimited message framing over TCP.
//
// Wire format: a 4-byte big-endian length prefix, then the JSON payload.
// `write_message` and `read_message` move raw bytes only; `send` and `recv`
// add the JSON step for any serde type.
//
// `MAX_MESSAGE_SIZE` bounds the allocation a malformed length prefix can
// cause. The largest real frame is a maze `start_round`: a default 31x21
// layout is about 26 KB of JSON, and `ArcadeConfig::validate` caps the grid at
// `arcade_sim::maze::MAX_CELLS` so the largest allowed layout still fits.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum allowed frame size (64 KiB).
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024;

/// Write a length-delimited message: 4-byte big-endian length, then payload.
pub fn write_message<W: Write>(writer: &mut W, msg: &[u8]) -> io::Result<()> {
    let len = u32::try_from(msg.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large: {} bytes (max {MAX_MESSAGE_SIZE})",
                    msg.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(msg)?;
    writer.flush()
}

/// Read a length-delimited message.
///
/// `UnexpectedEof` if the stream closes before or inside a frame,
/// `InvalidData` if the prefix exceeds `MAX_MESSAGE_SIZE`.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_be_bytes(prefix);
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Serialize `msg` to JSON and write it as one frame.
pub fn send<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let json = serde_json::to_vec(msg).map_err(io::Error::other)?;
    write_message(writer, &json)
}

/// Read one frame and decode it. A frame that is not a valid `T` is
/// `InvalidData`.
pub fn recv<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let bytes = read_message(reader)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_simple_frame() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"hello, host!").unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 12]);
        let recovered = read_message(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(recovered, b"hello, host!");
    }

    #[test]
    fn empty_frame() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"").unwrap();
        let recovered = read_message(&mut Cursor::new(&buf)).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_MESSAGE_SIZE as usize + 1];
        let err = write_message(&mut Vec::new(), &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_oversized_read() {
        let prefix = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let err = read_message(&mut Cursor::new(prefix.to_vec())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_prefix_is_eof() {
        let err = read_message(&mut Cursor::new(vec![0u8, 1])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn truncated_payload_is_eof() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"abcdef").unwrap();
        buf.truncate(7);
        let err = read_message(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_payload_is_invalid_data() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"{not json").unwrap();
        let err = recv::<_, crate::ClientMessage>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn frames_in_sequence() {
        let mut buf = Vec::new();
        for msg in [&b"first"[..], b"second", b"third"] {
            write_message(&mut buf, msg).unwrap();
        }
        let mut cursor = Cursor::new(&buf);
        for expected in [&b"first"[..], b"second", b"third"] {
            assert_eq!(read_message(&mut cursor).unwrap(), expected);
        }
    }
}

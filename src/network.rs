// Framing: every message is a little-endian u32 length followed by that many
// bytes of UTF-8 JSON. A frame that cannot be decoded into the expected message
// shape is a protocol fault and the connection must be dropped.

use std::io;

use byteorder::{ByteOrder, LittleEndian};
use serde::{de, Serialize};


pub const DEFAULT_PORT: u16 = 38741;

// Caps a single frame. Anything bigger is a malformed or hostile peer.
pub const MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

#[derive(Debug)]
pub enum CommunicationError {
    Socket(io::Error),
    Malformed(String),
}

impl From<io::Error> for CommunicationError {
    fn from(err: io::Error) -> Self { CommunicationError::Socket(err) }
}

impl From<serde_json::Error> for CommunicationError {
    fn from(err: serde_json::Error) -> Self {
        CommunicationError::Malformed(err.to_string())
    }
}

pub fn write_frame(writer: &mut impl io::Write, data: &[u8]) -> io::Result<()> {
    let mut len_buf = [0u8; 4];
    LittleEndian::write_u32(&mut len_buf, data.len() as u32);
    writer.write_all(&len_buf)?;
    writer.write_all(data)?;
    writer.flush()
}

pub fn read_frame(reader: &mut impl io::Read) -> Result<Vec<u8>, CommunicationError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = LittleEndian::read_u32(&len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(CommunicationError::Malformed(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_SIZE} byte limit"
        )));
    }
    let mut content = vec![0; len as usize];
    reader.read_exact(&mut content)?;
    Ok(content)
}

pub fn write_obj<T: Serialize>(
    writer: &mut impl io::Write, obj: &T,
) -> Result<(), CommunicationError> {
    let serialized = serde_json::to_vec(obj)?;
    write_frame(writer, &serialized)?;
    Ok(())
}

pub fn read_obj<T: de::DeserializeOwned>(
    reader: &mut impl io::Read,
) -> Result<T, CommunicationError> {
    let content = read_frame(reader)?;
    Ok(serde_json::from_slice(&content)?)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_obj(&mut buf, &vec!["a".to_owned(), "b".to_owned()]).unwrap();
        write_obj(&mut buf, &42u32).unwrap();
        let mut reader = buf.as_slice();
        let strings: Vec<String> = read_obj(&mut reader).unwrap();
        assert_eq!(strings, vec!["a".to_owned(), "b".to_owned()]);
        let n: u32 = read_obj(&mut reader).unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn garbage_frame_is_malformed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"definitely not json").unwrap();
        let result: Result<u32, _> = read_obj(&mut buf.as_slice());
        assert!(matches!(result, Err(CommunicationError::Malformed(_))));
    }

    #[test]
    fn truncated_frame_is_socket_error() {
        let buf = [7u8, 0, 0, 0, b'x'];
        let result: Result<u32, _> = read_obj(&mut &buf[..]);
        assert!(matches!(result, Err(CommunicationError::Socket(_))));
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, MAX_FRAME_SIZE + 1);
        let result = read_frame(&mut &buf[..]);
        assert!(matches!(result, Err(CommunicationError::Malformed(_))));
    }
}

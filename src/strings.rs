//! Length-prefixed UTF-8 strings: a signed varint byte length followed by the bytes.

use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::varint::{read_length, write_varint};

pub fn read_string(cur: &mut ByteCursor<'_>) -> Result<String, DecodeError> {
    let len = read_length(cur)?;
    let pos = cur.position();
    let bytes = cur.read_bytes(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|source| DecodeError::InvalidUtf8 { pos, source })
}

pub fn decode_string(buf: &[u8], pos: usize) -> Result<(String, usize), DecodeError> {
    let mut cur = ByteCursor::at(buf, pos);
    let s = read_string(&mut cur)?;
    Ok((s, cur.position()))
}

pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    // usize -> i64 is lossless for any in-memory string.
    write_varint(buf, s.len() as i64);
    buf.extend_from_slice(s.as_bytes());
}

pub fn encode_string(s: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 2);
    write_string(&mut buf, s);
    buf
}

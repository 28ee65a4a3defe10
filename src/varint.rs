//! Base-128 variable-length integers.
//!
//! Every byte carries 7 payload bits, least significant group first; the high bit is set on
//! all but the last byte. Signed values are zigzag mapped first so that small negative numbers
//! stay short: `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`.

use crate::cursor::ByteCursor;
use crate::error::DecodeError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Longest encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

pub fn read_uvarint(cur: &mut ByteCursor<'_>) -> Result<u64, DecodeError> {
    let start = cur.position();
    let mut out: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = cur.read_u8()?;
        let payload = byte & PAYLOAD_MASK;
        // Only one payload bit of the tenth byte still fits in 64 bits.
        if shift == 63 && payload > 1 {
            return Err(DecodeError::VarintTooLong { pos: start });
        }
        out |= (payload as u64) << shift;
        if byte & CONTINUATION == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::VarintTooLong { pos: start });
        }
    }
}

pub fn read_varint(cur: &mut ByteCursor<'_>) -> Result<i64, DecodeError> {
    read_uvarint(cur).map(zigzag_decode)
}

/// Reads a signed varint used as a count or byte length; negative values are rejected.
pub fn read_length(cur: &mut ByteCursor<'_>) -> Result<usize, DecodeError> {
    let pos = cur.position();
    let len = read_varint(cur)?;
    usize::try_from(len).map_err(|_| DecodeError::NegativeLength { pos, len })
}

/// Decodes an unsigned varint at `pos`, returning the value and the position after it.
pub fn decode_uvarint(buf: &[u8], pos: usize) -> Result<(u64, usize), DecodeError> {
    let mut cur = ByteCursor::at(buf, pos);
    let v = read_uvarint(&mut cur)?;
    Ok((v, cur.position()))
}

/// Decodes a zigzag-mapped signed varint at `pos`.
pub fn decode_varint(buf: &[u8], pos: usize) -> Result<(i64, usize), DecodeError> {
    let mut cur = ByteCursor::at(buf, pos);
    let v = read_varint(&mut cur)?;
    Ok((v, cur.position()))
}

#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

pub fn write_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= CONTINUATION as u64 {
        buf.push((v as u8) | CONTINUATION);
        v >>= 7;
    }
    buf.push(v as u8);
}

pub fn write_varint(buf: &mut Vec<u8>, v: i64) {
    write_uvarint(buf, zigzag_encode(v));
}

pub fn encode_uvarint(v: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    write_uvarint(&mut buf, v);
    buf
}

/// Zigzag maps `v` and emits its 7-bit groups, lowest-order group first.
pub fn encode_varint(v: i64) -> Vec<u8> {
    encode_uvarint(zigzag_encode(v))
}

//! Binary framing for entry (`<id>.hfs`) and index (`index.axidx`) files.
//! All multi-byte integers little-endian, per spec §6.

use std::io::{self, Read, Write};

use crate::tensor::Tensor;

pub const ENTRY_MAGIC: &[u8; 6] = b"AXHFS1";
pub const INDEX_MAGIC: &[u8; 6] = b"AXIDX1";
pub const FORMAT_VERSION: u32 = 1;
pub const MAX_DIM: u32 = 262_144;
pub const MAX_INDEX_COUNT: u32 = 1_000_000;

pub fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_i64(w: &mut impl Write, v: i64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

pub fn write_f32_slice(w: &mut impl Write, data: &[f32]) -> io::Result<()> {
    for v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64(r: &mut impl Read) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_string(r: &mut impl Read) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn read_f32_vec(r: &mut impl Read, count: usize) -> io::Result<Vec<f32>> {
    let mut out = Vec::with_capacity(count);
    let mut buf = [0u8; 4];
    for _ in 0..count {
        r.read_exact(&mut buf)?;
        out.push(f32::from_le_bytes(buf));
    }
    Ok(out)
}

/// Encode the entry file body (everything after the caller writes the
/// magic+version header) for `id`/`intent`/`content`/`utc_ticks` and the
/// two same-length vectors.
pub fn encode_entry_body(
    w: &mut impl Write,
    utc_ticks: i64,
    id: &str,
    intent: &str,
    content: &str,
    intent_vector: &Tensor,
    payload_vector: &Tensor,
) -> io::Result<()> {
    write_i64(w, utc_ticks)?;
    write_string(w, id)?;
    write_string(w, intent)?;
    write_string(w, content)?;
    write_u32(w, intent_vector.len() as u32)?;
    write_f32_slice(w, intent_vector.as_slice())?;
    write_f32_slice(w, payload_vector.as_slice())?;
    Ok(())
}

pub struct DecodedEntryBody {
    pub utc_ticks: i64,
    pub id: String,
    pub intent: String,
    pub content: String,
    pub intent_vector: Tensor,
    pub payload_vector: Tensor,
}

pub fn decode_entry_body(r: &mut impl Read) -> io::Result<DecodedEntryBody> {
    let utc_ticks = read_i64(r)?;
    let id = read_string(r)?;
    let intent = read_string(r)?;
    let content = read_string(r)?;
    let dim = read_u32(r)? as usize;
    let intent_vector = Tensor::from_vec(read_f32_vec(r, dim)?);
    let payload_vector = Tensor::from_vec(read_f32_vec(r, dim)?);
    Ok(DecodedEntryBody {
        utc_ticks,
        id,
        intent,
        content,
        intent_vector,
        payload_vector,
    })
}

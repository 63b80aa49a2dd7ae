//! OSC decoding
//!
//! Zero-copy cursor over the received datagram. Every failure is reported as
//! [`Error::MalformedPacket`] so the transport can log and drop the datagram.

use super::{BUNDLE_TAG, OscBundle, OscMessage, OscPacket, OscType, TimeTag, pad4};
use crate::error::{Error, Result};

/// Nested bundles beyond this depth are rejected to bound recursion
const MAX_BUNDLE_DEPTH: usize = 32;

/// Decode a datagram into a message or bundle
pub fn decode(data: &[u8]) -> Result<OscPacket> {
    decode_packet(data, 0)
}

fn decode_packet(data: &[u8], depth: usize) -> Result<OscPacket> {
    if data.is_empty() {
        return Err(malformed("empty packet"));
    }
    if data.len() % 4 != 0 {
        return Err(malformed(format!(
            "packet length {} is not 4-byte aligned",
            data.len()
        )));
    }

    if data.starts_with(BUNDLE_TAG) {
        decode_bundle(data, depth).map(OscPacket::Bundle)
    } else if data[0] == b'/' {
        decode_message(data).map(OscPacket::Message)
    } else {
        Err(malformed(format!(
            "packet starts with neither '/' nor bundle tag (0x{:02x})",
            data[0]
        )))
    }
}

fn decode_message(data: &[u8]) -> Result<OscMessage> {
    let mut cursor = Cursor::new(data);
    let address = cursor.read_string()?.to_string();

    // Legacy OSC: a message may omit the type tag string entirely
    if cursor.is_empty() {
        return Ok(OscMessage::new(address, Vec::new()));
    }

    let tags = cursor.read_string()?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(malformed(format!("type tag string missing ',': {:?}", tags)));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscType::Int(i32::from_be_bytes(cursor.read_array()?)),
            'h' => OscType::Long(i64::from_be_bytes(cursor.read_array()?)),
            'f' => OscType::Float(f32::from_be_bytes(cursor.read_array()?)),
            'd' => OscType::Double(f64::from_be_bytes(cursor.read_array()?)),
            's' | 'S' => OscType::String(cursor.read_string()?.to_string()),
            'b' => OscType::Blob(cursor.read_blob()?.to_vec()),
            'T' => OscType::Bool(true),
            'F' => OscType::Bool(false),
            'N' => OscType::Nil,
            other => {
                return Err(malformed(format!("unknown type tag '{}' in {:?}", other, address)));
            }
        };
        args.push(arg);
    }

    Ok(OscMessage::new(address, args))
}

fn decode_bundle(data: &[u8], depth: usize) -> Result<OscBundle> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(malformed(format!("bundle nesting exceeds {}", MAX_BUNDLE_DEPTH)));
    }

    let mut cursor = Cursor::new(data);
    cursor.skip(BUNDLE_TAG.len())?;
    let timetag = TimeTag(u64::from_be_bytes(cursor.read_array()?));

    let mut content = Vec::new();
    while !cursor.is_empty() {
        let size = u32::from_be_bytes(cursor.read_array()?) as usize;
        let element = cursor.take(size)?;
        content.push(decode_packet(element, depth + 1)?);
    }

    Ok(OscBundle { timetag, content })
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedPacket(reason.into())
}

/// Read position over a datagram
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(malformed(format!(
                "truncated: need {} bytes at offset {}, have {}",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_string(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(malformed(format!("unterminated string at offset {}", self.pos)));
        };
        let start = self.pos;
        // Consume the terminator and its padding
        self.skip(pad4(nul + 1))?;
        std::str::from_utf8(&self.data[start..start + nul])
            .map_err(|e| malformed(format!("invalid UTF-8 string at offset {}: {}", start, e)))
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let size = u32::from_be_bytes(self.read_array()?) as usize;
        let blob = self.take(size)?;
        self.skip(pad4(size) - size)?;
        Ok(blob)
    }
}

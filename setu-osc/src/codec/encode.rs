//! OSC encoding

use super::{BUNDLE_TAG, OscBundle, OscPacket, OscType, pad4};
use crate::error::{Error, Result};

/// Encode a single message
///
/// Fails with [`Error::Encoding`] when the address is not a valid OSC
/// address or an argument cannot be represented on the wire.
pub fn encode_message(address: &str, args: &[OscType]) -> Result<Vec<u8>> {
    if !address.starts_with('/') {
        return Err(Error::Encoding(format!(
            "address must start with '/': {:?}",
            address
        )));
    }

    // Address + tags + 8 bytes per argument covers the common case
    let mut buf = Vec::with_capacity(pad4(address.len() + 1) + pad4(args.len() + 2) + args.len() * 8);
    write_string(&mut buf, address)?;

    let mut tags = String::with_capacity(args.len() + 1);
    tags.push(',');
    tags.extend(args.iter().map(OscType::tag));
    write_string(&mut buf, &tags)?;

    for arg in args {
        match arg {
            OscType::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscType::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscType::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscType::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscType::String(s) => write_string(&mut buf, s)?,
            OscType::Blob(data) => write_blob(&mut buf, data)?,
            // Payload lives entirely in the type tag
            OscType::Bool(_) | OscType::Nil => {}
        }
    }

    Ok(buf)
}

/// Encode a bundle, recursively encoding its elements
pub fn encode_bundle(bundle: &OscBundle) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    buf.extend_from_slice(BUNDLE_TAG);
    buf.extend_from_slice(&bundle.timetag.0.to_be_bytes());

    for item in &bundle.content {
        let element = encode_packet(item)?;
        let size = u32::try_from(element.len())
            .map_err(|_| Error::Encoding(format!("bundle element too large: {} bytes", element.len())))?;
        buf.extend_from_slice(&size.to_be_bytes());
        buf.extend_from_slice(&element);
    }

    Ok(buf)
}

/// Encode either packet kind
pub fn encode_packet(packet: &OscPacket) -> Result<Vec<u8>> {
    match packet {
        OscPacket::Message(msg) => encode_message(&msg.address, &msg.args),
        OscPacket::Bundle(bundle) => encode_bundle(bundle),
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(Error::Encoding(format!(
            "string contains interior NUL: {:?}",
            s
        )));
    }
    buf.extend_from_slice(s.as_bytes());
    // At least one NUL terminator, then pad to 4
    let padded = pad4(s.len() + 1);
    buf.resize(buf.len() + (padded - s.len()), 0);
    Ok(())
}

fn write_blob(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let size = u32::try_from(data.len())
        .map_err(|_| Error::Encoding(format!("blob too large: {} bytes", data.len())))?;
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(data);
    buf.resize(buf.len() + (pad4(data.len()) - data.len()), 0);
    Ok(())
}

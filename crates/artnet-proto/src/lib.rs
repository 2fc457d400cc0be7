//! Art-Net wire format: `ArtDmx` (OpOutput), `ArtPoll` and `ArtPollReply`.
//!
//! Pure encode/decode — no sockets. See the `transport` module of the main
//! crate for the receivers/senders that use this codec.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub const PORT: u16 = 6454;
pub const HEADER: &[u8; 8] = b"Art-Net\0";
pub const PROTOCOL_VERSION: u16 = 14;

const OP_DMX: u16 = 0x5000;
const OP_POLL: u16 = 0x2000;
const OP_POLL_REPLY: u16 = 0x2100;

#[derive(Debug, thiserror::Error)]
pub enum ArtNetError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("bad Art-Net header")]
    BadHeader,
    #[error("unexpected opcode 0x{0:04x}")]
    WrongOpcode(u16),
}

/// A decoded ArtDmx packet: 15-bit port-address and right-padded 512-slot data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmxPacket {
    pub sequence: u8,
    pub physical: u8,
    pub port_address: u16,
    pub data: [u8; 512],
}

/// Build an ArtDmx (OpOutput) packet for the given 15-bit port-address.
///
/// `port_address` packs Net (bits 14-8) / SubNet (bits 7-4) / Universe (bits 3-0).
pub fn encode_art_dmx(sequence: u8, port_address: u16, data: &[u8; 512]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(18 + 512);
    packet.extend_from_slice(HEADER);
    // OpCode is transmitted low byte first.
    packet.push((OP_DMX & 0xFF) as u8);
    packet.push((OP_DMX >> 8) as u8);
    let mut ver = [0u8; 2];
    BigEndian::write_u16(&mut ver, PROTOCOL_VERSION);
    packet.extend_from_slice(&ver);
    packet.push(sequence);
    packet.push(0x00); // Physical
    packet.push((port_address & 0xFF) as u8); // SubUni
    packet.push(((port_address >> 8) & 0x7F) as u8); // Net
    let mut len = [0u8; 2];
    BigEndian::write_u16(&mut len, 512);
    packet.extend_from_slice(&len);
    packet.extend_from_slice(data);
    packet
}

/// Build an ArtPoll packet requesting `ArtPollReply` from listening nodes.
pub fn encode_art_poll() -> Vec<u8> {
    let mut packet = Vec::with_capacity(14);
    packet.extend_from_slice(HEADER);
    packet.push((OP_POLL & 0xFF) as u8);
    packet.push((OP_POLL >> 8) as u8);
    let mut ver = [0u8; 2];
    BigEndian::write_u16(&mut ver, PROTOCOL_VERSION);
    packet.extend_from_slice(&ver);
    packet.push(0x00); // TalkToMe: auto
    packet.push(0x00); // Priority
    packet
}

fn check_header(data: &[u8]) -> Result<u16, ArtNetError> {
    if data.len() < 10 {
        return Err(ArtNetError::TooShort(data.len()));
    }
    if &data[0..8] != HEADER {
        return Err(ArtNetError::BadHeader);
    }
    Ok(LittleEndian::read_u16(&data[8..10]))
}

/// Decode an ArtDmx packet. Returns `Err` (never panics) on malformed input —
/// callers drop the packet silently per the input-transport contract.
pub fn decode_art_dmx(raw: &[u8]) -> Result<ArtDmxPacket, ArtNetError> {
    let opcode = check_header(raw)?;
    if opcode != OP_DMX {
        return Err(ArtNetError::WrongOpcode(opcode));
    }
    if raw.len() < 18 {
        return Err(ArtNetError::TooShort(raw.len()));
    }
    let sequence = raw[12];
    let physical = raw[13];
    let sub_uni = raw[14] as u16;
    let net = (raw[15] & 0x7F) as u16;
    let port_address = (net << 8) | sub_uni;
    let length = BigEndian::read_u16(&raw[16..18]) as usize;

    let mut data = [0u8; 512];
    let payload = &raw[18..];
    let n = length.min(payload.len()).min(512);
    data[..n].copy_from_slice(&payload[..n]);

    Ok(ArtDmxPacket {
        sequence,
        physical,
        port_address,
        data,
    })
}

/// Minimal `ArtPollReply` fields the input stack's discovery listener cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPollReply {
    pub port_address: u16,
    pub short_name: String,
    pub long_name: String,
}

pub fn decode_art_poll_reply(raw: &[u8]) -> Result<ArtPollReply, ArtNetError> {
    let opcode = check_header(raw)?;
    if opcode != OP_POLL_REPLY {
        return Err(ArtNetError::WrongOpcode(opcode));
    }
    if raw.len() < 108 {
        return Err(ArtNetError::TooShort(raw.len()));
    }
    let net = raw[18] as u16;
    let sub = raw[19] as u16;
    let port_address = (net << 8) | (sub << 4);
    let short_name = String::from_utf8_lossy(&raw[26..26 + 18])
        .trim_matches('\0')
        .to_string();
    let long_name = String::from_utf8_lossy(&raw[44..44 + 64])
        .trim_matches('\0')
        .to_string();

    Ok(ArtPollReply {
        port_address,
        short_name,
        long_name,
    })
}

/// Default mapping from a 1-indexed engine universe id to a wire port-address.
pub fn universe_to_port_address(universe_id: u32, net: u8, subnet: u8) -> u16 {
    let wire = universe_id.saturating_sub(1) & 0xF;
    ((net as u16) << 8) | ((subnet as u16) << 4) | (wire as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_art_dmx() {
        let mut data = [0u8; 512];
        data[0] = 255;
        data[511] = 7;
        let packet = encode_art_dmx(42, 0x0103, &data);
        let decoded = decode_art_dmx(&packet).unwrap();
        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.port_address, 0x0103);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn rejects_bad_header() {
        let garbage = vec![0u8; 20];
        assert!(decode_art_dmx(&garbage).is_err());
    }

    #[test]
    fn universe_mapping_is_zero_indexed_on_wire() {
        assert_eq!(universe_to_port_address(1, 0, 0), 0);
        assert_eq!(universe_to_port_address(2, 0, 0), 1);
        assert_eq!(universe_to_port_address(1, 3, 1), (3 << 8) | (1 << 4));
    }
}

//! sACN / E1.31 wire format: ACN root layer, E1.31 framing layer, DMP layer.
//!
//! Pure encode/decode — no sockets. Layout follows ANSI E1.31-2016: root
//! packet identifier at byte 4, universe at byte 113 (big-endian), start code
//! at byte 125 (must be `0`), DMX data from byte 126.

use byteorder::{BigEndian, ByteOrder};

pub const PORT: u16 = 5568;
pub const ROOT_IDENTIFIER: &[u8; 12] = b"ASC-E1.17\0\0\0";

const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
const VECTOR_E131_DATA_PACKET: u32 = 0x0000_0002;
const VECTOR_DMP_SET_PROPERTY: u8 = 0x02;
const ADDRESS_DATA_TYPE: u8 = 0xa1;
const UNIVERSE_OFFSET: usize = 113;
const START_CODE_OFFSET: usize = 125;
const DMX_DATA_OFFSET: usize = 126;
pub const PACKET_LEN: usize = DMX_DATA_OFFSET + 512;

#[derive(Debug, thiserror::Error)]
pub enum SacnError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("bad ACN root identifier")]
    BadIdentifier,
    #[error("start code {0} is not 0 (DMX512-A alternate start codes unsupported)")]
    NonZeroStartCode(u8),
}

fn flags_and_length(len: u16) -> [u8; 2] {
    // High nibble 0x7, low 12 bits are the PDU length.
    let v = 0x7000 | (len & 0x0FFF);
    let mut out = [0u8; 2];
    BigEndian::write_u16(&mut out, v);
    out
}

/// Build a DMX data packet for `universe` (1-indexed, wire-encoded as-is —
/// sACN universes are 1-indexed on the wire per spec.md §6).
pub fn encode_data_packet(
    cid: &[u8; 16],
    source_name: &str,
    priority: u8,
    sequence: u8,
    universe: u16,
    data: &[u8; 512],
) -> Vec<u8> {
    let mut packet = Vec::with_capacity(PACKET_LEN);

    // Root layer
    packet.extend_from_slice(&[0x00, 0x10]); // preamble size
    packet.extend_from_slice(&[0x00, 0x00]); // postamble size
    packet.extend_from_slice(ROOT_IDENTIFIER);
    let root_pdu_len = (PACKET_LEN - 16) as u16; // from root vector to end
    packet.extend_from_slice(&flags_and_length(root_pdu_len));
    packet.extend_from_slice(&VECTOR_ROOT_E131_DATA.to_be_bytes());
    packet.extend_from_slice(cid);

    // Framing layer
    let framing_pdu_len = (PACKET_LEN - 38) as u16;
    packet.extend_from_slice(&flags_and_length(framing_pdu_len));
    packet.extend_from_slice(&VECTOR_E131_DATA_PACKET.to_be_bytes());
    let mut name_bytes = [0u8; 64];
    let src = source_name.as_bytes();
    let n = src.len().min(63);
    name_bytes[..n].copy_from_slice(&src[..n]);
    packet.extend_from_slice(&name_bytes);
    packet.push(priority);
    packet.extend_from_slice(&[0x00, 0x00]); // sync address (unused)
    packet.push(sequence);
    packet.push(0x00); // options
    packet.extend_from_slice(&universe.to_be_bytes());

    // DMP layer
    let dmp_pdu_len = (PACKET_LEN - 115) as u16;
    packet.extend_from_slice(&flags_and_length(dmp_pdu_len));
    packet.push(VECTOR_DMP_SET_PROPERTY);
    packet.push(ADDRESS_DATA_TYPE);
    packet.extend_from_slice(&[0x00, 0x00]); // first property address
    packet.extend_from_slice(&[0x00, 0x01]); // address increment
    packet.extend_from_slice(&513u16.to_be_bytes()); // property value count
    packet.push(0x00); // DMX start code
    packet.extend_from_slice(data);

    debug_assert_eq!(packet.len(), PACKET_LEN);
    packet
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SacnDataPacket {
    pub universe: u16,
    pub sequence: u8,
    pub source_name: String,
    pub data: [u8; 512],
}

pub fn decode_data_packet(raw: &[u8]) -> Result<SacnDataPacket, SacnError> {
    if raw.len() < PACKET_LEN {
        return Err(SacnError::TooShort(raw.len()));
    }
    if &raw[4..16] != ROOT_IDENTIFIER {
        return Err(SacnError::BadIdentifier);
    }
    let start_code = raw[START_CODE_OFFSET];
    if start_code != 0 {
        return Err(SacnError::NonZeroStartCode(start_code));
    }
    let universe = BigEndian::read_u16(&raw[UNIVERSE_OFFSET..UNIVERSE_OFFSET + 2]);
    let sequence = raw[111];
    let source_name = String::from_utf8_lossy(&raw[44..44 + 64])
        .trim_matches('\0')
        .to_string();

    let mut data = [0u8; 512];
    data.copy_from_slice(&raw[DMX_DATA_OFFSET..DMX_DATA_OFFSET + 512]);

    Ok(SacnDataPacket {
        universe,
        sequence,
        source_name,
        data,
    })
}

/// Multicast group for a (1-indexed, wire) universe: `239.255.(u>>8).(u&0xFF)`.
pub fn multicast_group(universe: u16) -> std::net::Ipv4Addr {
    std::net::Ipv4Addr::new(239, 255, (universe >> 8) as u8, (universe & 0xFF) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_data_packet() {
        let cid = [7u8; 16];
        let mut data = [0u8; 512];
        data[0] = 255;
        data[1] = 128;
        let packet = encode_data_packet(&cid, "lumina", 100, 3, 42, &data);
        assert_eq!(packet.len(), PACKET_LEN);
        let decoded = decode_data_packet(&packet).unwrap();
        assert_eq!(decoded.universe, 42);
        assert_eq!(decoded.sequence, 3);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn rejects_nonzero_start_code() {
        let cid = [0u8; 16];
        let data = [0u8; 512];
        let mut packet = encode_data_packet(&cid, "x", 100, 0, 1, &data);
        packet[START_CODE_OFFSET] = 1;
        assert!(matches!(
            decode_data_packet(&packet),
            Err(SacnError::NonZeroStartCode(1))
        ));
    }

    #[test]
    fn multicast_group_matches_spec_formula() {
        assert_eq!(multicast_group(1), std::net::Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(
            multicast_group(300),
            std::net::Ipv4Addr::new(239, 255, 1, 44)
        );
    }
}

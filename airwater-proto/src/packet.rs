//! Packet framing for the command characteristic
//!
//! Data packet: `[seq][tag][0x00][0x15][chunk: <= 16 bytes]`
//! Ack packet:  `[last_seq + 1][0x11][0x00][0x16]`
//!
//! The tag carries transfer position and packet count. It is not computed
//! from the chunk and the device does not treat it as a checksum.

use crate::ble::{ACK_MARKER, COMPLETION_SIGNAL, DATA_MARKER, PACKET_SIZE};

const HEADER_LEN: usize = 2 + DATA_MARKER.len();

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet shorter than its 4 byte header")]
    Truncated,
    #[error("unexpected type marker {0:02x?}")]
    BadMarker([u8; 2]),
    #[error("chunk of {0} bytes exceeds the packet size")]
    ChunkTooLong(usize),
}

/// Number of data packets needed for a blob of `blob_len` bytes.
pub fn packet_count(blob_len: usize) -> usize {
    blob_len.div_ceil(PACKET_SIZE)
}

/// `((seq + 1) << 4) + packet_count`, truncated to a byte as on the wire.
pub fn packet_tag(seq: u8, packet_count: usize) -> u8 {
    let tag = ((seq as usize + 1) << 4) + packet_count;
    (tag & 0xff) as u8
}

/// Whether a notification is the device's "credentials accepted" signal.
pub fn is_completion_signal(data: &[u8]) -> bool {
    data == COMPLETION_SIGNAL
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub seq: u8,
    pub tag: u8,
    pub chunk: Vec<u8>,
}

impl DataPacket {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.chunk.len());
        buf.push(self.seq);
        buf.push(self.tag);
        buf.extend_from_slice(&DATA_MARKER);
        buf.extend_from_slice(&self.chunk);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < HEADER_LEN {
            return Err(PacketError::Truncated);
        }
        let marker = [data[2], data[3]];
        if marker != DATA_MARKER {
            return Err(PacketError::BadMarker(marker));
        }
        let chunk = &data[HEADER_LEN..];
        if chunk.len() > PACKET_SIZE {
            return Err(PacketError::ChunkTooLong(chunk.len()));
        }
        Ok(Self {
            seq: data[0],
            tag: data[1],
            chunk: chunk.to_vec(),
        })
    }
}

/// Split a serialized payload into data packets, `seq` 0 through count - 1.
///
/// The last chunk is sent as-is, without padding. The credential payload is
/// at most 512 bytes, so `seq` never exceeds a byte.
pub fn packetize(blob: &[u8]) -> Vec<DataPacket> {
    let count = packet_count(blob.len());
    blob.chunks(PACKET_SIZE)
        .enumerate()
        .map(|(seq, chunk)| {
            let seq = seq as u8;
            DataPacket {
                seq,
                tag: packet_tag(seq, count),
                chunk: chunk.to_vec(),
            }
        })
        .collect()
}

/// Final write of a successful attempt, sent after the completion signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub seq: u8,
}

impl AckPacket {
    /// Ack following the data packet numbered `last_seq`.
    pub fn after(last_seq: u8) -> Self {
        Self {
            seq: last_seq.wrapping_add(1),
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.seq, ACK_MARKER[0], ACK_MARKER[1], ACK_MARKER[2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    #[test]
    fn packet_count_rounds_up() {
        assert_eq!(packet_count(0), 0);
        assert_eq!(packet_count(1), 1);
        assert_eq!(packet_count(16), 1);
        assert_eq!(packet_count(17), 2);
        assert_eq!(packet_count(20), 2);
        assert_eq!(packet_count(512), 32);
    }

    #[test]
    fn tag_wraps_to_one_byte() {
        assert_eq!(packet_tag(0, 1), 17);
        assert_eq!(packet_tag(1, 2), 0x22);
        // (16 << 4) + 32 = 288
        assert_eq!(packet_tag(15, 32), 32);
        assert_eq!(packet_tag(31, 32), 32);
        for count in 1..=32usize {
            for seq in 0..count as u8 {
                let expected = ((((seq as u32) + 1) << 4) + count as u32) % 256;
                assert_eq!(packet_tag(seq, count) as u32, expected);
            }
        }
    }

    #[test]
    fn single_packet_for_short_credentials() {
        let blob = encode("Home", "secret12").unwrap();
        let packets = packetize(&blob);
        assert_eq!(packets.len(), 1);

        let mut expected = vec![0x00, 17, 0x00, 0x15];
        expected.extend_from_slice(&blob);
        assert_eq!(packets[0].to_bytes(), expected);
        assert_eq!(AckPacket::after(packets[0].seq).to_bytes(), [0x01, 0x11, 0x00, 0x16]);
    }

    #[test]
    fn last_chunk_is_not_padded() {
        let blob: Vec<u8> = (0..20).collect();
        let packets = packetize(&blob);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].chunk, &blob[..16]);
        assert_eq!(packets[1].chunk, &blob[16..]);
        assert_eq!(packets[1].to_bytes().len(), 4 + 4);
        assert_eq!(AckPacket::after(packets[1].seq).seq, 2);
    }

    #[test]
    fn chunks_reassemble_to_blob() {
        for len in [1usize, 15, 16, 17, 31, 32, 33, 100, 512] {
            let blob: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let packets = packetize(&blob);
            assert_eq!(packets.len(), packet_count(len));

            let mut joined = Vec::new();
            for (i, packet) in packets.iter().enumerate() {
                assert_eq!(packet.seq as usize, i);
                let parsed = DataPacket::from_bytes(&packet.to_bytes()).unwrap();
                joined.extend_from_slice(&parsed.chunk);
            }
            assert_eq!(joined, blob);
        }
    }

    #[test]
    fn empty_blob_has_no_packets() {
        assert!(packetize(&[]).is_empty());
    }

    #[test]
    fn parse_rejects_bad_packets() {
        assert_eq!(DataPacket::from_bytes(&[0, 17, 0]), Err(PacketError::Truncated));
        assert_eq!(
            DataPacket::from_bytes(&[0, 17, 0x11, 0x00]),
            Err(PacketError::BadMarker([0x11, 0x00]))
        );
        let mut long = vec![0, 17, 0x00, 0x15];
        long.extend_from_slice(&[0; 17]);
        assert_eq!(DataPacket::from_bytes(&long), Err(PacketError::ChunkTooLong(17)));
    }

    #[test]
    fn only_exact_signal_completes() {
        assert!(is_completion_signal(&[0x00, 0x11, 0x00, 0x15, 0x01]));
        assert!(!is_completion_signal(&[0x00; 5]));
        assert!(!is_completion_signal(&[0x00, 0x11, 0x00, 0x15]));
        assert!(!is_completion_signal(&[0x00, 0x11, 0x00, 0x15, 0x01, 0x00]));
        assert!(!is_completion_signal(&[]));
    }
}

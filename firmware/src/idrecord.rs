#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! On-flash layout of the persisted node identity.
//!
//! One eight-byte record, sized to the STM32G0 flash write granularity. A
//! magic word distinguishes a programmed record from erased flash, so a
//! blank page reads back as "no identity stored" rather than id 65535.

use ranging_core::node::NodeId;

/// Marker word opening a programmed identity record.
pub const RECORD_MAGIC: u32 = u32::from_le_bytes(*b"NID1");

/// Stored record size; the STM32G0 programs flash in 64-bit double words.
pub const RECORD_SIZE: usize = 8;

/// Encodes `id` into a flash-ready record.
pub fn encode(id: NodeId) -> [u8; RECORD_SIZE] {
    let mut record = [0xff_u8; RECORD_SIZE];
    record[..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    record[4..6].copy_from_slice(&id.value().to_le_bytes());
    record
}

/// Decodes a stored record; `None` for erased or foreign data.
pub fn decode(record: &[u8; RECORD_SIZE]) -> Option<NodeId> {
    let mut magic = [0_u8; 4];
    magic.copy_from_slice(&record[..4]);
    if u32::from_le_bytes(magic) != RECORD_MAGIC {
        return None;
    }

    let mut id = [0_u8; 2];
    id.copy_from_slice(&record[4..6]);
    Some(NodeId::new(u16::from_le_bytes(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmed_records_decode_to_their_id() {
        assert_eq!(decode(&encode(NodeId::new(0))), Some(NodeId::new(0)));
        assert_eq!(decode(&encode(NodeId::new(37))), Some(NodeId::new(37)));
        assert_eq!(
            decode(&encode(NodeId::new(u16::MAX))),
            Some(NodeId::new(u16::MAX))
        );
    }

    #[test]
    fn erased_flash_reads_as_no_identity() {
        assert_eq!(decode(&[0xff; RECORD_SIZE]), None);
        assert_eq!(decode(&[0x00; RECORD_SIZE]), None);
    }

    #[test]
    fn a_corrupt_magic_word_is_rejected() {
        let mut record = encode(NodeId::new(12));
        record[0] ^= 0x01;
        assert_eq!(decode(&record), None);
    }

    #[test]
    fn pad_bytes_do_not_affect_the_id() {
        let mut record = encode(NodeId::new(12));
        record[6] = 0x00;
        record[7] = 0xa5;
        assert_eq!(decode(&record), Some(NodeId::new(12)));
    }
}

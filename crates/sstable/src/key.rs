//! Internal key encoding.
//!
//! Every entry stored in a table carries an *internal key*: the user key
//! followed by a fixed 8-byte little-endian suffix packing a 56-bit sequence
//! number and an 8-bit type tag:
//!
//! ```text
//! [user key bytes][(seq << 8) | type : u64 LE]
//! ```
//!
//! Among entries with the same user key, the entry with the **largest**
//! sequence number sorts first (see
//! [`InternalKeyComparator`](crate::InternalKeyComparator)), so a seek lands
//! on the newest visible version.

use byteorder::{ByteOrder, LittleEndian};

/// Monotonically assigned write sequence number.
pub type SequenceNumber = u64;

/// Largest sequence number that fits next to the 8-bit type tag.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Kind of mutation an internal entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A tombstone. Hides older entries for the same user key.
    Deletion = 0,
    /// A live value.
    Value = 1,
}

/// Type tag used when constructing seek targets. `Value` sorts before
/// `Deletion` within a (user key, sequence) pair because the packed suffix is
/// compared descending, so seeking with this tag finds the newest entry with
/// sequence <= the snapshot.
pub const TYPE_FOR_SEEK: ValueType = ValueType::Value;

/// Packs a sequence number and type tag into the 8-byte key suffix.
pub fn pack_sequence_and_type(seq: SequenceNumber, t: ValueType) -> u64 {
    debug_assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | t as u64
}

/// Appends `user_key` plus the packed `(seq, t)` suffix to `dst`.
pub fn append_internal_key(dst: &mut Vec<u8>, user_key: &[u8], seq: SequenceNumber, t: ValueType) {
    dst.extend_from_slice(user_key);
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, pack_sequence_and_type(seq, t));
    dst.extend_from_slice(&buf);
}

/// An internal key split into its parts. Borrows the user-key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

/// Splits an internal key. Returns `None` if the key is too short or the type
/// tag is unknown.
pub fn parse_internal_key(key: &[u8]) -> Option<ParsedInternalKey<'_>> {
    if key.len() < 8 {
        return None;
    }
    let packed = LittleEndian::read_u64(&key[key.len() - 8..]);
    let value_type = match (packed & 0xff) as u8 {
        0 => ValueType::Deletion,
        1 => ValueType::Value,
        _ => return None,
    };
    Some(ParsedInternalKey {
        user_key: &key[..key.len() - 8],
        sequence: packed >> 8,
        value_type,
    })
}

/// Returns the user-key prefix of an internal key.
pub fn extract_user_key(key: &[u8]) -> &[u8] {
    debug_assert!(key.len() >= 8);
    &key[..key.len() - 8]
}

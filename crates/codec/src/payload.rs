//! Six-byte payload encoding, decoding, and identity.

use bitcoin::hashes::{Hash, sha256};

use punks_core::PunkId;

use crate::error::CodecError;
use crate::metadata::PunkMetadata;
use crate::tables::{BACKGROUNDS, PunkType};

/// Canonical payload length. No framing, no length prefix.
pub const PAYLOAD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes punk metadata into the canonical six-byte payload.
///
/// Layout (multibyte fields little-endian):
///
/// ```text
/// byte 0 : [ type:3 | background:4 | reserved:1 ]
/// bytes 1..4 : u32 attribute bitmap
/// byte 5 : attribute count
/// ```
///
/// # Errors
///
/// Returns [`CodecError::CountMismatch`] if the attribute list carries a
/// duplicate index (the bitmap would lose it silently otherwise). Range
/// errors are already ruled out by [`PunkMetadata`] construction.
pub fn encode(metadata: &PunkMetadata) -> Result<[u8; PAYLOAD_LEN], CodecError> {
    let mut bitmap: u32 = 0;
    for &idx in metadata.attribute_indices() {
        bitmap |= 1u32 << idx;
    }

    if bitmap.count_ones() as usize != metadata.attribute_indices().len() {
        return Err(CodecError::CountMismatch);
    }

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = (metadata.punk_type().tag() << 5) | (metadata.background_index() << 1);
    payload[1..5].copy_from_slice(&bitmap.to_le_bytes());
    payload[5] = metadata.attribute_count();
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes a six-byte payload into punk metadata.
///
/// # Errors
///
/// - [`CodecError::InvalidLength`] if the slice is not exactly six bytes
/// - [`CodecError::InvalidTypeIndex`] for a type tag ≥ 5
/// - [`CodecError::InvalidBackgroundIndex`] for a background index missing
///   from the table
/// - [`CodecError::UnknownAttribute`] for a bitmap bit beyond the type's table
/// - [`CodecError::CountMismatch`] if byte 5 disagrees with the bitmap
pub fn decode(payload: &[u8]) -> Result<PunkMetadata, CodecError> {
    if payload.len() != PAYLOAD_LEN {
        return Err(CodecError::InvalidLength(payload.len()));
    }

    let type_tag = payload[0] >> 5;
    let punk_type = PunkType::from_tag(type_tag).ok_or(CodecError::InvalidTypeIndex(type_tag))?;

    let background = (payload[0] >> 1) & 0x0f;
    if background as usize >= BACKGROUNDS.len() {
        return Err(CodecError::InvalidBackgroundIndex(background));
    }

    let bitmap = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let table_len = punk_type.attribute_table().len();

    let mut attributes = Vec::with_capacity(bitmap.count_ones() as usize);
    for bit in 0..32u8 {
        if bitmap & (1u32 << bit) != 0 {
            if bit as usize >= table_len {
                return Err(CodecError::UnknownAttribute);
            }
            attributes.push(bit);
        }
    }

    if payload[5] as u32 != bitmap.count_ones() {
        return Err(CodecError::CountMismatch);
    }

    PunkMetadata::from_indices(punk_type, background, attributes)
}

/// Decodes a payload and checks it hashes to the expected punk id.
///
/// # Errors
///
/// All of [`decode`]'s errors, plus [`CodecError::IdMismatch`] when the
/// payload is valid but belongs to a different punk.
pub fn decode_verified(payload: &[u8], expected: &PunkId) -> Result<PunkMetadata, CodecError> {
    let metadata = decode(payload)?;
    let mut fixed = [0u8; PAYLOAD_LEN];
    fixed.copy_from_slice(payload);
    if punk_id_of(&fixed) != *expected {
        return Err(CodecError::IdMismatch);
    }
    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Integrity / identity
// ---------------------------------------------------------------------------

/// Re-encodes metadata and compares it byte-for-byte against a payload.
pub fn verify_integrity(metadata: &PunkMetadata, payload: &[u8]) -> bool {
    match encode(metadata) {
        Ok(encoded) => encoded[..] == *payload,
        Err(_) => false,
    }
}

/// The punk identity: `SHA-256` over the canonical payload bytes.
pub fn punk_id_of(payload: &[u8; PAYLOAD_LEN]) -> PunkId {
    let digest = sha256::Hash::hash(payload);
    PunkId::from_bytes(digest.to_byte_array())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TYPES;

    #[test]
    fn encode_layout_is_exact() {
        let m = PunkMetadata::from_indices(PunkType::Alien, 6, vec![0, 1, 2]).unwrap();
        let payload = encode(&m).unwrap();
        // type 3 << 5 | background 6 << 1 = 0x60 | 0x0c = 0x6c
        assert_eq!(payload, [0x6c, 0x07, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn decode_historical_alien_payload() {
        // The first collection Alien: Purple background, Alien Cap,
        // Laser Eyes, UFO.
        let payload = [0x6c, 0x07, 0x00, 0x00, 0x00, 0x03];
        let m = decode(&payload).unwrap();
        assert_eq!(m.punk_type(), PunkType::Alien);
        assert_eq!(m.background_name(), "Purple");
        assert_eq!(m.attribute_names(), vec!["Alien Cap", "Laser Eyes", "UFO"]);
    }

    #[test]
    fn round_trip_every_type() {
        for t in TYPES {
            let n = t.attribute_table().len() as u8;
            let attrs = vec![0, n / 2, n - 1];
            let m = PunkMetadata::from_indices(t, 3, attrs).unwrap();
            let payload = encode(&m).unwrap();
            let decoded = decode(&payload).unwrap();
            assert_eq!(decoded, m);
            assert!(verify_integrity(&decoded, &payload));
        }
    }

    #[test]
    fn bitmap_count_consistency() {
        // Byte 5 must equal the popcount of bytes 1..5 in every payload.
        let m = PunkMetadata::from_indices(PunkType::Female, 2, vec![1, 5, 9, 12]).unwrap();
        let payload = encode(&m).unwrap();
        let bitmap = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        assert_eq!(payload[5] as u32, bitmap.count_ones());
    }

    #[test]
    fn duplicate_attribute_is_count_mismatch() {
        let m = PunkMetadata::from_indices(PunkType::Male, 0, vec![4, 4]).unwrap();
        assert_eq!(encode(&m), Err(CodecError::CountMismatch));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(decode(&[0u8; 5]), Err(CodecError::InvalidLength(5)));
        assert_eq!(decode(&[0u8; 7]), Err(CodecError::InvalidLength(7)));
    }

    #[test]
    fn decode_rejects_bad_type_tag() {
        // Tag 5 (0b101) is outside the five-type table.
        let payload = [0b1010_0000, 0, 0, 0, 0, 0];
        assert_eq!(decode(&payload), Err(CodecError::InvalidTypeIndex(5)));
    }

    #[test]
    fn decode_rejects_bad_background() {
        // Background index 12 misses the 8-entry table.
        let payload = [12 << 1, 0, 0, 0, 0, 0];
        assert_eq!(decode(&payload), Err(CodecError::InvalidBackgroundIndex(12)));
    }

    #[test]
    fn decode_rejects_bit_beyond_table() {
        // Bit 15 is outside the 10-entry Zombie table.
        let bitmap = (1u32 << 15).to_le_bytes();
        let payload = [
            PunkType::Zombie.tag() << 5,
            bitmap[0],
            bitmap[1],
            bitmap[2],
            bitmap[3],
            1,
        ];
        assert_eq!(decode(&payload), Err(CodecError::UnknownAttribute));
    }

    #[test]
    fn decode_rejects_count_mismatch() {
        let payload = [0x6c, 0x07, 0x00, 0x00, 0x00, 0x02];
        assert_eq!(decode(&payload), Err(CodecError::CountMismatch));
    }

    #[test]
    fn punk_id_is_stable() {
        let payload = [0x6c, 0x07, 0x00, 0x00, 0x00, 0x03];
        let a = punk_id_of(&payload);
        let b = punk_id_of(&payload);
        assert_eq!(a, b);

        // A different bitmap yields a different identity.
        assert_ne!(a, punk_id_of(&[0x6c, 0x0b, 0x00, 0x00, 0x00, 0x03]));
    }

    #[test]
    fn decode_verified_checks_identity() {
        let payload = [0x6c, 0x07, 0x00, 0x00, 0x00, 0x03];
        let id = punk_id_of(&payload);
        assert!(decode_verified(&payload, &id).is_ok());

        let wrong = PunkId::from_bytes([0u8; 32]);
        assert_eq!(
            decode_verified(&payload, &wrong),
            Err(CodecError::IdMismatch)
        );
    }
}

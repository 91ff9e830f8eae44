//! Punk metadata: the decoded form of a six-byte payload.

use crate::error::CodecError;
use crate::tables::{BACKGROUNDS, PunkType};

/// Decoded punk traits.
///
/// Attribute indices are kept canonical: ascending bit index, as produced
/// by [`PunkMetadata::from_indices`] and [`PunkMetadata::from_names`]. Two
/// metadata values describing the same punk therefore compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunkMetadata {
    punk_type: PunkType,
    background: u8,
    attributes: Vec<u8>,
}

impl PunkMetadata {
    /// Builds metadata from a type, a background index, and attribute bit
    /// indices.
    ///
    /// The attribute list is sorted into canonical ascending order.
    /// Duplicates are preserved (and later rejected by `encode` as a
    /// count mismatch) so that a corrupt caller cannot silently lose an
    /// attribute.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidBackground`] if the background index misses
    ///   the table
    /// - [`CodecError::AttributeIndexOutOfRange`] for indices above 31
    /// - [`CodecError::UnknownAttribute`] for indices beyond the type's table
    pub fn from_indices(
        punk_type: PunkType,
        background: u8,
        mut attributes: Vec<u8>,
    ) -> Result<Self, CodecError> {
        if background as usize >= BACKGROUNDS.len() {
            return Err(CodecError::InvalidBackground);
        }
        let table_len = punk_type.attribute_table().len();
        for &idx in &attributes {
            if idx > 31 {
                return Err(CodecError::AttributeIndexOutOfRange);
            }
            if idx as usize >= table_len {
                return Err(CodecError::UnknownAttribute);
            }
        }
        attributes.sort_unstable();
        Ok(Self {
            punk_type,
            background,
            attributes,
        })
    }

    /// Builds metadata from display names.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidType`] for an unknown type name
    /// - [`CodecError::InvalidBackground`] for an unknown background name
    /// - [`CodecError::UnknownAttribute`] for an attribute name not in the
    ///   type's table
    pub fn from_names(
        type_name: &str,
        background_name: &str,
        attribute_names: &[&str],
    ) -> Result<Self, CodecError> {
        let punk_type = PunkType::from_name(type_name).ok_or(CodecError::InvalidType)?;
        let background = BACKGROUNDS
            .iter()
            .position(|b| *b == background_name)
            .ok_or(CodecError::InvalidBackground)? as u8;

        let table = punk_type.attribute_table();
        let mut attributes = Vec::with_capacity(attribute_names.len());
        for name in attribute_names {
            let idx = table
                .iter()
                .position(|a| a == name)
                .ok_or(CodecError::UnknownAttribute)?;
            attributes.push(idx as u8);
        }

        Self::from_indices(punk_type, background, attributes)
    }

    /// The punk type.
    pub fn punk_type(&self) -> PunkType {
        self.punk_type
    }

    /// The background table index.
    pub fn background_index(&self) -> u8 {
        self.background
    }

    /// The background display name.
    pub fn background_name(&self) -> &'static str {
        BACKGROUNDS[self.background as usize]
    }

    /// Attribute bit indices in canonical ascending order.
    pub fn attribute_indices(&self) -> &[u8] {
        &self.attributes
    }

    /// Attribute display names in canonical order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        let table = self.punk_type.attribute_table();
        self.attributes
            .iter()
            .map(|&i| table[i as usize])
            .collect()
    }

    /// Number of attributes.
    pub fn attribute_count(&self) -> u8 {
        self.attributes.len() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_names_resolves_tables() {
        let m = PunkMetadata::from_names("Alien", "Purple", &["UFO", "Alien Cap"]).unwrap();
        assert_eq!(m.punk_type(), PunkType::Alien);
        assert_eq!(m.background_index(), 6);
        // Canonicalised: ascending bit index, not input order.
        assert_eq!(m.attribute_indices(), &[0, 2]);
        assert_eq!(m.attribute_names(), vec!["Alien Cap", "UFO"]);
    }

    #[test]
    fn from_names_rejects_unknowns() {
        assert_eq!(
            PunkMetadata::from_names("Robot", "Blue", &[]),
            Err(CodecError::InvalidType)
        );
        assert_eq!(
            PunkMetadata::from_names("Male", "Chartreuse", &[]),
            Err(CodecError::InvalidBackground)
        );
        assert_eq!(
            PunkMetadata::from_names("Male", "Blue", &["UFO"]),
            Err(CodecError::UnknownAttribute)
        );
    }

    #[test]
    fn from_indices_validates_ranges() {
        assert_eq!(
            PunkMetadata::from_indices(PunkType::Male, 200, vec![]),
            Err(CodecError::InvalidBackground)
        );
        assert_eq!(
            PunkMetadata::from_indices(PunkType::Male, 0, vec![32]),
            Err(CodecError::AttributeIndexOutOfRange)
        );
        // Index 25 fits the bitmap but misses the 20-entry Male table.
        assert_eq!(
            PunkMetadata::from_indices(PunkType::Male, 0, vec![25]),
            Err(CodecError::UnknownAttribute)
        );
    }

    #[test]
    fn canonical_order_makes_equal() {
        let a = PunkMetadata::from_indices(PunkType::Ape, 1, vec![4, 1, 9]).unwrap();
        let b = PunkMetadata::from_indices(PunkType::Ape, 1, vec![9, 4, 1]).unwrap();
        assert_eq!(a, b);
    }
}

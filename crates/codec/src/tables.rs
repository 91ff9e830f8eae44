//! Frozen protocol tables: punk types, backgrounds, and per-type attributes.
//!
//! These tables ARE the protocol. Positions are wire tags: the type's table
//! index is the 3-bit tag in payload byte 0, the background's index is the
//! 4-bit field next to it, and an attribute's index is its bit position in
//! the 32-bit bitmap. Entries must never be reordered, renamed, or removed;
//! new entries may only be appended (and only within the field widths).
//!
//! The wire tag order of the types is fixed by the historical collection
//! payloads: `Alien` carries tag 3 and `Ape` tag 4.

// ---------------------------------------------------------------------------
// PunkType
// ---------------------------------------------------------------------------

/// The five punk types, in wire tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunkType {
    /// Tag 0.
    Male,
    /// Tag 1.
    Female,
    /// Tag 2.
    Zombie,
    /// Tag 3.
    Alien,
    /// Tag 4.
    Ape,
}

/// All punk types in wire tag order.
pub const TYPES: [PunkType; 5] = [
    PunkType::Male,
    PunkType::Female,
    PunkType::Zombie,
    PunkType::Alien,
    PunkType::Ape,
];

impl PunkType {
    /// The 3-bit wire tag of this type.
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Male => 0,
            Self::Female => 1,
            Self::Zombie => 2,
            Self::Alien => 3,
            Self::Ape => 4,
        }
    }

    /// Looks a type up by its wire tag.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Male),
            1 => Some(Self::Female),
            2 => Some(Self::Zombie),
            3 => Some(Self::Alien),
            4 => Some(Self::Ape),
            _ => None,
        }
    }

    /// Looks a type up by its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        TYPES.iter().copied().find(|t| t.name() == name)
    }

    /// The display name of this type.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Zombie => "Zombie",
            Self::Alien => "Alien",
            Self::Ape => "Ape",
        }
    }

    /// The frozen attribute table for this type.
    ///
    /// An attribute's position in the slice is its bit index in the payload
    /// bitmap. Every table holds at most 32 entries.
    pub const fn attribute_table(&self) -> &'static [&'static str] {
        match self {
            Self::Male => MALE_ATTRIBUTES,
            Self::Female => FEMALE_ATTRIBUTES,
            Self::Zombie => ZOMBIE_ATTRIBUTES,
            Self::Alien => ALIEN_ATTRIBUTES,
            Self::Ape => APE_ATTRIBUTES,
        }
    }
}

impl std::fmt::Display for PunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Backgrounds
// ---------------------------------------------------------------------------

/// The frozen background table (index = 4-bit wire field).
pub const BACKGROUNDS: &[&str] = &[
    "Blue", "Green", "Red", "Yellow", "Orange", "Pink", "Purple", "Teal",
];

// ---------------------------------------------------------------------------
// Attribute tables
// ---------------------------------------------------------------------------

const MALE_ATTRIBUTES: &[&str] = &[
    "Beanie",
    "Cap",
    "Cowboy Hat",
    "Mohawk",
    "Hoodie",
    "Bandana",
    "Shades",
    "Eye Patch",
    "3D Glasses",
    "Cigarette",
    "Pipe",
    "Smile",
    "Frown",
    "Earring",
    "Gold Chain",
    "Mustache",
    "Beard",
    "Goatee",
    "Buck Teeth",
    "Clown Nose",
];

const FEMALE_ATTRIBUTES: &[&str] = &[
    "Pilot Helmet",
    "Tiara",
    "Pigtails",
    "Wild Hair",
    "Straight Hair",
    "Red Lipstick",
    "Purple Lipstick",
    "Hot Lipstick",
    "Green Eye Shadow",
    "Blue Eye Shadow",
    "Choker",
    "Gold Chain",
    "Earring",
    "Shades",
    "Big Glasses",
    "Clown Eyes",
    "Mole",
    "Rosy Cheeks",
];

const ZOMBIE_ATTRIBUTES: &[&str] = &[
    "Exposed Brain",
    "Torn Ear",
    "Glowing Eyes",
    "Stitched Mouth",
    "Rotten Teeth",
    "Bone Mohawk",
    "Grave Dirt",
    "Tattered Hoodie",
    "Maggot Earring",
    "Death Stare",
];

const ALIEN_ATTRIBUTES: &[&str] = &[
    "Alien Cap",
    "Laser Eyes",
    "UFO",
    "Antenna",
    "Green Glow",
    "Third Eye",
    "Space Helmet",
    "Ray Gun",
    "Star Chain",
    "Nebula Shades",
];

const APE_ATTRIBUTES: &[&str] = &[
    "Fur Cap",
    "Banana",
    "Gold Grill",
    "Jungle Chain",
    "War Paint",
    "Bone Necklace",
    "Silverback Fur",
    "Red Bandana",
    "King Crown",
    "Cigar",
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for t in TYPES {
            assert_eq!(PunkType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(PunkType::from_tag(5), None);
    }

    #[test]
    fn names_round_trip() {
        for t in TYPES {
            assert_eq!(PunkType::from_name(t.name()), Some(t));
        }
        assert_eq!(PunkType::from_name("Robot"), None);
    }

    #[test]
    fn alien_holds_tag_three() {
        // The historical payloads pin this; see module docs.
        assert_eq!(PunkType::Alien.tag(), 3);
        assert_eq!(PunkType::Ape.tag(), 4);
    }

    #[test]
    fn tables_fit_wire_widths() {
        assert!(BACKGROUNDS.len() <= 16, "background field is 4 bits");
        for t in TYPES {
            assert!(
                t.attribute_table().len() <= 32,
                "{} attribute table exceeds the 32-bit bitmap",
                t.name()
            );
        }
    }

    #[test]
    fn tables_have_no_duplicates() {
        for t in TYPES {
            let table = t.attribute_table();
            for (i, a) in table.iter().enumerate() {
                assert!(
                    !table[i + 1..].contains(a),
                    "duplicate attribute {a:?} in {} table",
                    t.name()
                );
            }
        }
    }

    #[test]
    fn collection_anchors_are_frozen() {
        // Purple at background index 6; the first three Alien attributes.
        assert_eq!(BACKGROUNDS[6], "Purple");
        assert_eq!(
            &PunkType::Alien.attribute_table()[..3],
            &["Alien Cap", "Laser Eyes", "UFO"]
        );
    }
}

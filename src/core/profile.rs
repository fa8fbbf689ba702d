//! Wire profile configuration shared by cursors, sinks and the attribute codec.
//!
//! A profile is fixed when a codec instance is built; one instance never mixes
//! 16-bit and 32-bit length prefixes.

/// Width of size prefixes (blob/string lengths) and list counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthField {
    /// 16-bit prefixes, used on short SPP links
    Short,
    /// 32-bit prefixes
    #[default]
    Long,
}

impl LengthField {
    /// Map the `short_length_field` configuration flag onto a width.
    pub fn from_short_flag(short_length_field: bool) -> Self {
        if short_length_field {
            LengthField::Short
        } else {
            LengthField::Long
        }
    }

    /// Number of bytes a prefix occupies on the wire.
    pub fn width(self) -> usize {
        match self {
            LengthField::Short => 2,
            LengthField::Long => 4,
        }
    }

    /// Largest byte length a signed size prefix can carry.
    pub fn max_size(self) -> usize {
        match self {
            LengthField::Short => i16::MAX as usize,
            LengthField::Long => i32::MAX as usize,
        }
    }

    /// Largest element count an unsigned count prefix can carry.
    pub fn max_count(self) -> usize {
        match self {
            LengthField::Short => u16::MAX as usize,
            LengthField::Long => u32::MAX as usize,
        }
    }
}

/// Tagged configuration for one binary wire profile.
///
/// `attribute_tag_offset` is added to an attribute's short form when the tag is
/// written, and subtracted when it is read back. The SPP profile omits one
/// reserved kind from its tag space, hence `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireProfile {
    pub length_field: LengthField,
    pub attribute_tag_offset: i16,
}

impl WireProfile {
    /// SPP binary profile.
    pub fn spp(short_length_field: bool) -> Self {
        Self {
            length_field: LengthField::from_short_flag(short_length_field),
            attribute_tag_offset: -1,
        }
    }

    /// Plain fixed-length binary profile: 32-bit prefixes, tags unchanged.
    pub fn fixed() -> Self {
        Self {
            length_field: LengthField::Long,
            attribute_tag_offset: 0,
        }
    }

    pub fn is_short_length_field(&self) -> bool {
        self.length_field == LengthField::Short
    }
}

impl Default for WireProfile {
    fn default() -> Self {
        Self::spp(false)
    }
}

//! Catalog part identifiers
//! ---
//!
//! Layout of a part id (big-endian, 8 significant bytes):
//!
//! ```text
//! | class id (2) | sequence id (4) | kind << 7 (1) | reserved (1) |
//! ```
//!
//! Putting class and sequence first makes ids sort by class, then by slot
//! within the class. The high bit of the seventh byte tells a fixed part from
//! a slot part. On-chain the id is a `uint64`, so it occupies the low 8 bytes
//! of a 32-byte ABI word.
//!
use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const CLASS_ID_BITS: u32 = 16;
pub const SEQUENCE_ID_BITS: u32 = 32;

const KIND_MASK: u64 = 0x8000;
const RESERVED_MASK: u64 = 0x7fff;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartIdError {
    #[error("{field} {value} does not fit in {bits} bits")]
    OutOfRange {
        field: &'static str,
        value: u64,
        bits: u32,
    },

    #[error("part id {0} has reserved bits set")]
    ReservedBitsSet(PartId),

    #[error("malformed part id: {0}")]
    Malformed(String),
}

/// Whether a part is drawn as-is or is a slot other collections equip into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Fixed,
    Slot,
}

impl PartKind {
    /// Flag stored in the part id.
    pub const fn flag(self) -> u8 {
        match self {
            Self::Fixed => 0,
            Self::Slot => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, PartIdError> {
        match flag {
            0 => Ok(Self::Fixed),
            1 => Ok(Self::Slot),
            x => Err(PartIdError::OutOfRange {
                field: "kind",
                value: x as u64,
                bits: 1,
            }),
        }
    }

    /// Catalog `ItemType` enum value (`Slot = 1`, `Fixed = 2`).
    ///
    /// NOTE: This is not the same numbering as [`PartKind::flag()`].
    pub const fn item_type(self) -> u8 {
        match self {
            Self::Slot => 1,
            Self::Fixed => 2,
        }
    }

    pub fn from_item_type(item_type: u8) -> Option<Self> {
        match item_type {
            1 => Some(Self::Slot),
            2 => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl FromStr for PartKind {
    type Err = PartIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "slot" => Ok(Self::Slot),
            x => Err(PartIdError::Malformed(format!("unknown part kind: {}", x))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartId(u64);

impl PartId {
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Id as a right-aligned 32-byte ABI word.
    pub fn to_word(self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&self.to_be_bytes());
        word
    }

    pub fn class_id(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn sequence_id(self) -> u32 {
        (self.0 >> 16) as u32
    }

    pub fn kind(self) -> PartKind {
        if self.0 & KIND_MASK == 0 {
            PartKind::Fixed
        } else {
            PartKind::Slot
        }
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::Debug for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartId({})", self)
    }
}

impl FromStr for PartId {
    type Err = PartIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > 16 {
            return Err(PartIdError::Malformed(s.to_owned()));
        }
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| PartIdError::Malformed(s.to_owned()))
    }
}

fn check_width(field: &'static str, value: u64, bits: u32) -> Result<(), PartIdError> {
    if value >> bits != 0 {
        Err(PartIdError::OutOfRange { field, value, bits })
    } else {
        Ok(())
    }
}

/// Build a part id from its class, its sequence number within the class, and
/// its kind.
///
/// Inputs are taken wider than their fields so that overflow is reported
/// rather than truncated.
pub fn encode_part_id(
    class_id: u64,
    sequence_id: u64,
    kind: PartKind,
) -> Result<PartId, PartIdError> {
    check_width("class id", class_id, CLASS_ID_BITS)?;
    check_width("sequence id", sequence_id, SEQUENCE_ID_BITS)?;
    let kind_byte = (kind.flag() as u64) << 7;
    Ok(PartId((class_id << 48) | (sequence_id << 16) | (kind_byte << 8)))
}

/// Split a part id into `(class_id, sequence_id, kind)`.
pub fn decode_part_id(id: PartId) -> Result<(u16, u32, PartKind), PartIdError> {
    if id.0 & RESERVED_MASK != 0 {
        return Err(PartIdError::ReservedBitsSet(id));
    }
    let kind = PartKind::from_flag(((id.0 & KIND_MASK) >> 15) as u8)?;
    Ok((id.class_id(), id.sequence_id(), kind))
}

//! Raw `cc_data` constructs
//!
//! Each construct is three bytes: a header with the validity flag and a
//! 2-bit type tag, then two payload bytes.

use crate::utils::errors::InputError;

pub const CONSTRUCT_SIZE: usize = 3;

const CC_VALID_MASK: u8 = 0x04;
const CC_TYPE_MASK: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructType {
    /// Line 21 field 1 byte pair.
    Field1,
    /// Line 21 field 2 byte pair.
    Field2,
    /// Continues the open DTVCC channel packet.
    PacketData,
    /// Opens a new DTVCC channel packet.
    PacketStart,
}

impl From<u8> for ConstructType {
    fn from(value: u8) -> Self {
        match value & CC_TYPE_MASK {
            0 => Self::Field1,
            1 => Self::Field2,
            2 => Self::PacketData,
            _ => Self::PacketStart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionConstruct {
    pub valid: bool,
    pub construct_type: ConstructType,
    pub data: [u8; 2],
}

impl CaptionConstruct {
    pub fn from_bytes(bytes: [u8; CONSTRUCT_SIZE]) -> Self {
        Self {
            valid: bytes[0] & CC_VALID_MASK != 0,
            construct_type: bytes[0].into(),
            data: [bytes[1], bytes[2]],
        }
    }

    pub fn is_dtvcc(&self) -> bool {
        matches!(
            self.construct_type,
            ConstructType::PacketStart | ConstructType::PacketData
        )
    }

    /// Splits a flat input buffer into constructs.
    pub fn parse_all(buffer: &[u8]) -> Result<impl Iterator<Item = Self> + '_, InputError> {
        if !buffer.len().is_multiple_of(CONSTRUCT_SIZE) {
            return Err(InputError::MisalignedConstructs(buffer.len()));
        }

        Ok(buffer
            .chunks_exact(CONSTRUCT_SIZE)
            .map(|c| Self::from_bytes([c[0], c[1], c[2]])))
    }
}

#[test]
fn construct_header() -> Result<(), InputError> {
    let bytes = [
        0xFF, 0x02, 0x21, 0xFE, 0x93, 0x00, 0xFA, 0x00, 0x00, 0xFC, 0x94, 0x2C,
    ];
    let constructs: Vec<_> = CaptionConstruct::parse_all(&bytes)?.collect();

    assert_eq!(constructs[0].construct_type, ConstructType::PacketStart);
    assert!(constructs[0].valid);
    assert_eq!(constructs[0].data, [0x02, 0x21]);

    assert_eq!(constructs[1].construct_type, ConstructType::PacketData);
    assert!(constructs[1].is_dtvcc());

    assert_eq!(constructs[2].construct_type, ConstructType::PacketData);
    assert!(!constructs[2].valid);

    assert_eq!(constructs[3].construct_type, ConstructType::Field1);
    assert!(!constructs[3].is_dtvcc());

    assert!(matches!(
        CaptionConstruct::parse_all(&[0xFF, 0x02]),
        Err(InputError::MisalignedConstructs(2))
    ));
    Ok(())
}

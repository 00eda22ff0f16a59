//! Decoded caption units
//!
//! One [`DecodedUnit`] is produced per command or character found in a
//! service block, tagged with the service and packet sequence it came from.

use std::fmt::{self, Display, Formatter};

use crate::structs::charset::{UNKNOWN_GLYPH, g0_char, g1_char, g2_char, g3_char};
use crate::structs::command::{C0Command, C1Command, ExtendedCode};
use crate::utils::buffer_pool::{BufferElement, DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    C0(C0Command),
    C1(C1Command),
    C2(ExtendedCode),
    C3(ExtendedCode),
    G0(u8),
    G1(u8),
    G2(u8),
    G3(u8),
}

impl Payload {
    /// Code set mnemonic.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::C0(_) => "C0",
            Self::C1(_) => "C1",
            Self::C2(_) => "C2",
            Self::C3(_) => "C3",
            Self::G0(_) => "G0",
            Self::G1(_) => "G1",
            Self::G2(_) => "G2",
            Self::G3(_) => "G3",
        }
    }

    pub fn is_text(&self) -> bool {
        self.glyph().is_some()
    }

    /// The printable character, with [`UNKNOWN_GLYPH`] for unassigned G2/G3 codes.
    pub fn glyph(&self) -> Option<char> {
        match *self {
            Self::G0(code) => Some(g0_char(code)),
            Self::G1(code) => Some(g1_char(code)),
            Self::G2(code) => Some(g2_char(code).unwrap_or(UNKNOWN_GLYPH)),
            Self::G3(code) => Some(g3_char(code).unwrap_or(UNKNOWN_GLYPH)),
            _ => None,
        }
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::C0(cmd) => Display::fmt(cmd, f),
            Self::C1(cmd) => Display::fmt(cmd, f),
            Self::C2(ext) => write!(f, "{{C2:{:02X}}}", ext.code),
            Self::C3(ext) => write!(f, "{{C3:{:02X}}}", ext.code),
            _ => match self.glyph() {
                Some(c) => write!(f, "{c}"),
                None => Ok(()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedUnit {
    pub sequence_number: u8,
    pub service_number: u8,
    pub payload: Payload,
}

impl BufferElement for DecodedUnit {
    const DATA_TYPE: DataType = DataType::Dtvcc;
}

impl Display for DecodedUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.payload, f)
    }
}

/// Joins a run of units into one string, mnemonics inline.
pub fn render(units: &[DecodedUnit]) -> String {
    units.iter().map(|unit| unit.to_string()).collect()
}

#[test]
fn render_units() {
    let unit = |payload| DecodedUnit {
        sequence_number: 0,
        service_number: 1,
        payload,
    };
    let units = [
        unit(Payload::G0(b'H')),
        unit(Payload::G1(0xE9)),
        unit(Payload::G2(0x25)),
        unit(Payload::G3(0xA1)),
        unit(Payload::C0(C0Command::Cr)),
        unit(Payload::C2(ExtendedCode { code: 0x08, length: 3 })),
    ];

    assert_eq!(render(&units), "Hé…\u{FFFD}{CR}{C2:08}");
    assert!(units[3].payload.is_text());
    assert!(!units[4].payload.is_text());
    assert_eq!(units[5].payload.kind(), "C2");
}

//! DTVCC code tables
//!
//! Mnemonics for the C0 and C1 control code sets and the glyph mappings for
//! the G0–G3 character sets.

/// Substituted for G2/G3 codes with no assigned glyph.
pub const UNKNOWN_GLYPH: char = '\u{FFFD}';

/// Prefix byte selecting the C2/C3/G2/G3 code sets.
pub const EXT1: u8 = 0x10;

/// 16-bit character escape in the C0 set.
pub const P16: u8 = 0x18;

const C0_NAMES: [&str; 32] = [
    "NUL", "RSV", "RSV", "ETX", "RSV", "RSV", "RSV", "RSV", "BS", "RSV", "RSV", "RSV", "FF",
    "CR", "HCR", "RSV", "EXT1", "RSV", "RSV", "RSV", "RSV", "RSV", "RSV", "RSV", "P16", "RSV",
    "RSV", "RSV", "RSV", "RSV", "RSV", "RSV",
];

const C1_NAMES: [&str; 32] = [
    "CW0", "CW1", "CW2", "CW3", "CW4", "CW5", "CW6", "CW7", "CLW", "DSW", "HDW", "TGW", "DLW",
    "DLY", "DLC", "RST", "SPA", "SPC", "SPL", "RSV93", "RSV94", "RSV95", "RSV96", "SWA", "DF0",
    "DF1", "DF2", "DF3", "DF4", "DF5", "DF6", "DF7",
];

pub fn c0_name(code: u8) -> &'static str {
    C0_NAMES.get(code as usize).copied().unwrap_or("UNK")
}

pub fn c1_name(code: u8) -> &'static str {
    code.checked_sub(0x80)
        .and_then(|i| C1_NAMES.get(i as usize))
        .copied()
        .unwrap_or("UNK")
}

/// G0: ASCII, except 0x7F which is a music note.
pub fn g0_char(code: u8) -> char {
    match code {
        0x7F => '\u{266A}',
        0x20..=0x7E => code as char,
        _ => UNKNOWN_GLYPH,
    }
}

/// G1: the upper half of ISO 8859-1.
pub fn g1_char(code: u8) -> char {
    match code {
        0xA0..=0xFF => code as char,
        _ => UNKNOWN_GLYPH,
    }
}

/// G2: sparse table of typographic and box drawing symbols.
pub fn g2_char(code: u8) -> Option<char> {
    let glyph = match code {
        // Transparent space.
        0x20 => ' ',
        // Non-breaking transparent space.
        0x21 => '\u{00A0}',
        0x25 => '\u{2026}',
        0x2A => '\u{0160}',
        0x2C => '\u{0152}',
        0x30 => '\u{2588}',
        0x31 => '\u{2018}',
        0x32 => '\u{2019}',
        0x33 => '\u{201C}',
        0x34 => '\u{201D}',
        0x35 => '\u{2022}',
        0x39 => '\u{2122}',
        0x3A => '\u{0161}',
        0x3C => '\u{0153}',
        0x3D => '\u{2120}',
        0x3F => '\u{0178}',
        0x76 => '\u{215B}',
        0x77 => '\u{215C}',
        0x78 => '\u{215D}',
        0x79 => '\u{215E}',
        0x7A => '\u{2502}',
        0x7B => '\u{2510}',
        0x7C => '\u{2514}',
        0x7D => '\u{2500}',
        0x7E => '\u{2518}',
        0x7F => '\u{250C}',
        _ => return None,
    };
    Some(glyph)
}

/// G3: only the closed-caption logo is assigned.
pub fn g3_char(code: u8) -> Option<char> {
    (code == 0xA0).then_some('\u{33C4}')
}

#[test]
fn control_code_names() {
    assert_eq!(c0_name(0x0D), "CR");
    assert_eq!(c0_name(0x18), "P16");
    assert_eq!(c0_name(0x20), "UNK");
    assert_eq!(c1_name(0x92), "SPL");
    assert_eq!(c1_name(0x9F), "DF7");
    assert_eq!(c1_name(0x41), "UNK");
}

#[test]
fn character_sets() {
    assert_eq!(g0_char(b'A'), 'A');
    assert_eq!(g0_char(0x7F), '♪');
    assert_eq!(g1_char(0xE9), 'é');
    assert_eq!(g1_char(0xF6), 'ö');
    assert_eq!(g2_char(0x39), Some('™'));
    assert_eq!(g2_char(0x22), None);
    assert_eq!(g3_char(0xA0), Some('㏄'));
    assert_eq!(g3_char(0xA1), None);
}

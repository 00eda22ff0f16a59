use std::io;

use crate::structs::charset::{EXT1, P16, c0_name, c1_name};
use crate::structs::command::{C0Command, C1Command, ExtendedCode};
use crate::structs::unit::Payload;

/// Longest unit: EXT1, a C3 code and five parameter bytes.
pub const MAX_UNIT_LENGTH: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    #[default]
    DataWait,
    C0Pending,
    C1Pending,
    ExtendedPending,
}

/// Byte footprint of the unit introduced by a lead byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Yields one unit spanning this many bytes.
    Unit(usize),
    /// Reserved code: consumes this many bytes, yields nothing.
    Skip(usize),
    /// EXT1: the next byte decides.
    Escape,
}

impl Shape {
    pub fn of(lead: u8) -> Self {
        match lead {
            0x00 | 0x03 | 0x08 | 0x0C | 0x0D | 0x0E => Self::Unit(1),
            0x01..=0x0F => Self::Skip(1),
            EXT1 => Self::Escape,
            0x11..=0x17 => Self::Skip(2),
            P16 => Self::Unit(3),
            0x19..=0x1F => Self::Skip(3),
            0x80..=0x9F => Self::Unit(C1Command::length(lead)),
            0x20..=0x7F | 0xA0..=0xFF => Self::Unit(1),
        }
    }

    /// Total length of an EXT1 sequence, prefix included, from its code
    /// byte. `None` for the variable-length C3 range.
    pub fn extended(code: u8) -> Option<usize> {
        match code {
            0x00..=0x07 => Some(2),
            0x08..=0x0F => Some(3),
            0x10..=0x17 => Some(4),
            0x18..=0x1F => Some(5),
            0x80..=0x87 => Some(6),
            0x88..=0x8F => Some(7),
            0x90..=0x9F => None,
            0x20..=0x7F | 0xA0..=0xFF => Some(2),
        }
    }
}

/// Number of units a service block will yield when decoded.
///
/// A unit that does not fit in the block, and everything after an
/// unsupported C3 code, is not counted.
pub fn count_units(block: &[u8]) -> usize {
    let mut count = 0;
    let mut index = 0;

    while let Some(&lead) = block.get(index) {
        let shape = match Shape::of(lead) {
            Shape::Escape => match block.get(index + 1).copied().and_then(Shape::extended) {
                Some(len) => Shape::Unit(len),
                None => break,
            },
            shape => shape,
        };

        match shape {
            Shape::Unit(len) if index + len <= block.len() => {
                count += 1;
                index += len;
            }
            Shape::Skip(len) => index += len,
            _ => break,
        }
    }

    count
}

/// Result of feeding one byte to the [`CommandDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The current unit needs more bytes.
    Pending,
    Unit(Payload),
    /// A reserved code and its parameter bytes were consumed without output.
    Skipped { code: u8, length: usize },
    /// C3 code in the 0x90–0x9F range; the rest of the block is undecodable.
    Abandoned(u8),
}

/// A unit cut off by the end of its service block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted {
    pub name: &'static str,
    pub needed: usize,
}

/// Byte-at-a-time decoder for the C0/C1/C2/C3 and G0–G3 code sets.
///
/// Holds the unit in progress between calls, so a command may be fed in as
/// many pieces as it arrives in.
#[derive(Debug, Default)]
pub struct CommandDecoder {
    mode: DecodeMode,
    remaining: usize,
    emit: bool,
    pending: Vec<u8>,
}

impl CommandDecoder {
    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Bytes still needed by the unit in progress.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_idle(&self) -> bool {
        self.mode == DecodeMode::DataWait
    }

    pub fn push(&mut self, byte: u8) -> io::Result<Step> {
        match self.mode {
            DecodeMode::DataWait => self.begin(byte),
            DecodeMode::ExtendedPending if self.pending.len() == 1 => self.begin_extended(byte),
            _ => {
                self.pending.push(byte);
                self.remaining = self.remaining.saturating_sub(1);
                self.complete_if_done()
            }
        }
    }

    /// Drops the unit in progress, if any.
    pub fn interrupt(&mut self) -> Option<Interrupted> {
        if self.is_idle() {
            return None;
        }

        let name = match self.pending.first().copied() {
            Some(EXT1) => "EXT1",
            Some(lead @ 0x80..=0x9F) => c1_name(lead),
            Some(lead) => c0_name(lead),
            None => "UNK",
        };
        let interrupted = Interrupted {
            name,
            needed: self.remaining,
        };

        self.reset();
        Some(interrupted)
    }

    fn reset(&mut self) {
        self.mode = DecodeMode::DataWait;
        self.remaining = 0;
        self.emit = false;
        self.pending.clear();
    }

    fn begin(&mut self, lead: u8) -> io::Result<Step> {
        self.pending.clear();
        self.pending.push(lead);

        let (length, emit) = match Shape::of(lead) {
            Shape::Escape => {
                self.mode = DecodeMode::ExtendedPending;
                self.remaining = 1;
                return Ok(Step::Pending);
            }
            Shape::Unit(length) => (length, true),
            Shape::Skip(length) => (length, false),
        };

        self.emit = emit;
        self.remaining = length - 1;
        self.mode = if lead < 0x20 {
            DecodeMode::C0Pending
        } else {
            DecodeMode::C1Pending
        };
        self.complete_if_done()
    }

    fn begin_extended(&mut self, code: u8) -> io::Result<Step> {
        self.pending.push(code);

        match Shape::extended(code) {
            Some(length) => {
                self.emit = true;
                self.remaining = length - 2;
                self.complete_if_done()
            }
            None => {
                self.reset();
                Ok(Step::Abandoned(code))
            }
        }
    }

    fn complete_if_done(&mut self) -> io::Result<Step> {
        if self.remaining > 0 {
            return Ok(Step::Pending);
        }

        let bytes = std::mem::take(&mut self.pending);
        let emit = self.emit;
        self.reset();

        if emit {
            payload(&bytes).map(Step::Unit)
        } else {
            Ok(Step::Skipped {
                code: bytes.first().copied().unwrap_or_default(),
                length: bytes.len(),
            })
        }
    }
}

fn payload(bytes: &[u8]) -> io::Result<Payload> {
    let payload = match *bytes {
        [EXT1, code, ..] => {
            let ext = ExtendedCode {
                code,
                length: bytes.len() as u8,
            };
            match code {
                0x00..=0x1F => Payload::C2(ext),
                0x20..=0x7F => Payload::G2(code),
                0x80..=0x9F => Payload::C3(ext),
                _ => Payload::G3(code),
            }
        }
        [lead @ 0x20..=0x7F] => Payload::G0(lead),
        [lead @ 0xA0..=0xFF] => Payload::G1(lead),
        [0x80..=0x9F, ..] => Payload::C1(C1Command::read(bytes)?),
        _ => Payload::C0(C0Command::from_bytes(bytes).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no unit matches bytes {bytes:02X?}"),
            )
        })?),
    };

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::command::{PenLocation, WindowBitmap};

    fn decode_all(decoder: &mut CommandDecoder, bytes: &[u8]) -> io::Result<Vec<Payload>> {
        let mut units = Vec::new();
        for &byte in bytes {
            if let Step::Unit(payload) = decoder.push(byte)? {
                units.push(payload);
            }
        }
        Ok(units)
    }

    /// One or more of every command and character family.
    const ALL_FAMILIES: &[u8] = &[
        0x00, 0x03, 0x08, 0x0C, 0x0D, 0x0E, // C0
        0x01, // reserved, 1 byte
        0x11, 0x22, // reserved, 2 bytes
        0x18, 0x4E, 0x2D, // P16
        0x1C, 0x00, 0x00, // reserved, 3 bytes
        0x41, 0x7F, // G0
        0xA9, // G1
        0x80, 0x88, 0x01, 0x89, 0x01, 0x8A, 0x01, 0x8B, 0x01, 0x8C, 0x01, 0x8D, 0x0A, 0x8E, 0x8F,
        0x90, 0x05, 0x00, // SPA
        0x91, 0x00, 0x00, 0x00, // SPC
        0x92, 0x01, 0x02, // SPL
        0x93, // RSV93
        0x97, 0x00, 0x00, 0x00, 0x00, // SWA
        0x98, 0x20, 0x00, 0x00, 0x01, 0x1F, 0x00, // DF0
        0x10, 0x00, 0x10, 0x08, 0x00, 0x10, 0x10, 0x00, 0x00, 0x10, 0x18, 0x00, 0x00, 0x00, // C2
        0x10, 0x25, 0x10, 0x22, // G2
        0x10, 0x80, 0x00, 0x00, 0x00, 0x00, // C3, 6 bytes
        0x10, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00, // C3, 7 bytes
        0x10, 0xA0, 0x10, 0xA1, // G3
    ];

    #[test]
    fn pre_count_matches_output() -> io::Result<()> {
        let mut decoder = CommandDecoder::default();
        let units = decode_all(&mut decoder, ALL_FAMILIES)?;

        assert_eq!(units.len(), 35);
        assert_eq!(count_units(ALL_FAMILIES), units.len());
        assert!(decoder.is_idle());

        let kinds = ["C0", "C1", "C2", "C3", "G0", "G1", "G2", "G3"];
        for kind in kinds {
            assert!(units.iter().any(|u| u.kind() == kind), "no {kind} unit");
        }
        Ok(())
    }

    #[test]
    fn pre_count_stops_at_block_end() {
        // SPL missing its column byte.
        assert_eq!(count_units(&[0x41, 0x92, 0x01]), 1);
        // Lone EXT1.
        assert_eq!(count_units(&[0x41, 0x42, 0x10]), 2);
        // Unsupported C3 range hides the rest of the block.
        assert_eq!(count_units(&[0x41, 0x10, 0x90, 0x41, 0x42]), 1);
    }

    #[test]
    fn command_spanning_calls() -> io::Result<()> {
        let mut decoder = CommandDecoder::default();

        assert_eq!(decoder.push(0x92)?, Step::Pending);
        assert_eq!(decoder.mode(), DecodeMode::C1Pending);
        assert_eq!(decoder.remaining(), 2);

        let units = decode_all(&mut decoder, &[0x03, 0x11])?;
        assert_eq!(
            units,
            [Payload::C1(C1Command::SetPenLocation(PenLocation {
                row: 3,
                column: 17
            }))]
        );
        assert!(decoder.is_idle());
        Ok(())
    }

    #[test]
    fn define_window_leaves_nothing_pending() -> io::Result<()> {
        let mut decoder = CommandDecoder::default();
        let units = decode_all(&mut decoder, &[0x99, 0x38, 0x00, 0x00, 0x60, 0x1F, 0x08])?;
        assert!(matches!(units[..], [Payload::C1(C1Command::DefineWindow(_))]));
        assert_eq!(decoder.remaining(), 0);
        assert_eq!(decoder.mode(), DecodeMode::DataWait);

        // The next two bytes are characters, not leftover parameters.
        let units = decode_all(&mut decoder, &[0x48, 0x69])?;
        assert_eq!(units, [Payload::G0(b'H'), Payload::G0(b'i')]);
        Ok(())
    }

    #[test]
    fn extended_lengths() -> io::Result<()> {
        for (bytes, length) in [
            (&[0x10, 0x07][..], 2),
            (&[0x10, 0x0F, 0x00][..], 3),
            (&[0x10, 0x17, 0x00, 0x00][..], 4),
            (&[0x10, 0x1F, 0x00, 0x00, 0x00][..], 5),
            (&[0x10, 0x87, 0x00, 0x00, 0x00, 0x00][..], 6),
            (&[0x10, 0x8F, 0x00, 0x00, 0x00, 0x00, 0x00][..], 7),
        ] {
            let mut decoder = CommandDecoder::default();
            let units = decode_all(&mut decoder, bytes)?;
            match units[..] {
                [Payload::C2(ext) | Payload::C3(ext)] => assert_eq!(ext.length as usize, length),
                _ => panic!("{bytes:02X?} decoded to {units:?}"),
            }
            assert_eq!(bytes.len(), length);
            assert!(decoder.is_idle());
        }
        Ok(())
    }

    #[test]
    fn reserved_and_unsupported() -> io::Result<()> {
        let mut decoder = CommandDecoder::default();

        assert_eq!(decoder.push(0x01)?, Step::Skipped { code: 0x01, length: 1 });
        assert_eq!(decoder.push(0x1A)?, Step::Pending);
        assert_eq!(decoder.mode(), DecodeMode::C0Pending);
        assert_eq!(decoder.push(0x00)?, Step::Pending);
        assert_eq!(decoder.push(0x00)?, Step::Skipped { code: 0x1A, length: 3 });

        assert_eq!(decoder.push(0x10)?, Step::Pending);
        assert_eq!(decoder.mode(), DecodeMode::ExtendedPending);
        assert_eq!(decoder.push(0x95)?, Step::Abandoned(0x95));
        assert!(decoder.is_idle());

        assert_eq!(
            decoder.push(0x94)?,
            Step::Unit(Payload::C1(C1Command::Reserved(0x94)))
        );
        Ok(())
    }

    #[test]
    fn interrupted_unit() -> io::Result<()> {
        let mut decoder = CommandDecoder::default();
        assert_eq!(decoder.interrupt(), None);

        decode_all(&mut decoder, &[0x88])?;
        assert_eq!(
            decoder.interrupt(),
            Some(Interrupted {
                name: "CLW",
                needed: 1
            })
        );
        assert!(decoder.is_idle());

        assert_eq!(
            decode_all(&mut decoder, &[0x8C, 0xFF])?,
            [Payload::C1(C1Command::DeleteWindows(WindowBitmap(0xFF)))]
        );
        Ok(())
    }
}

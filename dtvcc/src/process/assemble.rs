use crate::structs::construct::{CaptionConstruct, ConstructType};
use crate::structs::packet::{AssembledPacket, MAX_PACKET_LENGTH};
use crate::structs::timestamp::CaptionTime;
use crate::utils::errors::PacketError;

/// Collects packet-start and packet-data constructs into channel packets.
///
/// A packet is complete when the next packet-start arrives, so every
/// packet-start hands back whatever was collected before it, even nothing.
#[derive(Debug)]
pub struct PacketAssembler {
    packet: AssembledPacket,
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self {
            packet: AssembledPacket::with_capacity(MAX_PACKET_LENGTH),
        }
    }
}

impl PacketAssembler {
    /// Feeds one construct.
    ///
    /// Returns the previous packet on packet-start. Payload bytes that would
    /// grow the packet past [`MAX_PACKET_LENGTH`] are dropped and reported as
    /// [`PacketError::Overflow`]; the packet collected so far is kept.
    pub fn push(
        &mut self,
        construct: &CaptionConstruct,
        time: CaptionTime,
    ) -> Result<Option<AssembledPacket>, PacketError> {
        match construct.construct_type {
            ConstructType::PacketStart => {
                let previous = std::mem::replace(
                    &mut self.packet,
                    AssembledPacket::with_capacity(MAX_PACKET_LENGTH),
                );
                if construct.valid {
                    self.packet.extend(&construct.data);
                }
                Ok(Some(previous))
            }
            ConstructType::PacketData if construct.valid => {
                if self.packet.len() + construct.data.len() > MAX_PACKET_LENGTH {
                    return Err(PacketError::Overflow {
                        time,
                        dropped: construct.data.len(),
                    });
                }
                self.packet.extend(&construct.data);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Bytes collected for the packet in progress.
    pub fn pending(&self) -> usize {
        self.packet.len()
    }

    /// Hands back the packet in progress at end of stream, if it holds anything.
    pub fn finish(&mut self) -> Option<AssembledPacket> {
        let packet = std::mem::take(&mut self.packet);
        (!packet.is_empty()).then_some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construct(bytes: [u8; 3]) -> CaptionConstruct {
        CaptionConstruct::from_bytes(bytes)
    }

    #[test]
    fn packets_close_on_next_start() -> anyhow::Result<()> {
        let time = CaptionTime::default();
        let mut assembler = PacketAssembler::default();

        let first = assembler.push(&construct([0xFF, 0x02, 0x21]), time)?;
        assert_eq!(first, Some(AssembledPacket::default()));

        assert_eq!(assembler.push(&construct([0xFE, 0x41, 0x42]), time)?, None);
        // Invalid data and Line 21 pairs are not part of the packet.
        assert_eq!(assembler.push(&construct([0xFA, 0x00, 0x00]), time)?, None);
        assert_eq!(assembler.push(&construct([0xFC, 0x94, 0x2C]), time)?, None);
        assert_eq!(assembler.pending(), 4);

        let packet = assembler.push(&construct([0xFF, 0x43, 0x02]), time)?;
        assert_eq!(
            packet.as_ref().map(AssembledPacket::as_bytes),
            Some(&[0x02, 0x21, 0x41, 0x42][..])
        );

        assert_eq!(
            assembler.finish().as_ref().map(AssembledPacket::as_bytes),
            Some(&[0x43, 0x02][..])
        );
        assert_eq!(assembler.finish(), None);
        Ok(())
    }

    #[test]
    fn invalid_start_still_closes_packet() -> anyhow::Result<()> {
        let time = CaptionTime::default();
        let mut assembler = PacketAssembler::default();

        assembler.push(&construct([0xFF, 0x02, 0x21]), time)?;
        let packet = assembler.push(&construct([0xFB, 0x02, 0x21]), time)?;
        assert_eq!(packet.map(|p| p.len()), Some(2));
        assert_eq!(assembler.pending(), 0);
        Ok(())
    }

    #[test]
    fn overflow_is_dropped() -> anyhow::Result<()> {
        let time = CaptionTime::default();
        let mut assembler = PacketAssembler::default();

        assembler.push(&construct([0xFF, 0x00, 0x00]), time)?;
        for _ in 1..MAX_PACKET_LENGTH / 2 {
            assembler.push(&construct([0xFE, 0x00, 0x00]), time)?;
        }
        assert_eq!(assembler.pending(), MAX_PACKET_LENGTH);

        let overflow = assembler.push(&construct([0xFE, 0x00, 0x00]), time);
        assert!(matches!(overflow, Err(PacketError::Overflow { dropped: 2, .. })));
        assert_eq!(assembler.pending(), MAX_PACKET_LENGTH);
        Ok(())
    }
}

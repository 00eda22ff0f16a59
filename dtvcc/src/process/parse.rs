use anyhow::Result;
use log::{Level, trace};

use crate::log_or_err;
use crate::structs::packet::{
    AssembledPacket, EXTENDED_SERVICE_NUMBER, ServiceBlock, ServiceBlockHeader,
};
use crate::structs::timestamp::CaptionTime;
use crate::utils::errors::PacketError;
use crate::utils::rate_limit::RateLimiter;

/// Splits assembled channel packets into service blocks.
///
/// Checks the packet sequence number and declared size on the way; both are
/// reported and then ignored, the blocks are taken from the bytes as
/// assembled.
#[derive(Debug, Default)]
pub struct PacketParser {
    state: ParserState,
}

impl PacketParser {
    pub fn parse<'a>(
        &mut self,
        packet: &'a AssembledPacket,
        time: CaptionTime,
    ) -> Result<Vec<ServiceBlock<'a>>> {
        let state = &mut self.state;
        let first_packet = std::mem::replace(&mut state.first_packet, false);

        let Some(header) = packet.header() else {
            if first_packet {
                trace!("Empty packet before the first packet start at {time}");
            } else {
                state.stats.zero_length_packets += 1;
                state
                    .zero_length
                    .report(state.fail_level, Level::Warn, PacketError::ZeroLength(time))?;
            }
            return Ok(Vec::new());
        };

        state.stats.packets += 1;

        if let Some(last) = state.last_sequence {
            let expected = (last + 1) % 4;
            if header.sequence_number != expected {
                state.stats.sequence_errors += 1;
                log_or_err!(
                    state,
                    Level::Warn,
                    PacketError::SequenceDiscontinuity {
                        time,
                        actual: header.sequence_number,
                        expected,
                    }
                );
            }
        }
        state.last_sequence = Some(header.sequence_number);

        if header.declared_size() != packet.len() {
            state.stats.length_mismatches += 1;
            state.length_mismatch.report(
                state.fail_level,
                Level::Warn,
                PacketError::LengthMismatch {
                    time,
                    declared: header.declared_size(),
                    actual: packet.len(),
                },
            )?;
        }

        let payload = packet.payload();
        let mut blocks = Vec::new();
        let mut index = 0;

        while index + 2 <= payload.len() {
            let block_header = ServiceBlockHeader::read(payload[index])?;
            if block_header.block_size == 0 {
                break;
            }
            index += 1;

            let mut service_number = block_header.service_number;
            let mut block_size = block_header.block_size as usize;

            if block_header.is_extended() {
                let Some(&extended) = payload.get(index) else {
                    log_or_err!(state, Level::Warn, PacketError::TruncatedExtendedHeader(time));
                    break;
                };
                index += 1;
                service_number = ServiceBlockHeader::read_extended(extended)?;

                // Numbers 1-6 belong in the standard header; still decoded.
                if (1..EXTENDED_SERVICE_NUMBER).contains(&service_number) {
                    state.stats.illegal_services += 1;
                    log_or_err!(
                        state,
                        Level::Warn,
                        PacketError::IllegalExtendedService {
                            time,
                            service: service_number,
                        }
                    );
                }
            }

            if service_number == 0 {
                state.stats.illegal_services += 1;
                log_or_err!(
                    state,
                    Level::Warn,
                    PacketError::ServiceZero {
                        time,
                        size: block_size,
                    }
                );
                break;
            }

            let available = payload.len() - index;
            if block_size > available {
                log_or_err!(
                    state,
                    Level::Warn,
                    PacketError::BlockOverrun {
                        time,
                        service: service_number,
                        declared: block_size,
                        available,
                    }
                );
                block_size = available;
            }

            blocks.push(ServiceBlock {
                service_number,
                block_size: block_header.block_size,
                data: &payload[index..index + block_size],
            });
            index += block_size;
        }

        state.stats.service_blocks += blocks.len();
        Ok(blocks)
    }

    pub fn stats(&self) -> PacketStats {
        self.state.stats
    }

    /// Logs how many rate-limited warnings never reached the log.
    pub fn report_suppressed(&self) {
        self.state.zero_length.report_suppressed();
        self.state.length_mismatch.report_suppressed();
    }

    /// Sets the failure level for packet anomalies.
    ///
    /// - `None`: never fail, log only (default)
    /// - `Some(log::Level::Warn)`: fail on any anomaly (strict mode)
    pub fn set_fail_level(&mut self, level: Option<Level>) {
        self.state.fail_level = level;
    }
}

/// Running counts kept by the [`PacketParser`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketStats {
    pub packets: usize,
    pub service_blocks: usize,
    pub zero_length_packets: usize,
    pub length_mismatches: usize,
    pub sequence_errors: usize,
    pub illegal_services: usize,
}

#[derive(Debug)]
pub struct ParserState {
    pub fail_level: Option<Level>,
    pub first_packet: bool,
    pub last_sequence: Option<u8>,
    pub zero_length: RateLimiter,
    pub length_mismatch: RateLimiter,
    pub stats: PacketStats,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            fail_level: None,
            first_packet: true,
            last_sequence: None,
            zero_length: RateLimiter::new("Zero length packets", 0),
            length_mismatch: RateLimiter::new("Packet length mismatches", 5),
            stats: PacketStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(parser: &mut PacketParser, bytes: &[u8]) -> Result<Vec<(u8, Vec<u8>)>> {
        let packet = AssembledPacket::from_bytes(bytes);
        Ok(parser
            .parse(&packet, CaptionTime::default())?
            .into_iter()
            .map(|block| (block.service_number, block.data.to_vec()))
            .collect())
    }

    #[test]
    fn standard_and_extended_services() -> Result<()> {
        let mut parser = PacketParser::default();

        let blocks = parse(
            &mut parser,
            &[0x04, 0x22, 0x48, 0x69, 0x41, 0x41, 0x00, 0x00],
        )?;
        assert_eq!(blocks, [(1, vec![0x48, 0x69]), (2, vec![0x41])]);

        let blocks = parse(&mut parser, &[0x43, 0xE2, 0x0A, 0x41, 0x42, 0x00])?;
        assert_eq!(blocks, [(10, vec![0x41, 0x42])]);

        let stats = parser.stats();
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.service_blocks, 3);
        assert_eq!(stats.length_mismatches, 0);
        assert_eq!(stats.sequence_errors, 0);
        Ok(())
    }

    #[test]
    fn null_block_ends_packet() -> Result<()> {
        let mut parser = PacketParser::default();
        let blocks = parse(&mut parser, &[0x03, 0xE0, 0x21, 0x41, 0x00, 0x00])?;
        assert!(blocks.is_empty());
        assert_eq!(parser.stats().service_blocks, 0);
        Ok(())
    }

    #[test]
    fn illegal_service_numbers() -> Result<()> {
        let mut parser = PacketParser::default();

        // Extended number 5 is logged but its block is still decoded.
        let blocks = parse(&mut parser, &[0x03, 0xE1, 0x05, 0x41, 0x21, 0x42])?;
        assert_eq!(blocks, [(5, vec![0x41]), (1, vec![0x42])]);

        // Service 0 abandons the rest of the packet.
        let blocks = parse(&mut parser, &[0x43, 0x01, 0x41, 0x21, 0x42, 0x00])?;
        assert!(blocks.is_empty());

        assert_eq!(parser.stats().illegal_services, 2);
        Ok(())
    }

    #[test]
    fn extended_service_zero_abandons_packet() -> Result<()> {
        let mut parser = PacketParser::default();

        let blocks = parse(&mut parser, &[0x03, 0xE1, 0x03, 0x41])?;
        assert_eq!(blocks, [(3, vec![0x41])]);

        let blocks = parse(&mut parser, &[0x43, 0xE1, 0x00, 0x41, 0x21, 0x42])?;
        assert!(blocks.is_empty());

        let stats = parser.stats();
        assert_eq!(stats.illegal_services, 2);
        assert_eq!(stats.service_blocks, 1);
        Ok(())
    }

    #[test]
    fn block_overrun_is_clamped() -> Result<()> {
        let mut parser = PacketParser::default();
        let blocks = parse(&mut parser, &[0x02, 0x25, 0x41, 0x42])?;
        assert_eq!(blocks, [(1, vec![0x41, 0x42])]);
        Ok(())
    }

    #[test]
    fn sequence_skip_warns_once() -> Result<()> {
        let mut parser = PacketParser::default();
        for header in [0x02, 0x42, 0xC2, 0x02, 0x42] {
            parse(&mut parser, &[header, 0x21, 0x41, 0x00])?;
        }
        assert_eq!(parser.stats().sequence_errors, 1);

        let mut strict = PacketParser::default();
        strict.set_fail_level(Some(Level::Warn));
        parse(&mut strict, &[0x02, 0x21, 0x41, 0x00])?;
        assert!(parse(&mut strict, &[0xC2, 0x21, 0x41, 0x00]).is_err());
        Ok(())
    }

    #[test]
    fn length_problems_are_not_fatal() -> Result<()> {
        let mut parser = PacketParser::default();

        // The very first flush is expected to be empty.
        assert!(parse(&mut parser, &[])?.is_empty());
        assert_eq!(parser.stats().zero_length_packets, 0);

        // Declared 32, assembled 4.
        let blocks = parse(&mut parser, &[0x10, 0x21, 0x41, 0x00])?;
        assert_eq!(blocks, [(1, vec![0x41])]);
        assert_eq!(parser.stats().length_mismatches, 1);

        parse(&mut parser, &[])?;
        parse(&mut parser, &[])?;
        assert_eq!(parser.stats().zero_length_packets, 2);
        Ok(())
    }
}

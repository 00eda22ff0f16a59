use std::fmt::{self, Display, Formatter};

use anyhow::{Context, Result};
use log::{Level, debug, error, info, trace, warn};

use crate::log_or_err;
use crate::process::assemble::PacketAssembler;
use crate::process::decode::{CommandDecoder, Step, count_units};
use crate::process::parse::PacketParser;
use crate::process::style::{ServiceStyle, StyleClassifier};
use crate::structs::charset::UNKNOWN_GLYPH;
use crate::structs::command::{C0Command, C1Command};
use crate::structs::construct::CaptionConstruct;
use crate::structs::packet::{AssembledPacket, ServiceBlock};
use crate::structs::timestamp::CaptionTime;
use crate::structs::unit::{DecodedUnit, Payload};
use crate::utils::buffer_pool::{Buffer, BufferPool, DataType};
use crate::utils::errors::{DecodeError, SinkError};
use crate::utils::rate_limit::RateLimiter;
use crate::utils::sinks::{LinkInfo, Sink, Sinks};

/// Settings fixed when a [`DtvccDecoder`] is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Decode for diagnostics only; output buffers are released undelivered.
    pub process_only: bool,
    /// Data anomalies at or above this level become errors. `None` only logs.
    pub fail_level: Option<Level>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    units: usize,
    unknown_commands: usize,
    reserved_commands: usize,
    extended_codes: usize,
    unknown_glyphs: usize,
    p16_commands: usize,
    decode_errors: usize,
    overflows: usize,
}

/// The DTVCC pipeline stage.
///
/// Consumes buffers of raw `cc_data` constructs and emits, for every service
/// block, one buffer of [`DecodedUnit`]s sized to exactly the units the block
/// holds. All decode state lives here, so several decoders can run side by
/// side.
pub struct DtvccDecoder {
    config: DecoderConfig,
    pool: BufferPool,
    sinks: Sinks<DecodedUnit>,
    assembler: PacketAssembler,
    parser: PacketParser,
    decoder: CommandDecoder,
    styles: StyleClassifier,
    p16: RateLimiter,
    counters: Counters,
    active_services: u64,
    first_text_found: bool,
    last_time: CaptionTime,
    terminated: bool,
}

impl DtvccDecoder {
    pub fn new(pool: BufferPool, config: DecoderConfig) -> Self {
        let mut parser = PacketParser::default();
        parser.set_fail_level(config.fail_level);

        Self {
            config,
            pool,
            sinks: Sinks::default(),
            assembler: PacketAssembler::default(),
            parser,
            decoder: CommandDecoder::default(),
            styles: StyleClassifier::default(),
            p16: RateLimiter::new("P16 commands", 5),
            counters: Counters::default(),
            active_services: 0,
            first_text_found: false,
            last_time: CaptionTime::default(),
            terminated: false,
        }
    }

    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    /// Registers a consumer of decoded units.
    ///
    /// Refused (logged, `Ok(false)`) in process-only mode or on a type
    /// mismatch.
    pub fn add_sink(&mut self, sink: Box<dyn Sink<DecodedUnit>>) -> Result<bool, SinkError> {
        if self.config.process_only {
            error!(
                "Cannot add sink {} to a process-only DTVCC decoder",
                sink.link().name
            );
            return Ok(false);
        }
        self.sinks.add(sink)
    }

    /// True once any G0–G3 character has been decoded.
    pub fn first_text_found(&self) -> bool {
        self.first_text_found
    }

    /// Decodes one buffer of constructs.
    ///
    /// Returns `Ok(false)` if a sink failed to accept some output. Packets
    /// still open at the end of the buffer carry over to the next call.
    pub fn process(&mut self, buffer: &Buffer<u8>) -> Result<bool> {
        let time = *buffer.caption_time();
        self.last_time = time;

        let constructs = CaptionConstruct::parse_all(buffer.elements())?;
        let mut success = true;

        for (i, construct) in constructs.enumerate() {
            trace!(
                "Construct {} : {:?} valid={} : {:02X} {:02X}",
                i + 1,
                construct.construct_type,
                construct.valid,
                construct.data[0],
                construct.data[1]
            );

            match self.assembler.push(&construct, time) {
                Ok(Some(packet)) => success &= self.process_packet(&packet, time)?,
                Ok(None) => {}
                Err(e) => {
                    self.counters.overflows += 1;
                    log_or_err!(self.config, Level::Error, e);
                }
            }
        }

        Ok(success)
    }

    /// Decodes the last open packet, reports diagnostics and terminates the sinks.
    pub fn finish(&mut self) -> Result<bool> {
        if self.terminated {
            warn!("DTVCC decoder terminated twice");
            return Ok(true);
        }
        self.terminated = true;

        let mut success = true;
        if let Some(packet) = self.assembler.finish() {
            success &= self.process_packet(&packet, self.last_time)?;
        }

        self.report();

        if !self.config.process_only {
            success &= self.sinks.shutdown()?;
        }
        Ok(success)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let packets = self.parser.stats();
        let styles = (1..=63u8)
            .filter(|service| self.active_services & (1 << (service - 1)) != 0)
            .filter_map(|service| self.styles.service(service).map(|style| (service, *style)))
            .collect();

        Diagnostics {
            packets: packets.packets,
            service_blocks: packets.service_blocks,
            units: self.counters.units,
            unknown_commands: self.counters.unknown_commands,
            reserved_commands: self.counters.reserved_commands,
            extended_codes: self.counters.extended_codes,
            unknown_glyphs: self.counters.unknown_glyphs,
            p16_commands: self.counters.p16_commands,
            zero_length_packets: packets.zero_length_packets,
            length_mismatches: packets.length_mismatches,
            sequence_errors: packets.sequence_errors,
            illegal_services: packets.illegal_services,
            decode_errors: self.counters.decode_errors,
            overflows: self.counters.overflows,
            ambiguous_styles: self.styles.ambiguous_services(),
            active_services: self.active_services,
            styles,
        }
    }

    fn report(&self) {
        self.p16.report_suppressed();
        self.parser.report_suppressed();

        let diagnostics = self.diagnostics();
        info!(
            "DTVCC decoded {} units from {} packets, {} service blocks",
            diagnostics.units, diagnostics.packets, diagnostics.service_blocks
        );
        if diagnostics.unknown_commands > 0 || diagnostics.decode_errors > 0 {
            warn!(
                "DTVCC unknown commands: {}, decode errors: {}",
                diagnostics.unknown_commands, diagnostics.decode_errors
            );
        }
        self.styles.report(self.active_services);
    }

    fn process_packet(&mut self, packet: &AssembledPacket, time: CaptionTime) -> Result<bool> {
        let blocks = self.parser.parse(packet, time)?;
        let sequence_number = packet.header().map_or(0, |header| header.sequence_number);

        let mut success = true;
        for block in &blocks {
            success &= self.process_block(block, sequence_number, time)?;
        }
        Ok(success)
    }

    fn process_block(
        &mut self,
        block: &ServiceBlock,
        sequence_number: u8,
        time: CaptionTime,
    ) -> Result<bool> {
        let service = block.service_number;
        let expected = count_units(block.data);

        if let Some(bit) = service.checked_sub(1) {
            self.active_services |= 1 << bit;
        }
        trace!(
            "Service {service} block, {} bytes, {expected} units: {:02X?}",
            block.data.len(),
            block.data
        );

        let mut output = match expected {
            0 => None,
            n => Some(self.pool.allocate::<DecodedUnit>(n, time)?),
        };
        let mut emitted = 0;

        for &byte in block.data {
            let step = self
                .decoder
                .push(byte)
                .with_context(|| format!("Decoding service {service} at {time}"))?;

            match step {
                Step::Pending => {}
                Step::Unit(payload) => {
                    emitted += 1;
                    self.observe(&payload, service, time)?;
                    if let Some(output) = output.as_mut() {
                        output.push(DecodedUnit {
                            sequence_number,
                            service_number: service,
                            payload,
                        })?;
                    }
                }
                Step::Skipped { code, length } => {
                    self.counters.unknown_commands += 1;
                    log_or_err!(
                        self.config,
                        Level::Warn,
                        DecodeError::UnknownCommand { time, code, length }
                    );
                }
                Step::Abandoned(code) => {
                    self.counters.decode_errors += 1;
                    log_or_err!(
                        self.config,
                        Level::Error,
                        DecodeError::UnsupportedC3 {
                            time,
                            service,
                            code
                        }
                    );
                    break;
                }
            }
        }

        if let Some(interrupted) = self.decoder.interrupt() {
            self.counters.decode_errors += 1;
            log_or_err!(
                self.config,
                Level::Error,
                DecodeError::Truncated {
                    time,
                    service,
                    name: interrupted.name,
                    needed: interrupted.needed,
                }
            );
        }

        if emitted != expected {
            return Err(DecodeError::UnitCountMismatch {
                service,
                expected,
                actual: emitted,
            }
            .into());
        }
        self.counters.units += emitted;

        let Some(output) = output else {
            return Ok(true);
        };

        if self.config.process_only {
            output.release()?;
            return Ok(true);
        }
        self.sinks.dispatch(output)
    }

    fn observe(&mut self, payload: &Payload, service: u8, time: CaptionTime) -> Result<()> {
        match payload {
            Payload::C0(C0Command::P16(symbols)) => {
                self.counters.p16_commands += 1;
                self.p16.report(
                    self.config.fail_level,
                    Level::Warn,
                    DecodeError::P16Command {
                        time,
                        service,
                        symbols: *symbols,
                    },
                )?;
            }
            Payload::C1(C1Command::Reserved(code)) => {
                self.counters.reserved_commands += 1;
                log_or_err!(
                    self.config,
                    Level::Warn,
                    DecodeError::ReservedCommand { time, code: *code }
                );
            }
            Payload::C1(C1Command::DefineWindow(definition)) => {
                self.styles.observe_window(service, definition);
            }
            Payload::C1(C1Command::DisplayWindows(windows) | C1Command::ToggleWindows(windows)) => {
                self.styles.observe_display(service, *windows, time);
            }
            Payload::C2(ext) | Payload::C3(ext) => {
                self.counters.extended_codes += 1;
                debug!("Skipping {} code {:#04X} on service {service}", payload.kind(), ext.code);
            }
            _ => {}
        }

        if let Payload::G2(code) | Payload::G3(code) = payload {
            if payload.glyph() == Some(UNKNOWN_GLYPH) {
                self.counters.unknown_glyphs += 1;
                debug!("Unknown {} character {code:#04X} on service {service}", payload.kind());
            }
        }

        if !self.first_text_found && payload.is_text() {
            self.first_text_found = true;
            debug!("First DTVCC text found on service {service} at {time}");
        }
        Ok(())
    }
}

impl Sink<u8> for DtvccDecoder {
    fn link(&self) -> LinkInfo {
        LinkInfo {
            name: "DTVCC Decoder",
            consumes: DataType::CcData,
            produces: Some(DataType::Dtvcc),
        }
    }

    fn accept(&mut self, buffer: Buffer<u8>) -> Result<bool> {
        let success = self.process(&buffer)?;
        buffer.release()?;
        Ok(success)
    }

    fn terminate(&mut self) -> Result<bool> {
        self.finish()
    }
}

/// Counters and per-service styles collected by a [`DtvccDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub packets: usize,
    pub service_blocks: usize,
    pub units: usize,
    pub unknown_commands: usize,
    pub reserved_commands: usize,
    pub extended_codes: usize,
    pub unknown_glyphs: usize,
    pub p16_commands: usize,
    pub zero_length_packets: usize,
    pub length_mismatches: usize,
    pub sequence_errors: usize,
    pub illegal_services: usize,
    pub decode_errors: usize,
    pub overflows: usize,
    pub ambiguous_styles: usize,
    /// Bit n set when service n + 1 carried data.
    pub active_services: u64,
    pub styles: Vec<(u8, ServiceStyle)>,
}

impl Diagnostics {
    pub fn active_service_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.styles.iter().map(|(service, _)| *service)
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Packets", self.packets),
            ("Service blocks", self.service_blocks),
            ("Decoded units", self.units),
            ("Unknown commands", self.unknown_commands),
            ("Reserved commands", self.reserved_commands),
            ("C2/C3 codes", self.extended_codes),
            ("Unknown glyphs", self.unknown_glyphs),
            ("P16 commands", self.p16_commands),
            ("Zero length packets", self.zero_length_packets),
            ("Length mismatches", self.length_mismatches),
            ("Sequence errors", self.sequence_errors),
            ("Illegal services", self.illegal_services),
            ("Decode errors", self.decode_errors),
            ("Packet overflows", self.overflows),
            ("Ambiguous styles", self.ambiguous_styles),
        ];
        for (label, value) in rows {
            writeln!(f, "{:<22}{value}", format!("{label}:"))?;
        }

        for (service, style) in &self.styles {
            let label = format!("Service {service}:");
            match style.style() {
                Some(caption_style) => writeln!(f, "{label:<22}{caption_style}")?,
                None if style.ambiguous => writeln!(f, "{label:<22}Ambiguous ({style})")?,
                None => writeln!(f, "{label:<22}Unset")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::process::EXAMPLE_DATA;
    use crate::process::style::CaptionStyle;
    use crate::structs::command::{PenLocation, WindowBitmap};
    use crate::structs::unit::render;
    use crate::utils::sinks::tests::CaptureSink;

    type Received = Rc<RefCell<Vec<Vec<DecodedUnit>>>>;

    fn feed(decoder: &mut DtvccDecoder, pool: &BufferPool, bytes: &[u8]) -> Result<bool> {
        let mut buffer = pool.allocate::<u8>(bytes.len(), CaptionTime::default())?;
        buffer.extend_from_slice(bytes)?;
        decoder.accept(buffer)
    }

    fn with_capture(pool: &BufferPool, config: DecoderConfig) -> Result<(DtvccDecoder, Received)> {
        let mut decoder = DtvccDecoder::new(pool.clone(), config);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = CaptureSink::<DecodedUnit>::new("capture", &calls);
        let received = Rc::clone(&sink.received);
        assert!(decoder.add_sink(Box::new(sink))?);
        Ok((decoder, received))
    }

    #[test]
    fn decode_example_data() -> Result<()> {
        let pool = BufferPool::default();
        let (mut decoder, received) = with_capture(&pool, DecoderConfig::default())?;

        assert!(feed(&mut decoder, &pool, EXAMPLE_DATA)?);
        // The second packet is still open.
        assert_eq!(received.borrow().len(), 1);
        assert!(decoder.finish()?);

        let received = received.borrow();
        assert_eq!(received.len(), 2);

        let first = &received[0];
        assert_eq!(first.len(), 9);
        assert!(matches!(
            first[0].payload,
            Payload::C1(C1Command::DefineWindow(_))
        ));
        assert_eq!(
            first[1].payload,
            Payload::C1(C1Command::SetPenLocation(PenLocation { row: 0, column: 0 }))
        );
        assert_eq!(render(&first[2..8]), "Hello{CR}");
        assert_eq!(
            first[8].payload,
            Payload::C1(C1Command::DisplayWindows(WindowBitmap(0x01)))
        );
        assert!(first.iter().all(|u| u.sequence_number == 0 && u.service_number == 1));

        assert_eq!(render(&received[1]), "Hié™{CR}");
        assert!(received[1].iter().all(|u| u.sequence_number == 1));

        let diagnostics = decoder.diagnostics();
        assert_eq!(diagnostics.packets, 2);
        assert_eq!(diagnostics.service_blocks, 2);
        assert_eq!(diagnostics.units, 14);
        assert_eq!(diagnostics.zero_length_packets, 0);
        assert_eq!(diagnostics.length_mismatches, 0);
        assert_eq!(diagnostics.sequence_errors, 0);
        assert_eq!(diagnostics.active_services, 0b1);
        assert_eq!(
            diagnostics.styles.first().and_then(|(_, s)| s.style()),
            Some(CaptionStyle::RollUp)
        );
        assert!(decoder.first_text_found());
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn command_split_across_input_buffers() -> Result<()> {
        let pool = BufferPool::default();
        let (mut decoder, received) = with_capture(&pool, DecoderConfig::default())?;

        // Service 1, 4 bytes: 'A' then SPL row 3 column 17. The SPL command
        // byte arrives in the first buffer, its parameters in the second.
        feed(&mut decoder, &pool, &[0xFF, 0x03, 0x24, 0xFE, 0x41, 0x92])?;
        feed(&mut decoder, &pool, &[0xFE, 0x03, 0x11])?;
        decoder.finish()?;

        let received = received.borrow();
        let payloads: Vec<Payload> = received.iter().flatten().map(|u| u.payload).collect();
        assert_eq!(
            payloads,
            [
                Payload::G0(b'A'),
                Payload::C1(C1Command::SetPenLocation(PenLocation { row: 3, column: 17 })),
            ]
        );
        assert_eq!(decoder.diagnostics().decode_errors, 0);
        Ok(())
    }

    #[test]
    fn zero_length_packets_are_tolerated() -> Result<()> {
        let pool = BufferPool::default();
        let (mut decoder, received) = with_capture(&pool, DecoderConfig::default())?;

        // Packet start carrying 0x10 0x10 (declared 32 bytes), then an
        // invalid start that leaves an empty packet, then another start.
        let bytes = [0xFF, 0x10, 0x10, 0xFB, 0x00, 0x00, 0xFF, 0x10, 0x10];
        assert!(feed(&mut decoder, &pool, &bytes)?);
        assert!(decoder.finish()?);

        let diagnostics = decoder.diagnostics();
        assert_eq!(diagnostics.zero_length_packets, 1);
        assert_eq!(diagnostics.length_mismatches, 2);
        assert_eq!(diagnostics.service_blocks, 0);
        assert!(received.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn truncated_unit_is_dropped() -> Result<()> {
        let pool = BufferPool::default();
        let (mut decoder, received) = with_capture(&pool, DecoderConfig::default())?;

        // Service 1 block of 2 bytes ends inside an SPL; service 2 follows.
        let bytes = [0xFF, 0x03, 0x22, 0xFE, 0x41, 0x92, 0xFE, 0x41, 0x42];
        feed(&mut decoder, &pool, &bytes)?;
        decoder.finish()?;

        let received = received.borrow();
        assert_eq!(received.len(), 2);
        assert_eq!(render(&received[0]), "A");
        assert_eq!(received[1][0].service_number, 2);
        assert_eq!(render(&received[1]), "B");
        assert_eq!(decoder.diagnostics().decode_errors, 1);
        assert_eq!(decoder.diagnostics().active_services, 0b11);
        Ok(())
    }

    #[test]
    fn process_only_mode() -> Result<()> {
        let pool = BufferPool::default();
        let config = DecoderConfig {
            process_only: true,
            ..Default::default()
        };
        let mut decoder = DtvccDecoder::new(pool.clone(), config);

        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = CaptureSink::<DecodedUnit>::new("capture", &calls);
        assert!(!decoder.add_sink(Box::new(sink))?);

        assert!(feed(&mut decoder, &pool, EXAMPLE_DATA)?);
        assert!(decoder.finish()?);
        assert_eq!(decoder.diagnostics().units, 14);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn missing_sinks_report_failure() -> Result<()> {
        let pool = BufferPool::default();
        let mut decoder = DtvccDecoder::new(pool.clone(), DecoderConfig::default());

        assert!(!feed(&mut decoder, &pool, EXAMPLE_DATA)?);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn strict_mode_fails_on_sequence_skip() -> Result<()> {
        let bytes = [0xFF, 0x02, 0x21, 0xFE, 0x41, 0x00, 0xFF, 0xC2, 0x21, 0xFE, 0x41, 0x00];

        let pool = BufferPool::default();
        let (mut lenient, _) = with_capture(&pool, DecoderConfig::default())?;
        assert!(feed(&mut lenient, &pool, &bytes)?);
        lenient.finish()?;
        assert_eq!(lenient.diagnostics().sequence_errors, 1);

        let strict = DecoderConfig {
            fail_level: Some(Level::Warn),
            ..Default::default()
        };
        let (mut decoder, _) = with_capture(&pool, strict)?;
        feed(&mut decoder, &pool, &bytes)?;
        assert!(decoder.finish().is_err());
        Ok(())
    }

    #[test]
    fn misaligned_input_is_fatal() -> Result<()> {
        let pool = BufferPool::default();
        let (mut decoder, _) = with_capture(&pool, DecoderConfig::default())?;
        assert!(feed(&mut decoder, &pool, &[0xFF, 0x02]).is_err());
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn diagnostics_summary() {
        let diagnostics = Diagnostics {
            packets: 3,
            styles: vec![(1, ServiceStyle::default())],
            ..Default::default()
        };
        let text = diagnostics.to_string();
        assert!(text.starts_with("Packets:              3\n"));
        assert!(text.ends_with("Service 1:            Unset\n"));
        assert_eq!(diagnostics.active_service_numbers().collect::<Vec<_>>(), [1]);
    }
}

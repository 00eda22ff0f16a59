/// Channel packet assembly.
///
/// Provides the [`PacketAssembler`](assemble::PacketAssembler) for collecting
/// packet-start and packet-data constructs into
/// [`AssembledPacket`](crate::structs::packet::AssembledPacket)s.
pub mod assemble;

/// Service block extraction.
///
/// Provides the [`PacketParser`](parse::PacketParser) for splitting packets into
/// per-service [`ServiceBlock`](crate::structs::packet::ServiceBlock)s.
pub mod parse;

/// Command and character decoding.
///
/// Provides the [`CommandDecoder`](decode::CommandDecoder) state machine and
/// [`count_units`](decode::count_units) for sizing output buffers.
pub mod decode;

/// Caption style classification per service.
pub mod style;

/// The decoder pipeline stage.
///
/// Provides the [`DtvccDecoder`](stage::DtvccDecoder), which runs the steps
/// above and fans decoded units out to its sinks.
pub mod stage;

/// Two packets of `cc_data` for service 1: a roll-up window definition,
/// "Hello" and a DisplayWindows, then "Hié™". The second packet is only
/// closed at end of stream.
pub const EXAMPLE_DATA: &[u8] = &[
    0xFF, 0x0A, 0x32, 0xFE, 0x98, 0x38, 0xFE, 0x00, 0x00, 0xFE, 0x01, 0x1F, 0xFE, 0x19, 0x92,
    0xFE, 0x00, 0x00, 0xFE, 0x48, 0x65, 0xFE, 0x6C, 0x6C, 0xFE, 0x6F, 0x0D, 0xFE, 0x89, 0x01,
    0xFC, 0x94, 0x2C, 0xFA, 0x00, 0x00, 0xFF, 0x44, 0x26, 0xFE, 0x48, 0x69, 0xFE, 0xE9, 0x10,
    0xFE, 0x39, 0x0D, 0xFA, 0x00, 0x00, 0xFA, 0x00, 0x00,
];

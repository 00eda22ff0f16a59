//! Caption channel packets and service blocks
//!
//! A caption channel packet starts with one header byte (2-bit sequence
//! number, 6-bit size code) followed by service blocks. Each service block has
//! a 1-byte header (3-bit service number, 5-bit block size), an optional
//! extended service number byte, then `block_size` bytes of caption data.

use std::io;

use crate::utils::bitstream_io::BsIoSliceReader;

/// Upper bound on an assembled packet, header byte included.
pub const MAX_PACKET_LENGTH: usize = 128;

/// Service number value announcing an extended header byte.
pub const EXTENDED_SERVICE_NUMBER: u8 = 7;

/// Highest addressable service number.
pub const MAX_SERVICE_NUMBER: u8 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence_number: u8,
    pub packet_size_code: u8,
}

impl PacketHeader {
    pub fn read(byte: u8) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(std::slice::from_ref(&byte));
        Ok(Self {
            sequence_number: reader.get_n(2)?,
            packet_size_code: reader.get_n(6)?,
        })
    }

    /// Packet length in bytes announced by the size code, header included.
    pub fn declared_size(&self) -> usize {
        match self.packet_size_code {
            0 => MAX_PACKET_LENGTH,
            code => code as usize * 2,
        }
    }

    pub fn next_sequence_number(&self) -> u8 {
        (self.sequence_number + 1) % 4
    }
}

/// The bytes collected between two packet-start constructs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledPacket {
    bytes: Vec<u8>,
}

impl AssembledPacket {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn extend(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn header(&self) -> Option<PacketHeader> {
        self.bytes
            .first()
            .and_then(|&byte| PacketHeader::read(byte).ok())
    }

    /// Service block data following the header byte.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceBlockHeader {
    pub service_number: u8,
    pub block_size: u8,
}

impl ServiceBlockHeader {
    pub fn read(byte: u8) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(std::slice::from_ref(&byte));
        Ok(Self {
            service_number: reader.get_n(3)?,
            block_size: reader.get_n(5)?,
        })
    }

    pub fn is_extended(&self) -> bool {
        self.service_number == EXTENDED_SERVICE_NUMBER
    }

    /// Real service number from the extended header byte.
    pub fn read_extended(byte: u8) -> io::Result<u8> {
        let mut reader = BsIoSliceReader::from_slice(std::slice::from_ref(&byte));
        reader.skip_n(2)?;
        reader.get_n(6)
    }
}

/// Caption data of one service inside a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceBlock<'a> {
    pub service_number: u8,
    pub block_size: u8,
    pub data: &'a [u8],
}

#[test]
fn packet_header_fields() -> io::Result<()> {
    let header = PacketHeader::read(0xC2)?;
    assert_eq!(header.sequence_number, 3);
    assert_eq!(header.packet_size_code, 2);
    assert_eq!(header.declared_size(), 4);
    assert_eq!(header.next_sequence_number(), 0);

    assert_eq!(PacketHeader::read(0x40)?.declared_size(), 128);

    let packet = AssembledPacket::from_bytes(&[0x02, 0x21, 0x41]);
    assert_eq!(packet.header().map(|h| h.sequence_number), Some(0));
    assert_eq!(packet.payload(), &[0x21, 0x41]);
    assert_eq!(AssembledPacket::default().payload(), &[] as &[u8]);
    Ok(())
}

#[test]
fn service_block_header_fields() -> io::Result<()> {
    let header = ServiceBlockHeader::read(0x21)?;
    assert_eq!(header.service_number, 1);
    assert_eq!(header.block_size, 1);
    assert!(!header.is_extended());

    let header = ServiceBlockHeader::read(0xE3)?;
    assert!(header.is_extended());
    assert_eq!(header.block_size, 3);
    assert_eq!(ServiceBlockHeader::read_extended(0xD0)?, 0x10);

    assert_eq!(ServiceBlockHeader::read(0xE0)?.block_size, 0);
    Ok(())
}

#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Decoder for CEA-708-D digital television closed captions.
//!
//! ### Bitstream Organization
//!
//! **Transport**: `cc_data` constructs of three bytes each, a header with the
//! validity flag and type tag followed by two payload bytes.
//! **Caption channel packets**: opened by a packet-start construct and
//! continued by packet-data constructs; up to 128 bytes with a 2-bit sequence
//! number.
//! **Service blocks**: up to 31 bytes of caption data for one of 63 services.
//!
//! ### Code Sets
//!
//! - C0 and C1 control codes (windows, pens, timing)
//! - C2 and C3 extended codes, reached through EXT1 and skipped by length
//! - G0 to G3 character sets
//!
//! ### Buffers
//!
//! Decoded units travel in pooled, reference-counted buffers. One buffer is
//! shared by every registered sink; the pool is fixed-size and exhausting it
//! is an error.
//!
//! ## Quick Start
//!
//! 1. Create a [`utils::buffer_pool::BufferPool`]
//! 2. Build a [`process::stage::DtvccDecoder`] and register sinks
//! 3. Feed it buffers of `cc_data`, then call `finish`
//!
//! ```rust,no_run
//! use dtvcc::process::EXAMPLE_DATA;
//! use dtvcc::process::stage::{DecoderConfig, DtvccDecoder};
//! use dtvcc::structs::timestamp::CaptionTime;
//! use dtvcc::utils::buffer_pool::BufferPool;
//!
//! let pool = BufferPool::default();
//! let mut decoder = DtvccDecoder::new(
//!     pool.clone(),
//!     DecoderConfig {
//!         process_only: true,
//!         ..Default::default()
//!     },
//! );
//!
//! // Wrap the input in a pooled buffer
//! let mut input = pool.allocate::<u8>(EXAMPLE_DATA.len(), CaptionTime::from_pts_ms(0))?;
//! input.extend_from_slice(EXAMPLE_DATA)?;
//!
//! decoder.process(&input)?;
//! input.release()?;
//! decoder.finish()?;
//!
//! // Counters and caption styles seen on each service
//! println!("{}", decoder.diagnostics());
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Decoding pipeline.
///
/// 1. **Assembly** ([`process::assemble`]): Collects constructs into caption
///    channel packets.
///
/// 2. **Parsing** ([`process::parse`]): Splits packets into service blocks.
///
/// 3. **Decoding** ([`process::decode`]): Interprets service block bytes as
///    commands and characters.
///
/// 4. **Stage** ([`process::stage`]): Runs the above and fans units out to sinks.
pub mod process;

/// Data structures for DTVCC transport and caption content.
///
/// - **Constructs** ([`structs::construct`]): Raw `cc_data` triplets
/// - **Packets** ([`structs::packet`]): Channel packet and service block headers
/// - **Commands** ([`structs::command`]): C0 and C1 commands with their fields
/// - **Code Tables** ([`structs::charset`]): Mnemonics and character sets
/// - **Units** ([`structs::unit`]): Decoded output elements
/// - **Timestamps** ([`structs::timestamp`]): Caption time labels
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Buffer Management** ([`utils::buffer_pool`]): Reference-counted buffers
/// - **Fan-out** ([`utils::sinks`]): Sink registration and dispatch
/// - **Rate Limiting** ([`utils::rate_limit`]): Repetitive warning suppression
pub mod utils;

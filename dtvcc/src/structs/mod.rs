//! Data structures representing DTVCC format components.
//!
//! Contains the raw `cc_data` constructs, caption channel packet and service
//! block headers, the C0/C1 command payloads with their named sub-fields,
//! the character set tables, decoded units and caption timestamps.

pub mod charset;
pub mod command;
pub mod construct;
pub mod packet;
pub mod timestamp;
pub mod unit;

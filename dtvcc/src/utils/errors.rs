use crate::structs::timestamp::CaptionTime;
use crate::utils::buffer_pool::DataType;

/// Logs `$err` at `$level`, or returns it when `$level` is at least as severe
/// as the configured `$state.fail_level`.
#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        let err = $err;
        if $state.fail_level.is_some_and(|fail| $level <= fail) {
            return Err(err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", err),
                ::log::Level::Warn => ::log::warn!("{}", err),
                ::log::Level::Info => ::log::info!("{}", err),
                ::log::Level::Debug => ::log::debug!("{}", err),
                ::log::Level::Trace => ::log::trace!("{}", err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("Buffer pool exhausted: all {0} entries are in use")]
    Exhausted(usize),

    #[error("Cannot allocate a {0:?} buffer with zero capacity")]
    ZeroCapacity(DataType),

    #[error("Buffer {index} is full: capacity is {max} elements")]
    CapacityExceeded { index: usize, max: usize },

    #[error("Buffer {0} is shared and can no longer be written")]
    SharedWrite(usize),

    #[error("Buffer {0} is not allocated in the pool")]
    NotAllocated(usize),

    #[error("Reader count underflow on buffer {0}")]
    ReaderUnderflow(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("Cannot register sink {name}: limit of {max} sinks reached")]
    TooManySinks { name: &'static str, max: usize },

    #[error("Sink {name} consumes {consumes:?} but the link carries {carries:?}")]
    TypeMismatch {
        name: &'static str,
        consumes: DataType,
        carries: DataType,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("Input buffer holds {0} bytes, not a whole number of 3-byte constructs")]
    MisalignedConstructs(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum PacketError {
    #[error("Max packet length exceeded at {time}, skipping {dropped} new bytes")]
    Overflow { time: CaptionTime, dropped: usize },

    #[error("Zero packet length at {0}")]
    ZeroLength(CaptionTime),

    #[error("Packet length mismatch at {time}: declared {declared}, assembled {actual}")]
    LengthMismatch {
        time: CaptionTime,
        declared: usize,
        actual: usize,
    },

    #[error("Unexpected sequence number at {time}: it is [{actual}] but should be [{expected}]")]
    SequenceDiscontinuity {
        time: CaptionTime,
        actual: u8,
        expected: u8,
    },

    #[error("Illegal service number {service} in extended header at {time}")]
    IllegalExtendedService { time: CaptionTime, service: u8 },

    #[error("Extended service header truncated at {0}")]
    TruncatedExtendedHeader(CaptionTime),

    #[error("Data received at {time} for service 0 ({size} bytes), skipping rest of packet")]
    ServiceZero { time: CaptionTime, size: usize },

    #[error("Service {service} block declares {declared} bytes, only {available} remain at {time}")]
    BlockOverrun {
        time: CaptionTime,
        service: u8,
        declared: usize,
        available: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("{name} needs {needed} more bytes past the end of the service {service} block at {time}")]
    Truncated {
        time: CaptionTime,
        service: u8,
        name: &'static str,
        needed: usize,
    },

    #[error("Unsupported C3 data range {code:#04X} at {time}, abandoning rest of service {service} block")]
    UnsupportedC3 {
        time: CaptionTime,
        service: u8,
        code: u8,
    },

    #[error("Ignoring unknown command code {code:#04X} ({length} bytes) at {time}")]
    UnknownCommand { time: CaptionTime, code: u8, length: usize },

    #[error("Found a P16 command {:02X}{:02X} on service {service} at {time}", .symbols[0], .symbols[1])]
    P16Command {
        time: CaptionTime,
        service: u8,
        symbols: [u8; 2],
    },

    #[error("Found reserved code {code:#04X} at {time}, ignored")]
    ReservedCommand { time: CaptionTime, code: u8 },

    #[error("Service {service} block yielded {actual} units, pre-count was {expected}")]
    UnitCountMismatch {
        service: u8,
        expected: usize,
        actual: usize,
    },
}

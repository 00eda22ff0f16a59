use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use dtvcc::structs::timestamp::Framerate;
use log::Level;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")\ndtvcc ",
    env!("DTVCC_VERSION"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and decoding CEA-708 (DTVCC) closed captions",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat caption data warnings as fatal errors.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level at which data anomalies abort decoding.
    pub fn fail_level(&self) -> Option<Level> {
        self.strict.then_some(Level::Warn)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode cc_data into a YAML dump of caption events.
    Decode(DecodeArgs),

    /// Print caption stream diagnostics
    Info(InfoArgs),
}

/// How the raw input is cut into video frames.
#[derive(Debug, Clone, Copy, Args)]
pub struct FrameArgs {
    /// Video frame rate used to label caption times.
    #[arg(long, value_name = "FPS", default_value = "29.97", value_parser = parse_framerate)]
    pub framerate: Framerate,

    /// Count frames in drop-frame timecode (29.97 and 59.94 only).
    #[arg(long)]
    pub drop_frame: bool,

    /// Number of cc_data constructs carried by each frame.
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = 20,
        value_parser = clap::value_parser!(u16).range(1..=31)
    )]
    pub constructs_per_frame: u16,
}

impl FrameArgs {
    pub fn frame_bytes(&self) -> usize {
        self.constructs_per_frame as usize * 3
    }
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Input cc_data file of 3-byte constructs (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path for the caption event dump (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Only dump events of this caption service (1-63).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=63))]
    pub service: Option<u8>,

    #[command(flatten)]
    pub frames: FrameArgs,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input cc_data file of 3-byte constructs (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub frames: FrameArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

fn parse_framerate(value: &str) -> Result<Framerate, String> {
    let fps: f32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a frame rate"))?;

    if !(1.0..=120.0).contains(&fps) {
        return Err(format!("frame rate {fps} is outside 1-120"));
    }

    Ok(Framerate::from_fps_x100((fps * 100.0).round() as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framerate_values() {
        assert_eq!(parse_framerate("29.97"), Ok(Framerate::R29_97));
        assert_eq!(parse_framerate("23.976"), Ok(Framerate::R23_976));
        assert_eq!(parse_framerate("25"), Ok(Framerate::R25));
        assert_eq!(parse_framerate("12.5"), Ok(Framerate::Other(1250)));
        assert!(parse_framerate("0").is_err());
        assert!(parse_framerate("fast").is_err());
    }

    #[test]
    fn decode_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "dtvccd",
            "--strict",
            "decode",
            "captions.bin",
            "--service",
            "2",
            "--framerate",
            "59.94",
            "--drop-frame",
        ])?;

        assert_eq!(cli.fail_level(), Some(Level::Warn));
        let Commands::Decode(args) = cli.command else {
            anyhow::bail!("expected the decode command");
        };
        assert_eq!(args.service, Some(2));
        assert_eq!(args.frames.framerate, Framerate::R59_94);
        assert!(args.frames.drop_frame);
        assert_eq!(args.frames.frame_bytes(), 60);

        assert!(Cli::try_parse_from(["dtvccd", "decode", "-", "--service", "64"]).is_err());
        Ok(())
    }
}

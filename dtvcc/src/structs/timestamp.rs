//! Caption timestamps
//!
//! Input buffers carry the time of the video frame their caption data came
//! from. The decoder only uses it to label diagnostics.

use std::fmt::{Display, Formatter};

/// Where a [`CaptionTime`] was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeSource {
    #[default]
    Unknown,
    FrameNumbering,
    PtsNumbering,
}

/// Video frame rate, stored as frames per second times 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framerate {
    R23_976,
    R24,
    R25,
    #[default]
    R29_97,
    R30,
    R50,
    R59_94,
    R60,
    Other(u16),
}

impl Framerate {
    pub fn from_fps_x100(fps_x100: u16) -> Self {
        match fps_x100 {
            2397 | 2398 => Self::R23_976,
            2400 => Self::R24,
            2500 => Self::R25,
            2997 => Self::R29_97,
            3000 => Self::R30,
            5000 => Self::R50,
            5994 => Self::R59_94,
            6000 => Self::R60,
            other => Self::Other(other),
        }
    }

    pub fn fps_x100(self) -> u16 {
        match self {
            Self::R23_976 => 2397,
            Self::R24 => 2400,
            Self::R25 => 2500,
            Self::R29_97 => 2997,
            Self::R30 => 3000,
            Self::R50 => 5000,
            Self::R59_94 => 5994,
            Self::R60 => 6000,
            Self::Other(v) => v,
        }
    }

    /// Frames counted per timecode second.
    pub fn nominal_fps(self) -> u64 {
        (self.fps_x100() as u64 + 50) / 100
    }

    pub fn supports_drop_frame(self) -> bool {
        matches!(self, Self::R29_97 | Self::R59_94)
    }
}

impl Display for Framerate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Framerate::R23_976 => f.write_str("23.976"),
            Framerate::R24 => f.write_str("24"),
            Framerate::R25 => f.write_str("25"),
            Framerate::R29_97 => f.write_str("29.97"),
            Framerate::R30 => f.write_str("30"),
            Framerate::R50 => f.write_str("50"),
            Framerate::R59_94 => f.write_str("59.94"),
            Framerate::R60 => f.write_str("60"),
            Framerate::Other(v) => write!(f, "{}.{:02}", v / 100, v % 100),
        }
    }
}

/// Timecode or presentation time of one input buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptionTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
    pub millisecond: u16,
    pub drop_frame: bool,
    pub framerate: Framerate,
    pub source: TimeSource,
}

impl CaptionTime {
    /// Converts a presentation time in milliseconds, wrapping at 24 hours.
    pub fn from_pts_ms(ms: u64) -> Self {
        Self {
            hour: ((ms / 3_600_000) % 24) as u8,
            minute: ((ms / 60_000) % 60) as u8,
            second: ((ms / 1000) % 60) as u8,
            millisecond: (ms % 1000) as u16,
            source: TimeSource::PtsNumbering,
            ..Default::default()
        }
    }

    /// Converts a zero-based frame count into a timecode.
    ///
    /// Drop-frame counting skips the first 2 (4 at 59.94) frame numbers of
    /// every minute except each tenth minute. It is ignored for rates where
    /// it is not defined.
    pub fn from_frame_number(frame_number: u64, framerate: Framerate, drop_frame: bool) -> Self {
        let fps = framerate.nominal_fps().max(1);
        let drop_frame = drop_frame && framerate.supports_drop_frame();

        let mut frames = frame_number;
        if drop_frame {
            let dropped = fps / 15;
            let per_ten_minutes = fps * 600 - dropped * 9;
            let per_minute = fps * 60 - dropped;

            let tens = frames / per_ten_minutes;
            let rest = frames % per_ten_minutes;
            frames += dropped * 9 * tens;
            if rest > dropped {
                frames += dropped * ((rest - dropped) / per_minute);
            }
        }

        let seconds = frames / fps;
        Self {
            hour: ((seconds / 3600) % 24) as u8,
            minute: ((seconds / 60) % 60) as u8,
            second: (seconds % 60) as u8,
            frame: (frames % fps) as u8,
            drop_frame,
            framerate,
            source: TimeSource::FrameNumbering,
            ..Default::default()
        }
    }
}

impl Display for CaptionTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.source {
            TimeSource::FrameNumbering => write!(
                f,
                "{:02}:{:02}:{:02}{}{:02}",
                self.hour,
                self.minute,
                self.second,
                if self.drop_frame { ';' } else { ':' },
                self.frame
            ),
            TimeSource::PtsNumbering => write!(
                f,
                "{:02}:{:02}:{:02},{:03}",
                self.hour, self.minute, self.second, self.millisecond
            ),
            TimeSource::Unknown => f.write_str("{TIMESTAMP ERROR!}"),
        }
    }
}

#[test]
fn print_caption_time() {
    let time = CaptionTime::from_pts_ms(3_723_045);
    assert_eq!(format!("{time}"), "01:02:03,045");

    let time = CaptionTime::from_frame_number(30 * 61 + 7, Framerate::R30, false);
    assert_eq!(format!("{time}"), "00:01:01:07");

    assert_eq!(format!("{}", CaptionTime::default()), "{TIMESTAMP ERROR!}");
}

#[test]
fn drop_frame_numbering() {
    let at = |n| format!("{}", CaptionTime::from_frame_number(n, Framerate::R29_97, true));

    assert_eq!(at(1799), "00:00:59;29");
    assert_eq!(at(1800), "00:01:00;02");
    assert_eq!(at(17_982), "00:10:00;00");

    // Not defined at 25 fps, so frames are counted straight.
    let time = CaptionTime::from_frame_number(1500, Framerate::R25, true);
    assert!(!time.drop_frame);
    assert_eq!(format!("{time}"), "00:01:00:00");
}

//! Control commands
//!
//! C0 commands are single byte (P16 aside). C1 commands manage windows and
//! pens and carry 0 to 6 parameter bytes with packed sub-fields, read here
//! most-significant bit first. C2 and C3 are only length-accounted.

use std::fmt::{self, Display, Formatter};
use std::io;

use crate::structs::charset::{P16, c0_name, c1_name};
use crate::utils::bitstream_io::BsIoSliceReader;

macro_rules! named_code {
    ($(#[$meta:meta])* $name:ident, $fallback:literal, [$($label:literal),* $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name(pub u8);

        impl $name {
            const NAMES: &'static [&'static str] = &[$($label),*];

            pub fn name(self) -> &'static str {
                Self::NAMES.get(self.0 as usize).copied().unwrap_or($fallback)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_code!(PenSize, "Unknown", ["Small", "Standard", "Large", "Illegal Value"]);
named_code!(PenOffset, "Unknown", ["Subscript", "Normal", "Superscript", "Illegal Value"]);
named_code!(
    TextTag,
    "Unknown",
    [
        "Dialog",
        "Source or Speaker ID",
        "Electronically Reproduced Voice",
        "Dialog in Other Language",
        "Voiceover",
        "Audible Translation",
        "Subtitle Translation",
        "Voice Quality Description",
        "Song Lyrics",
        "Sound Effect Description",
        "Musical Score Description",
        "Oath",
        "Undefined 0",
        "Undefined 1",
        "Undefined 2",
        "Invisible",
    ]
);
named_code!(
    FontTag,
    "Unknown",
    [
        "Default",
        "Monospaced Serif",
        "Proportional Serif",
        "Monospaced Sans-Serif",
        "Proportional Sans-Serif",
        "Casual",
        "Cursive",
        "Small Caps",
    ]
);
named_code!(
    EdgeType,
    "Unknown",
    [
        "None",
        "Raised",
        "Depressed",
        "Uniform",
        "Left Drop Shadow",
        "Right Drop Shadow",
        "Illegal Value 0",
        "Illegal Value 1",
    ]
);
named_code!(Opacity, "Unknown", ["Solid", "Flash", "Translucent", "Transparent"]);
named_code!(
    BorderType,
    "Unknown",
    ["None", "Raised", "Depressed", "Uniform", "Shadow Left", "Shadow Right"]
);
named_code!(Direction, "Unk", ["LtoR", "RtoL", "TtoB", "BtoT"]);
named_code!(Justify, "Unk", ["L/T", "R/B", "C", "F"]);
named_code!(DisplayEffect, "Unk", ["Snap", "Fade", "Wipe"]);
named_code!(
    /// Point of the window that the anchor coordinates refer to.
    AnchorPoint,
    "??",
    ["UL", "UC", "UR", "ML", "MC", "MR", "LL", "LC", "LR"]
);
named_code!(
    /// Predefined window style selected by DefineWindow.
    WindowStyle,
    "Unknown",
    [
        "608-PopUp",
        "PopUp-TransBG",
        "PopUp-Cntrd",
        "608-RollUp",
        "RollUp-TransBG",
        "RollUp-Cntrd",
        "TickerTape",
    ]
);
named_code!(
    /// Predefined pen style selected by DefineWindow.
    PenStyle,
    "Unknown",
    [
        "Default",
        "MonoSerif",
        "ProportSerif",
        "MonoSanSerif",
        "ProportSanSerif",
        "MonoSanSerif-TransBG",
        "ProportSanSerif-TransBG",
    ]
);

/// 2-bit-per-channel colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    fn read(reader: &mut BsIoSliceReader) -> io::Result<Self> {
        Ok(Self {
            red: reader.get_n(2)?,
            green: reader.get_n(2)?,
            blue: reader.get_n(2)?,
        })
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "R{}G{}B{}", self.red, self.green, self.blue)
    }
}

/// Window selection bitmap; bit n addresses window n.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowBitmap(pub u8);

impl WindowBitmap {
    pub fn contains(self, window: u8) -> bool {
        window < 8 && self.0 & (1 << window) != 0
    }

    pub fn windows(self) -> impl Iterator<Item = u8> {
        (0..8).filter(move |&w| self.contains(w))
    }
}

impl Display for WindowBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenAttributes {
    pub pen_size: PenSize,
    pub pen_offset: PenOffset,
    pub text_tag: TextTag,
    pub font_tag: FontTag,
    pub edge_type: EdgeType,
    pub underline: bool,
    pub italic: bool,
}

impl PenAttributes {
    pub fn read(params: &[u8]) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(params);

        let text_tag = TextTag(reader.get_n(4)?);
        let pen_offset = PenOffset(reader.get_n(2)?);
        let pen_size = PenSize(reader.get_n(2)?);

        let italic = reader.get()?;
        let underline = reader.get()?;
        let edge_type = EdgeType(reader.get_n(3)?);
        let font_tag = FontTag(reader.get_n(3)?);

        Ok(Self {
            pen_size,
            pen_offset,
            text_tag,
            font_tag,
            edge_type,
            underline,
            italic,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenColor {
    pub foreground_opacity: Opacity,
    pub foreground: Color,
    pub background_opacity: Opacity,
    pub background: Color,
    pub edge: Color,
}

impl PenColor {
    pub fn read(params: &[u8]) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(params);

        let foreground_opacity = Opacity(reader.get_n(2)?);
        let foreground = Color::read(&mut reader)?;
        let background_opacity = Opacity(reader.get_n(2)?);
        let background = Color::read(&mut reader)?;
        reader.skip_n(2)?;
        let edge = Color::read(&mut reader)?;

        Ok(Self {
            foreground_opacity,
            foreground,
            background_opacity,
            background,
            edge,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenLocation {
    pub row: u8,
    pub column: u8,
}

impl PenLocation {
    pub fn read(params: &[u8]) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(params);

        reader.skip_n(4)?;
        let row = reader.get_n(4)?;
        reader.skip_n(2)?;
        let column = reader.get_n(6)?;

        Ok(Self { row, column })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowAttributes {
    pub fill_opacity: Opacity,
    pub fill: Color,
    pub border_type: BorderType,
    pub border: Color,
    pub word_wrap: bool,
    pub print_direction: Direction,
    pub scroll_direction: Direction,
    pub justify: Justify,
    pub effect_speed: u8,
    pub effect_direction: Direction,
    pub display_effect: DisplayEffect,
}

impl WindowAttributes {
    pub fn read(params: &[u8]) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(params);

        let fill_opacity = Opacity(reader.get_n(2)?);
        let fill = Color::read(&mut reader)?;

        let border_type_low: u8 = reader.get_n(2)?;
        let border = Color::read(&mut reader)?;

        let border_type_high: u8 = reader.get_n(1)?;
        let word_wrap = reader.get()?;
        let print_direction = Direction(reader.get_n(2)?);
        let scroll_direction = Direction(reader.get_n(2)?);
        let justify = Justify(reader.get_n(2)?);

        let effect_speed = reader.get_n(4)?;
        let effect_direction = Direction(reader.get_n(2)?);
        let display_effect = DisplayEffect(reader.get_n(2)?);

        Ok(Self {
            fill_opacity,
            fill,
            border_type: BorderType(border_type_high << 2 | border_type_low),
            border,
            word_wrap,
            print_direction,
            scroll_direction,
            justify,
            effect_speed,
            effect_direction,
            display_effect,
        })
    }

    /// Effect speed in seconds, 0.5 s per step.
    pub fn effect_seconds(&self) -> f32 {
        self.effect_speed as f32 * 0.5
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowDefinition {
    pub window_id: u8,
    pub visible: bool,
    pub row_lock: bool,
    pub column_lock: bool,
    pub priority: u8,
    pub relative_positioning: bool,
    pub anchor_vertical: u8,
    pub anchor_horizontal: u8,
    pub anchor_point: AnchorPoint,
    pub row_count: u8,
    pub column_count: u8,
    pub window_style: WindowStyle,
    pub pen_style: PenStyle,
}

impl WindowDefinition {
    pub fn read(window_id: u8, params: &[u8]) -> io::Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(params);

        reader.skip_n(2)?;
        let visible = reader.get()?;
        let row_lock = reader.get()?;
        let column_lock = reader.get()?;
        let priority = reader.get_n(3)?;

        let relative_positioning = reader.get()?;
        let anchor_vertical = reader.get_n(7)?;
        let anchor_horizontal = reader.get_n(8)?;

        let anchor_point = AnchorPoint(reader.get_n(4)?);
        let row_count = reader.get_n(4)?;

        reader.skip_n(2)?;
        let column_count = reader.get_n(6)?;

        reader.skip_n(2)?;
        let window_style = WindowStyle(reader.get_n(3)?);
        let pen_style = PenStyle(reader.get_n(3)?);

        Ok(Self {
            window_id,
            visible,
            row_lock,
            column_lock,
            priority,
            relative_positioning,
            anchor_vertical,
            anchor_horizontal,
            anchor_point,
            row_count,
            column_count,
            window_style,
            pen_style,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C0Command {
    Nul,
    Etx,
    Bs,
    Ff,
    Cr,
    Hcr,
    /// 16-bit character, kept as the raw symbol pair.
    P16([u8; 2]),
}

impl C0Command {
    /// Decodes a complete C0 code. Reserved codes yield `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x00] => Some(Self::Nul),
            [0x03] => Some(Self::Etx),
            [0x08] => Some(Self::Bs),
            [0x0C] => Some(Self::Ff),
            [0x0D] => Some(Self::Cr),
            [0x0E] => Some(Self::Hcr),
            [P16, sym1, sym2] => Some(Self::P16([*sym1, *sym2])),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Nul => 0x00,
            Self::Etx => 0x03,
            Self::Bs => 0x08,
            Self::Ff => 0x0C,
            Self::Cr => 0x0D,
            Self::Hcr => 0x0E,
            Self::P16(_) => P16,
        }
    }
}

impl Display for C0Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::P16([sym1, sym2]) => write!(f, "{{P16:{sym1:02X}{sym2:02X}}}"),
            other => write!(f, "{{{}}}", c0_name(other.code())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C1Command {
    SetCurrentWindow(u8),
    ClearWindows(WindowBitmap),
    DisplayWindows(WindowBitmap),
    HideWindows(WindowBitmap),
    ToggleWindows(WindowBitmap),
    DeleteWindows(WindowBitmap),
    /// Delay in tenths of a second.
    Delay(u8),
    DelayCancel,
    Reset,
    SetPenAttributes(PenAttributes),
    SetPenColor(PenColor),
    SetPenLocation(PenLocation),
    Reserved(u8),
    SetWindowAttributes(WindowAttributes),
    DefineWindow(WindowDefinition),
}

impl C1Command {
    /// Total length in bytes of the C1 command starting with `code`.
    pub fn length(code: u8) -> usize {
        match code {
            0x88..=0x8D => 2,
            0x90 | 0x92 => 3,
            0x91 => 4,
            0x97 => 5,
            0x98..=0x9F => 7,
            _ => 1,
        }
    }

    /// Decodes a complete C1 command, command byte first.
    pub fn read(bytes: &[u8]) -> io::Result<Self> {
        let (&code, params) = bytes
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "empty C1 command"))?;

        if bytes.len() != Self::length(code) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} takes {} bytes, got {}",
                    c1_name(code),
                    Self::length(code),
                    bytes.len()
                ),
            ));
        }

        let bitmap = || WindowBitmap(params[0]);
        let command = match code {
            0x80..=0x87 => Self::SetCurrentWindow(code & 0x07),
            0x88 => Self::ClearWindows(bitmap()),
            0x89 => Self::DisplayWindows(bitmap()),
            0x8A => Self::HideWindows(bitmap()),
            0x8B => Self::ToggleWindows(bitmap()),
            0x8C => Self::DeleteWindows(bitmap()),
            0x8D => Self::Delay(params[0]),
            0x8E => Self::DelayCancel,
            0x8F => Self::Reset,
            0x90 => Self::SetPenAttributes(PenAttributes::read(params)?),
            0x91 => Self::SetPenColor(PenColor::read(params)?),
            0x92 => Self::SetPenLocation(PenLocation::read(params)?),
            0x97 => Self::SetWindowAttributes(WindowAttributes::read(params)?),
            0x98..=0x9F => Self::DefineWindow(WindowDefinition::read(code & 0x07, params)?),
            _ => Self::Reserved(code),
        };

        Ok(command)
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::SetCurrentWindow(id) => 0x80 | id,
            Self::ClearWindows(_) => 0x88,
            Self::DisplayWindows(_) => 0x89,
            Self::HideWindows(_) => 0x8A,
            Self::ToggleWindows(_) => 0x8B,
            Self::DeleteWindows(_) => 0x8C,
            Self::Delay(_) => 0x8D,
            Self::DelayCancel => 0x8E,
            Self::Reset => 0x8F,
            Self::SetPenAttributes(_) => 0x90,
            Self::SetPenColor(_) => 0x91,
            Self::SetPenLocation(_) => 0x92,
            Self::Reserved(code) => *code,
            Self::SetWindowAttributes(_) => 0x97,
            Self::DefineWindow(def) => 0x98 | def.window_id,
        }
    }

    pub fn name(&self) -> &'static str {
        c1_name(self.code())
    }
}

impl Display for C1Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Self::ClearWindows(map)
            | Self::DisplayWindows(map)
            | Self::HideWindows(map)
            | Self::ToggleWindows(map)
            | Self::DeleteWindows(map) => write!(f, "{{{name}:{map}}}"),
            Self::Delay(tenths) => write!(f, "{{{name}:{}.{}s}}", tenths / 10, tenths % 10),
            Self::SetPenAttributes(pa) => write!(
                f,
                "{{{name}:{},{},{},{},{}{}{}}}",
                pa.pen_size,
                pa.pen_offset,
                pa.text_tag,
                pa.font_tag,
                pa.edge_type,
                if pa.underline { ",U" } else { "" },
                if pa.italic { ",I" } else { "" }
            ),
            Self::SetPenColor(pc) => write!(
                f,
                "{{{name}:FG-{}-{},BG-{}-{},Edge-{}}}",
                pc.foreground_opacity,
                pc.foreground,
                pc.background_opacity,
                pc.background,
                pc.edge
            ),
            Self::SetPenLocation(pl) => write!(f, "{{{name}:R{}-C{}}}", pl.row, pl.column),
            Self::SetWindowAttributes(wa) => write!(
                f,
                "{{{name}:Fill-{}-{},Border-{}-{},{}{},{},{},{}-{}s-{}}}",
                wa.fill_opacity,
                wa.fill,
                wa.border_type,
                wa.border,
                if wa.word_wrap { "WW," } else { "" },
                wa.print_direction,
                wa.scroll_direction,
                wa.justify,
                wa.display_effect,
                wa.effect_seconds(),
                wa.effect_direction
            ),
            Self::DefineWindow(dw) => write!(
                f,
                "{{{name}:{}{}{}P{},{}@{},{}{},R{}C{},{},{}}}",
                if dw.visible { "Vis," } else { "" },
                if dw.row_lock { "RL," } else { "" },
                if dw.column_lock { "CL," } else { "" },
                dw.priority,
                dw.anchor_point,
                dw.anchor_vertical,
                dw.anchor_horizontal,
                if dw.relative_positioning { "%" } else { "" },
                dw.row_count,
                dw.column_count,
                dw.window_style,
                dw.pen_style
            ),
            _ => write!(f, "{{{name}}}"),
        }
    }
}

/// A C2 or C3 code, consumed for its length only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedCode {
    pub code: u8,
    /// Bytes consumed, EXT1 prefix included.
    pub length: u8,
}

#[test]
fn c1_lengths() {
    let lengths: Vec<usize> = (0x80..=0x9F).map(C1Command::length).collect();
    assert_eq!(
        lengths,
        [
            1, 1, 1, 1, 1, 1, 1, 1, // CW0-CW7
            2, 2, 2, 2, 2, 2, // CLW DSW HDW TGW DLW DLY
            1, 1, // DLC RST
            3, 4, 3, // SPA SPC SPL
            1, 1, 1, 1, // reserved
            5, // SWA
            7, 7, 7, 7, 7, 7, 7, 7, // DF0-DF7
        ]
    );
}

#[test]
fn pen_commands() -> io::Result<()> {
    // Large, superscript, song lyrics; italic, underline, uniform edge, casual font.
    let cmd = C1Command::read(&[0x90, 0x8A, 0xDD])?;
    let C1Command::SetPenAttributes(pa) = cmd else {
        panic!("expected SetPenAttributes, got {cmd:?}");
    };
    assert_eq!(pa.pen_size, PenSize(2));
    assert_eq!(pa.pen_offset, PenOffset(2));
    assert_eq!(pa.text_tag.name(), "Song Lyrics");
    assert!(pa.italic && pa.underline);
    assert_eq!(pa.edge_type.name(), "Uniform");
    assert_eq!(pa.font_tag.name(), "Casual");

    let cmd = C1Command::read(&[0x91, 0x6A, 0xC0, 0x15])?;
    let C1Command::SetPenColor(pc) = cmd else {
        panic!("expected SetPenColor, got {cmd:?}");
    };
    assert_eq!(pc.foreground_opacity.name(), "Flash");
    assert_eq!(pc.foreground, Color { red: 2, green: 2, blue: 2 });
    assert_eq!(pc.background_opacity.name(), "Transparent");
    assert_eq!(pc.edge, Color { red: 1, green: 1, blue: 1 });

    let cmd = C1Command::read(&[0x92, 0x0E, 0x1F])?;
    assert_eq!(cmd, C1Command::SetPenLocation(PenLocation { row: 14, column: 31 }));
    assert_eq!(cmd.to_string(), "{SPL:R14-C31}");
    Ok(())
}

#[test]
fn window_commands() -> io::Result<()> {
    // Solid white fill, border type 5 split across bytes 2 and 3, word wrap,
    // RtoL print, BtoT scroll, centered; speed 3, TtoB, wipe.
    let cmd = C1Command::read(&[0x97, 0x3F, 0x40, 0xDE, 0x3A])?;
    let C1Command::SetWindowAttributes(wa) = cmd else {
        panic!("expected SetWindowAttributes, got {cmd:?}");
    };
    assert_eq!(wa.fill_opacity.name(), "Solid");
    assert_eq!(wa.fill, Color { red: 3, green: 3, blue: 3 });
    assert_eq!(wa.border_type.name(), "Shadow Right");
    assert!(wa.word_wrap);
    assert_eq!(wa.print_direction.name(), "RtoL");
    assert_eq!(wa.scroll_direction.name(), "BtoT");
    assert_eq!(wa.justify.name(), "C");
    assert_eq!(wa.effect_speed, 3);
    assert_eq!(wa.effect_direction.name(), "TtoB");
    assert_eq!(wa.display_effect.name(), "Wipe");

    // DF2: visible, row lock, priority 3, anchor (80, 120) lower-left,
    // 4 rows, 31 columns, roll-up style, default pen.
    let cmd = C1Command::read(&[0x9A, 0x33, 0x50, 0x78, 0x64, 0x1F, 0x18])?;
    let C1Command::DefineWindow(dw) = cmd else {
        panic!("expected DefineWindow, got {cmd:?}");
    };
    assert_eq!(dw.window_id, 2);
    assert!(dw.visible && dw.row_lock && !dw.column_lock);
    assert_eq!(dw.priority, 3);
    assert!(!dw.relative_positioning);
    assert_eq!((dw.anchor_vertical, dw.anchor_horizontal), (80, 120));
    assert_eq!(dw.anchor_point.name(), "LL");
    assert_eq!((dw.row_count, dw.column_count), (4, 31));
    assert_eq!(dw.window_style.name(), "608-RollUp");
    assert_eq!(dw.pen_style.name(), "Default");
    assert_eq!(cmd.code(), 0x9A);
    assert_eq!(cmd.to_string(), "{DF2:Vis,RL,P3,LL@80,120,R4C31,608-RollUp,Default}");
    Ok(())
}

#[test]
fn short_commands() -> io::Result<()> {
    assert_eq!(C1Command::read(&[0x83])?, C1Command::SetCurrentWindow(3));
    assert_eq!(C1Command::read(&[0x8D, 0x0F])?.to_string(), "{DLY:1.5s}");
    assert_eq!(C1Command::read(&[0x94])?, C1Command::Reserved(0x94));
    assert_eq!(
        C1Command::read(&[0x89, 0x05])?,
        C1Command::DisplayWindows(WindowBitmap(0x05))
    );
    assert_eq!(WindowBitmap(0x05).windows().collect::<Vec<_>>(), [0, 2]);
    assert!(C1Command::read(&[0x92, 0x01]).is_err());

    assert_eq!(C0Command::from_bytes(&[0x0D]), Some(C0Command::Cr));
    assert_eq!(C0Command::from_bytes(&[0x01]), None);
    assert_eq!(C0Command::P16([0x4E, 0x2D]).to_string(), "{P16:4E2D}");
    assert_eq!(C0Command::Hcr.to_string(), "{HCR}");
    Ok(())
}

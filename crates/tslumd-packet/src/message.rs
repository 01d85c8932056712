use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

/// Maximum text length of a single display message, in bytes.
pub const MAX_TEXT_LEN: usize = 2048;

const CONTROL_DATA_BIT: u16 = 1 << 15;
const BRIGHTNESS_SHIFT: u16 = 6;
const LEFT_TALLY_SHIFT: u16 = 4;
const TEXT_TALLY_SHIFT: u16 = 2;
const RIGHT_TALLY_SHIFT: u16 = 0;
const TWO_BITS: u16 = 0b11;

/// Tally lamp color as carried in a 2-bit control word field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tally {
    #[default]
    Off,
    Red,
    Green,
    Amber,
}

impl Tally {
    /// Map the low two bits of `bits` to a color.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Tally::Off,
            1 => Tally::Red,
            2 => Tally::Green,
            _ => Tally::Amber,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Tally::Off => 0,
            Tally::Red => 1,
            Tally::Green => 2,
            Tally::Amber => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tally::Off => "OFF",
            Tally::Red => "RED",
            Tally::Green => "GREEN",
            Tally::Amber => "AMBER",
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text encoding selected by bit 0 of the packet flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    /// Reserved for UTF-16LE text. Reported, never transcoded.
    Utf16,
}

/// One display-line update addressed to a UMD slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayMessage {
    /// Slot on the target display.
    pub index: u16,
    /// Raw control word: tallies, brightness and the control-data flag.
    pub control: u16,
    /// Text bytes, ASCII unless the packet flags say otherwise.
    pub text: Bytes,
}

impl DisplayMessage {
    /// A message with all tallies off and brightness 0.
    pub fn new(index: u16, text: impl Into<Bytes>) -> Self {
        Self {
            index,
            control: 0,
            text: text.into(),
        }
    }

    /// Build a message around an explicit control word.
    pub fn with_control(index: u16, control: u16, text: impl Into<Bytes>) -> Self {
        Self {
            index,
            control,
            text: text.into(),
        }
    }

    /// Set left-hand, text and right-hand tally colors.
    pub fn with_tallies(mut self, left: Tally, text: Tally, right: Tally) -> Self {
        self.control = set_field(self.control, LEFT_TALLY_SHIFT, left.bits());
        self.control = set_field(self.control, TEXT_TALLY_SHIFT, text.bits());
        self.control = set_field(self.control, RIGHT_TALLY_SHIFT, right.bits());
        self
    }

    /// Set brightness (0-3). Higher bits are ignored.
    pub fn with_brightness(mut self, level: u8) -> Self {
        self.control = set_field(self.control, BRIGHTNESS_SHIFT, level);
        self
    }

    pub fn is_control_data(&self) -> bool {
        self.control & CONTROL_DATA_BIT != 0
    }

    pub fn brightness(&self) -> u8 {
        get_field(self.control, BRIGHTNESS_SHIFT)
    }

    pub fn left_tally(&self) -> Tally {
        Tally::from_bits(get_field(self.control, LEFT_TALLY_SHIFT))
    }

    pub fn text_tally(&self) -> Tally {
        Tally::from_bits(get_field(self.control, TEXT_TALLY_SHIFT))
    }

    pub fn right_tally(&self) -> Tally {
        Tally::from_bits(get_field(self.control, RIGHT_TALLY_SHIFT))
    }

    /// Text for display; invalid bytes are replaced.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

fn get_field(control: u16, shift: u16) -> u8 {
    ((control >> shift) & TWO_BITS) as u8
}

fn set_field(control: u16, shift: u16, value: u8) -> u16 {
    (control & !(TWO_BITS << shift)) | ((u16::from(value) & TWO_BITS) << shift)
}

/// A TSL v5 packet: header fields plus display messages in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub version: u8,
    pub flags: u8,
    pub screen: u16,
    pub messages: Vec<DisplayMessage>,
}

impl Packet {
    /// Empty version-0 ASCII packet for `screen`.
    pub fn new(screen: u16) -> Self {
        Self {
            screen,
            ..Self::default()
        }
    }

    /// Append a message, builder style.
    pub fn with_message(mut self, message: DisplayMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn text_encoding(&self) -> TextEncoding {
        if self.flags & 0x01 == 0 {
            TextEncoding::Ascii
        } else {
            TextEncoding::Utf16
        }
    }
}

/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! HP-IL frames.
//!
//! A frame consists of 11 significant bits: 3 control bits and 8 data bits.
//!
//! ```text
//!     bit   10   9   8   7 .. 0
//!         +---+---+---+---------+
//!     DOE | 0 |end|srq|  data   |
//!     CMD | 1 | 0 | 0 | command |
//!     RDY | 1 | 0 | 1 |  ready  |
//!     IDY | 1 | 1 |srq|identify |
//!         +---+---+---+---------+
//! ```
use core::convert::TryFrom;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// Significant bits of a frame.
pub const FRAME_MASK: u16 = 0x07FF;
/// The service request bit of data and identify frames.
pub const SRQ_BIT: u16 = 0x0100;
/// The end bit of data frames.
pub const END_BIT: u16 = 0x0200;

const CONTROL_MASK: u16 = 0x0700;

/// A single 11-bit HP-IL frame.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u16", into = "u16"))]
pub struct Frame(u16);

/// The major class of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameClass {
    /// Data or end byte frames: `DAB` and `END`.
    DataOrEnd,
    /// Command frames.
    Command,
    /// Ready frames, including auto-addressing.
    Ready,
    /// Identify frames.
    Identify,
}

/// The group of a command frame, encoded in the upper 3 bits of its data byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandGroup {
    /// Addressed and universal commands from 0x00 to 0x1F (`SDC`, `DCL`, `GET` ...).
    Addressed = 0,
    /// Listen address `LAD`, including `UNL`.
    Listen = 1,
    /// Talk address `TAD`, including `UNT`.
    Talk = 2,
    /// Secondary address `SAD`.
    Secondary = 3,
    /// Loop commands from 0x80 to 0x9F (`IFC`, `AAU` ...).
    Universal = 4,
    /// Device dependent listener commands `DDL`.
    DeviceListen = 5,
    /// Device dependent talker commands `DDT`.
    DeviceTalk = 6,
    /// Reserved extended commands.
    Extended = 7,
}

/// An operand value selecting no device, e.g. `UNL` is `LAD 31`.
pub const UNADDRESS: u8 = 0x1F;

impl Frame {
    pub const DAB: Frame = Frame(0x000);
    pub const END: Frame = Frame(0x200);

    pub const NUL: Frame = Frame(0x400);
    pub const GTL: Frame = Frame(0x401);
    pub const SDC: Frame = Frame(0x404);
    pub const PPD: Frame = Frame(0x405);
    pub const GET: Frame = Frame(0x408);
    pub const ELN: Frame = Frame(0x40F);
    pub const NOP: Frame = Frame(0x410);
    pub const LLO: Frame = Frame(0x411);
    pub const DCL: Frame = Frame(0x414);
    pub const PPU: Frame = Frame(0x415);
    pub const EAR: Frame = Frame(0x418);
    pub const LAD: Frame = Frame(0x420);
    pub const UNL: Frame = Frame(0x43F);
    pub const TAD: Frame = Frame(0x440);
    pub const UNT: Frame = Frame(0x45F);
    pub const SAD: Frame = Frame(0x460);
    pub const IFC: Frame = Frame(0x490);
    pub const REN: Frame = Frame(0x492);
    pub const NRE: Frame = Frame(0x493);
    pub const TDIS: Frame = Frame(0x494);
    pub const COFI: Frame = Frame(0x495);
    pub const COFF: Frame = Frame(0x497);
    pub const AAU: Frame = Frame(0x49A);
    pub const LPD: Frame = Frame(0x49B);
    pub const DDL: Frame = Frame(0x4A0);
    pub const DDT: Frame = Frame(0x4C0);

    pub const RFC: Frame = Frame(0x500);
    pub const EOT: Frame = Frame(0x540);
    pub const ETE: Frame = Frame(0x541);
    pub const NRD: Frame = Frame(0x542);
    pub const SDA: Frame = Frame(0x560);
    pub const SST: Frame = Frame(0x561);
    pub const SDI: Frame = Frame(0x562);
    pub const SAI: Frame = Frame(0x563);
    pub const TCT: Frame = Frame(0x564);
    pub const AAD: Frame = Frame(0x580);
    pub const AEP: Frame = Frame(0x5A0);
    pub const AES: Frame = Frame(0x5C0);
    pub const AMP: Frame = Frame(0x5E0);

    pub const IDY: Frame = Frame(0x600);

    /// Creates a frame from a raw value. Bits above the 11th are discarded.
    #[inline]
    pub const fn new(raw: u16) -> Frame {
        Frame(raw & FRAME_MASK)
    }
    /// A `DAB` frame carrying `data`.
    #[inline]
    pub const fn data_byte(data: u8) -> Frame {
        Frame(data as u16)
    }
    /// An `END` frame carrying the last `data` byte of a message.
    #[inline]
    pub const fn end_byte(data: u8) -> Frame {
        Frame(END_BIT | data as u16)
    }
    /// `LAD n`, `n` = 31 gives `UNL`.
    #[inline]
    pub const fn listen(address: u8) -> Frame {
        Frame(Self::LAD.0 | (address & 0x1F) as u16)
    }
    /// `TAD n`, `n` = 31 gives `UNT`.
    #[inline]
    pub const fn talk(address: u8) -> Frame {
        Frame(Self::TAD.0 | (address & 0x1F) as u16)
    }
    /// `SAD n`.
    #[inline]
    pub const fn secondary(address: u8) -> Frame {
        Frame(Self::SAD.0 | (address & 0x1F) as u16)
    }
    /// `DDL n`.
    #[inline]
    pub const fn device_listen(command: u8) -> Frame {
        Frame(Self::DDL.0 | (command & 0x1F) as u16)
    }
    /// `DDT n`.
    #[inline]
    pub const fn device_talk(command: u8) -> Frame {
        Frame(Self::DDT.0 | (command & 0x1F) as u16)
    }
    /// `AAD n`.
    #[inline]
    pub const fn auto_address(address: u8) -> Frame {
        Frame(Self::AAD.0 | (address & 0x1F) as u16)
    }
    /// `AEP n`.
    #[inline]
    pub const fn auto_extended_primary(address: u8) -> Frame {
        Frame(Self::AEP.0 | (address & 0x1F) as u16)
    }
    /// `AES n`.
    #[inline]
    pub const fn auto_extended_secondary(address: u8) -> Frame {
        Frame(Self::AES.0 | (address & 0x1F) as u16)
    }
    /// Returns the raw 11-bit value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
    /// Returns the 8 data bits.
    #[inline]
    pub const fn data(self) -> u8 {
        self.0 as u8
    }
    /// Returns the low 5 bits of data, which are the operand of addressing and device dependent commands.
    #[inline]
    pub const fn operand(self) -> u8 {
        self.0 as u8 & 0x1F
    }
    /// Returns the 3 control bits.
    #[inline]
    pub const fn control(self) -> u8 {
        (self.0 >> 8) as u8
    }
    /// Returns the class of this frame.
    #[inline]
    pub fn class(self) -> FrameClass {
        match self.0 & CONTROL_MASK {
            0x000..=0x300 => FrameClass::DataOrEnd,
            0x400 => FrameClass::Command,
            0x500 => FrameClass::Ready,
            _ => FrameClass::Identify
        }
    }
    /// Returns the command group if this is a command frame.
    #[inline]
    pub fn command_group(self) -> Option<CommandGroup> {
        if self.class() == FrameClass::Command {
            Some(CommandGroup::from_data(self.data()))
        }
        else {
            None
        }
    }
    #[inline]
    pub fn is_data(self) -> bool {
        self.class() == FrameClass::DataOrEnd
    }
    #[inline]
    pub fn is_command(self) -> bool {
        self.class() == FrameClass::Command
    }
    #[inline]
    pub fn is_ready(self) -> bool {
        self.class() == FrameClass::Ready
    }
    #[inline]
    pub fn is_identify(self) -> bool {
        self.class() == FrameClass::Identify
    }
    /// Returns `true` if this is an `END` frame.
    #[inline]
    pub fn is_end(self) -> bool {
        self.is_data() && self.0 & END_BIT != 0
    }
    /// Returns `true` if the service request bit is set. Only data and identify frames can carry it.
    #[inline]
    pub fn is_service_request(self) -> bool {
        match self.class() {
            FrameClass::DataOrEnd|FrameClass::Identify => self.0 & SRQ_BIT != 0,
            _ => false
        }
    }
    /// Returns this frame with the service request bit set.
    ///
    /// Frames of other classes than data and identify are returned unmodified.
    #[inline]
    pub fn with_service_request(self) -> Frame {
        match self.class() {
            FrameClass::DataOrEnd|FrameClass::Identify => Frame(self.0 | SRQ_BIT),
            _ => self
        }
    }
    /// Returns this frame with the service request bit cleared.
    #[inline]
    pub fn without_service_request(self) -> Frame {
        match self.class() {
            FrameClass::DataOrEnd|FrameClass::Identify => Frame(self.0 & !SRQ_BIT),
            _ => self
        }
    }
    /// Compares two frames ignoring their service request bits.
    #[inline]
    pub fn matches(self, other: Frame) -> bool {
        self.without_service_request() == other.without_service_request()
    }
    /// Returns a frame with the raw value incremented by one, wrapping within the 8 data bits.
    ///
    /// This is how a device acknowledges an auto-addressing frame.
    #[inline]
    pub fn increment(self) -> Frame {
        Frame((self.0 & 0x700) | (self.data().wrapping_add(1) as u16))
    }
}

impl CommandGroup {
    /// Decodes the group of a command data byte.
    #[inline]
    pub fn from_data(data: u8) -> CommandGroup {
        match data >> 5 {
            0 => CommandGroup::Addressed,
            1 => CommandGroup::Listen,
            2 => CommandGroup::Talk,
            3 => CommandGroup::Secondary,
            4 => CommandGroup::Universal,
            5 => CommandGroup::DeviceListen,
            6 => CommandGroup::DeviceTalk,
            _ => CommandGroup::Extended
        }
    }
}

impl From<u16> for Frame {
    #[inline]
    fn from(raw: u16) -> Frame {
        Frame::new(raw)
    }
}

impl From<Frame> for u16 {
    #[inline]
    fn from(frame: Frame) -> u16 {
        frame.0
    }
}

/// An error returned when converting a value above 11 bits into a [Frame].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TryFromU16FrameError(pub u16);

impl std::error::Error for TryFromU16FrameError {}

impl fmt::Display for TryFromU16FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {:#06x} exceeds 11 bits of an HP-IL frame", self.0)
    }
}

impl Frame {
    /// Converts a raw value into a frame failing if any bit above the 11th is set.
    pub fn try_from_raw(raw: u16) -> Result<Frame, TryFromU16FrameError> {
        Frame::try_from(raw as u32)
    }
}

impl TryFrom<u32> for Frame {
    type Error = TryFromU16FrameError;
    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        if raw & !(FRAME_MASK as u32) == 0 {
            Ok(Frame(raw as u16))
        }
        else {
            Err(TryFromU16FrameError(raw as u16))
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#05x} {})", self.0, self)
    }
}

const ADDRESSED_MNEMONICS: [&str; 32] = [
    "NUL", "GTL", "CMD 02", "CMD 03", "SDC", "PPD", "CMD 06", "CMD 07",
    "GET", "CMD 09", "CMD 0A", "CMD 0B", "CMD 0C", "CMD 0D", "CMD 0E", "ELN",
    "NOP", "LLO", "CMD 12", "CMD 13", "DCL", "PPU", "CMD 16", "CMD 17",
    "EAR", "CMD 19", "CMD 1A", "CMD 1B", "CMD 1C", "CMD 1D", "CMD 1E", "CMD 1F"
];

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        let op = self.operand();
        let srq = if self.is_service_request() { " SRQ" } else { "" };
        match self.class() {
            FrameClass::DataOrEnd if self.is_end() => write!(f, "END {:02X}{}", data, srq),
            FrameClass::DataOrEnd => write!(f, "DAB {:02X}{}", data, srq),
            FrameClass::Identify => write!(f, "IDY {:02X}{}", data, srq),
            FrameClass::Command => match CommandGroup::from_data(data) {
                CommandGroup::Addressed => f.write_str(ADDRESSED_MNEMONICS[op as usize]),
                CommandGroup::Listen if op == UNADDRESS => f.write_str("UNL"),
                CommandGroup::Listen => write!(f, "LAD {}", op),
                CommandGroup::Talk if op == UNADDRESS => f.write_str("UNT"),
                CommandGroup::Talk => write!(f, "TAD {}", op),
                CommandGroup::Secondary => write!(f, "SAD {}", op),
                CommandGroup::Universal => match data {
                    0x90 => f.write_str("IFC"),
                    0x92 => f.write_str("REN"),
                    0x93 => f.write_str("NRE"),
                    0x94 => f.write_str("TDIS"),
                    0x95 => f.write_str("COFI"),
                    0x97 => f.write_str("COFF"),
                    0x9A => f.write_str("AAU"),
                    0x9B => f.write_str("LPD"),
                    _ => write!(f, "CMD {:02X}", data)
                },
                CommandGroup::DeviceListen => write!(f, "DDL {}", op),
                CommandGroup::DeviceTalk => write!(f, "DDT {}", op),
                CommandGroup::Extended => write!(f, "CMD {:02X}", data),
            },
            FrameClass::Ready => match data {
                0x00 => f.write_str("RFC"),
                0x40 => f.write_str("EOT"),
                0x41 => f.write_str("ETE"),
                0x42 => f.write_str("NRD"),
                0x60 => f.write_str("SDA"),
                0x61 => f.write_str("SST"),
                0x62 => f.write_str("SDI"),
                0x63 => f.write_str("SAI"),
                0x64 => f.write_str("TCT"),
                0x80..=0x9F => write!(f, "AAD {}", op),
                0xA0..=0xBF => write!(f, "AEP {}", op),
                0xC0..=0xDF => write!(f, "AES {}", op),
                0xE0..=0xFF => write!(f, "AMP {}", op),
                _ => write!(f, "RDY {:02X}", data)
            }
        }
    }
}

/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! Conversion between [Frame]s and the bytes travelling over a link.
//!
//! ### PIL-Box framing
//!
//! Each frame is split into a high and a low byte. The PIL-Box can work in a 7-bit or an 8-bit mode
//! and the mode is recognized by the marker bits of the low byte:
//!
//! ```text
//!                  7   6   5   4   3   2   1   0
//!               +---+---+---+---+---+---+---+---+
//! 7-bit    HIGH | 0 | 0 | 1 |f10|f9 |f8 |f7 |f6 |
//!           LOW | 0 | 1 |f5 |f4 |f3 |f2 |f1 |f0 |
//!               |---+---+---+---+---+---+---+---|
//! 8-bit    HIGH | 0 | 0 | 1 |f10|f9 |f8 |f7 | 0 |
//!           LOW | 1 |f6 |f5 |f4 |f3 |f2 |f1 |f0 |
//!               +---+---+---+---+---+---+---+---+
//! ```
//! A high byte is only transmitted when it differs from the previously transmitted one.
//!
//! ### Network framing
//!
//! HP-IL over TCP/IP transmits each frame as a 16-bit big-endian word.
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::frame::Frame;

/// The marker bit of a PIL-Box high byte.
pub const HIGH_MARKER: u8 = 0x20;
/// The marker bit of a 7-bit mode low byte.
pub const LOW_MARKER_7: u8 = 0x40;
/// The marker bit of an 8-bit mode low byte.
pub const LOW_MARKER_8: u8 = 0x80;

/// The byte layout used by a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WireFormat {
    /// The PIL-Box serial layout, also used by the Unix socket transport.
    PilBox,
    /// The HP-IL over TCP/IP layout.
    Network,
}

/// The PIL-Box encoding mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CodecMode {
    SevenBit,
    EightBit,
}

/// Assembles frames from received bytes and disassembles frames into bytes to be transmitted.
///
/// The encoding mode is a single piece of state: it is switched by every assembled frame
/// according to the marker of its low byte and it is read when disassembling the next frame.
/// One codec is owned by each link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCodec {
    format: WireFormat,
    mode: CodecMode,
    high: Option<u8>,
}

impl Default for CodecMode {
    fn default() -> Self {
        CodecMode::EightBit
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(WireFormat::PilBox)
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::PilBox => f.write_str("PIL-Box"),
            WireFormat::Network => f.write_str("TCP/IP"),
        }
    }
}

impl FrameCodec {
    pub fn new(format: WireFormat) -> Self {
        FrameCodec { format, mode: CodecMode::default(), high: None }
    }
    /// Returns the byte layout.
    #[inline]
    pub fn format(&self) -> WireFormat {
        self.format
    }
    /// Returns the current encoding mode.
    #[inline]
    pub fn mode(&self) -> CodecMode {
        self.mode
    }
    /// Forces the encoding mode until the next frame is assembled.
    #[inline]
    pub fn set_mode(&mut self, mode: CodecMode) {
        self.mode = mode;
    }
    /// Forgets a partially received frame.
    pub fn reset(&mut self) {
        self.high = None;
    }
    /// Assembles a frame from a `high` and a `low` byte.
    ///
    /// In the PIL-Box layout the encoding mode is switched by the marker bit of the `low` byte.
    pub fn assemble(&mut self, high: u8, low: u8) -> Frame {
        match self.format {
            WireFormat::PilBox => {
                if low & LOW_MARKER_8 != 0 {
                    self.mode = CodecMode::EightBit;
                    Frame::new(((high & 0x1E) as u16) << 6 | (low & 0x7F) as u16)
                }
                else {
                    self.mode = CodecMode::SevenBit;
                    Frame::new(((high & 0x1F) as u16) << 6 | (low & 0x3F) as u16)
                }
            }
            WireFormat::Network => Frame::new(u16::from_be_bytes([high, low]))
        }
    }
    /// Splits a frame into a pair of `(high, low)` bytes using the current encoding mode.
    pub fn disassemble(&self, frame: Frame) -> (u8, u8) {
        let raw = frame.raw();
        match (self.format, self.mode) {
            (WireFormat::PilBox, CodecMode::EightBit) => {
                ((raw >> 6) as u8 & 0x1E | HIGH_MARKER, raw as u8 & 0x7F | LOW_MARKER_8)
            }
            (WireFormat::PilBox, CodecMode::SevenBit) => {
                ((raw >> 6) as u8 & 0x1F | HIGH_MARKER, raw as u8 & 0x3F | LOW_MARKER_7)
            }
            (WireFormat::Network, _) => {
                let [high, low] = raw.to_be_bytes();
                (high, low)
            }
        }
    }
    /// Feeds a single received byte. Returns a frame once both of its bytes have arrived.
    ///
    /// In the PIL-Box layout high bytes are recognized by their marker bits and remembered,
    /// so that a frame may consist of a low byte only. In the network layout bytes simply
    /// arrive in pairs.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.format {
            WireFormat::PilBox => {
                if byte & (LOW_MARKER_7|LOW_MARKER_8) == 0 {
                    self.high = Some(byte);
                    None
                }
                else {
                    let high = self.high.unwrap_or(HIGH_MARKER);
                    Some(self.assemble(high, byte))
                }
            }
            WireFormat::Network => match self.high.take() {
                Some(high) => Some(self.assemble(high, byte)),
                None => {
                    self.high = Some(byte);
                    None
                }
            }
        }
    }
    /// Returns `true` if the next byte fed to the network layout completes a frame.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.high.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip_works() {
        for &mode in &[CodecMode::SevenBit, CodecMode::EightBit] {
            let mut codec = FrameCodec::new(WireFormat::PilBox);
            for raw in 0..0x800u16 {
                codec.set_mode(mode);
                let frame = Frame::new(raw);
                let (high, low) = codec.disassemble(frame);
                assert_eq!(high & 0xE0, HIGH_MARKER);
                let assembled = codec.assemble(high, low);
                assert_eq!(assembled, frame);
                assert_eq!(codec.mode(), mode);
                assert_eq!(codec.disassemble(assembled), (high, low));
            }
        }
        let mut codec = FrameCodec::new(WireFormat::Network);
        for raw in 0..0x800u16 {
            let (high, low) = codec.disassemble(Frame::new(raw));
            assert_eq!(codec.assemble(high, low).raw(), raw);
        }
    }

    #[test]
    fn codec_mode_switch_works() {
        let mut codec = FrameCodec::new(WireFormat::PilBox);
        assert_eq!(codec.mode(), CodecMode::EightBit);
        // 7-bit SDA
        assert_eq!(codec.assemble(0x35, 0x60), Frame::SDA);
        assert_eq!(codec.mode(), CodecMode::SevenBit);
        assert_eq!(codec.disassemble(Frame::COFF), (0x32, 0x57));
        // 8-bit SDA
        assert_eq!(codec.assemble(0x34, 0xE0), Frame::SDA);
        assert_eq!(codec.mode(), CodecMode::EightBit);
        assert_eq!(codec.disassemble(Frame::COFF), (0x32, 0x97));
    }

    #[test]
    fn codec_feed_works() {
        let mut codec = FrameCodec::new(WireFormat::PilBox);
        assert_eq!(codec.feed(0x34), None);
        assert_eq!(codec.feed(0xE0), Some(Frame::SDA));
        // the high byte is being remembered
        assert_eq!(codec.feed(0xE1), Some(Frame::SST));
        assert_eq!(codec.feed(0x20), None);
        assert_eq!(codec.feed(0xC1), Some(Frame::data_byte(0x41)));

        let mut codec = FrameCodec::new(WireFormat::Network);
        assert_eq!(codec.feed(0x01), None);
        assert!(codec.is_pending());
        assert_eq!(codec.feed(0x40), Some(Frame::new(0x140)));
        assert!(!codec.is_pending());
        assert_eq!(codec.disassemble(Frame::new(0x140)), (0x01, 0x40));
    }
}

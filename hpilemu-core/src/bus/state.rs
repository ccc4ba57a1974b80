/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// The addressing state of a loop device.
///
/// The discriminants form a bit field:
///
/// ```text
///   bit  7         6        5          4          1      0
///     listener  talker  listener   talker    status   data
///               (MTA)   awaiting   awaiting  output   output
///                       SAD        SAD
/// ```
/// A state awaiting a secondary address is promoted to the fully addressed state
/// by shifting its bits left by 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum BusState {
    Idle = 0x00,
    AddressedListener = 0x80,
    AddressedListenerSecondary = 0x20,
    AddressedTalker = 0x40,
    AddressedTalkerSecondary = 0x10,
    ActiveTalkerData = 0x41,
    ActiveTalkerStatus = 0x42,
}

impl Default for BusState {
    fn default() -> Self {
        BusState::Idle
    }
}

impl BusState {
    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }
    /// Returns `true` for a fully addressed listener.
    #[inline]
    pub fn is_listener(self) -> bool {
        self == BusState::AddressedListener
    }
    /// Returns `true` for an addressed or an active talker.
    #[inline]
    pub fn is_talker(self) -> bool {
        self.bits() & 0x40 != 0
    }
    /// Returns `true` if the device is currently sending data or status bytes.
    #[inline]
    pub fn is_active_talker(self) -> bool {
        self.bits() & 0x03 != 0
    }
    /// Returns `true` if the device waits for its secondary address.
    #[inline]
    pub fn is_awaiting_secondary(self) -> bool {
        self.bits() & 0x30 != 0
    }
    /// Promotes a state awaiting a secondary address to its fully addressed counterpart.
    ///
    /// Other states are returned unmodified.
    #[inline]
    pub fn promote(self) -> BusState {
        match self.bits() & 0x30 {
            0 => self,
            bits => BusState::from_bits(bits << 2)
        }
    }

    fn from_bits(bits: u8) -> BusState {
        match bits {
            0x80 => BusState::AddressedListener,
            0x20 => BusState::AddressedListenerSecondary,
            0x40 => BusState::AddressedTalker,
            0x10 => BusState::AddressedTalkerSecondary,
            0x41 => BusState::ActiveTalkerData,
            0x42 => BusState::ActiveTalkerStatus,
            _ => BusState::Idle
        }
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusState::Idle => "idle",
            BusState::AddressedListener => "listener",
            BusState::AddressedListenerSecondary => "listener (awaiting SAD)",
            BusState::AddressedTalker => "talker",
            BusState::AddressedTalkerSecondary => "talker (awaiting SAD)",
            BusState::ActiveTalkerData => "active talker",
            BusState::ActiveTalkerStatus => "active talker (status)",
        })
    }
}

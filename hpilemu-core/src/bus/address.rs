/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// The highest assignable loop address. Address 31 is reserved for unaddressing.
pub const MAX_ADDRESS: u8 = 30;

/// The primary and secondary loop address of a device.
///
/// Addresses are assigned by the controller with the auto-addressing frames: `AAD` and `AEP`
/// for the primary address and `AES` for the secondary one. An address that was not assigned
/// does not make the device respond to `LAD`, `TAD` or `SAD`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DeviceAddress {
    pub primary: u8,
    pub primary_assigned: bool,
    pub secondary: u8,
    pub secondary_assigned: bool,
}

impl DeviceAddress {
    /// Creates an unassigned address holding the device's `default` primary address.
    pub fn new(default: u8) -> Self {
        DeviceAddress {
            primary: default & 0x1F,
            ..DeviceAddress::default()
        }
    }
    /// Drops both assignments and restores the `default` primary address.
    pub fn unconfigure(&mut self, default: u8) {
        *self = DeviceAddress::new(default);
    }
    /// Drops both assignments keeping the address values.
    pub fn unassign(&mut self) {
        self.primary_assigned = false;
        self.secondary_assigned = false;
    }
    /// Returns `true` if `operand` is this device's assigned primary address.
    #[inline]
    pub fn is_primary(&self, operand: u8) -> bool {
        self.primary_assigned && operand <= MAX_ADDRESS && self.primary == operand
    }
    /// Returns `true` if `operand` is this device's assigned secondary address.
    #[inline]
    pub fn is_secondary(&self, operand: u8) -> bool {
        self.secondary_assigned && operand <= MAX_ADDRESS && self.secondary == operand
    }
    /// Returns `true` if the device is using an extended (primary + secondary) address.
    #[inline]
    pub fn is_extended(&self) -> bool {
        self.secondary_assigned
    }
    /// Claims the offered primary `address` only if no primary address has been assigned yet.
    pub fn claim_primary(&mut self, address: u8) -> bool {
        if self.primary_assigned || address > MAX_ADDRESS {
            return false
        }
        self.primary = address;
        self.primary_assigned = true;
        true
    }
    /// Claims the offered secondary `address` only if no secondary address has been assigned yet.
    pub fn claim_secondary(&mut self, address: u8) -> bool {
        if self.secondary_assigned || address > MAX_ADDRESS {
            return false
        }
        self.secondary = address;
        self.secondary_assigned = true;
        true
    }
}

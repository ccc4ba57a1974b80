/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
use std::sync::{Arc, Mutex, MutexGuard};

use arrayvec::ArrayVec;

/// The maximum number of status bytes a device can report.
pub const MAX_STATUS_BYTES: usize = 8;
/// The bit of the first status byte indicating a service request.
pub const SRQ_STATUS_BIT: u8 = 0x40;

/// The status of a loop device.
///
/// Holds 1 up to [MAX_STATUS_BYTES] status bytes sent in response to `SST`, the service request
/// flag and a flag indicating that the device's content was modified (e.g. a disk image was written).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusRegister {
    bytes: ArrayVec<u8, MAX_STATUS_BYTES>,
    service_request: bool,
    modified: bool,
}

/// A shared handle to a [StatusRegister].
///
/// The device state machine and the user interface each keep a clone. The register is locked
/// only for the duration of a single access.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle(Arc<Mutex<StatusRegister>>);

impl Default for StatusRegister {
    fn default() -> Self {
        StatusRegister::new(&[0])
    }
}

impl StatusRegister {
    /// Creates a register with the given initial status bytes.
    ///
    /// An empty slice gives a single zero byte, bytes above [MAX_STATUS_BYTES] are ignored.
    pub fn new(bytes: &[u8]) -> Self {
        let mut status = StatusRegister {
            bytes: ArrayVec::new(),
            service_request: false,
            modified: false
        };
        status.set_bytes(bytes);
        status
    }
    /// Returns the status bytes without the service request bit.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// Replaces the status bytes.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        let len = bytes.len().min(MAX_STATUS_BYTES);
        self.bytes.try_extend_from_slice(&bytes[..len]).unwrap_or(());
        if self.bytes.is_empty() {
            self.bytes.push(0);
        }
    }
    /// Replaces a single status byte. Out of range indexes are ignored.
    pub fn set_byte(&mut self, index: usize, byte: u8) {
        if let Some(p) = self.bytes.get_mut(index) {
            *p = byte;
        }
    }
    /// Returns the status bytes as sent over the loop: with the service request bit
    /// merged into the first byte.
    pub fn snapshot(&self) -> ArrayVec<u8, MAX_STATUS_BYTES> {
        let mut bytes = self.bytes.clone();
        if self.service_request {
            bytes[0] |= SRQ_STATUS_BIT;
        }
        bytes
    }
    #[inline]
    pub fn service_requested(&self) -> bool {
        self.service_request
    }
    #[inline]
    pub fn request_service(&mut self) {
        self.service_request = true;
    }
    #[inline]
    pub fn clear_service_request(&mut self) {
        self.service_request = false;
    }
    #[inline]
    pub fn set_service_request(&mut self, srq: bool) {
        self.service_request = srq;
    }
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
    #[inline]
    pub fn set_modified(&mut self) {
        self.modified = true;
    }
    /// Returns and resets the modified flag.
    #[inline]
    pub fn take_modified(&mut self) -> bool {
        core::mem::replace(&mut self.modified, false)
    }
}

impl StatusHandle {
    pub fn new(bytes: &[u8]) -> Self {
        StatusHandle(Arc::new(Mutex::new(StatusRegister::new(bytes))))
    }
    /// Locks the register. A register poisoned by a panicking thread is still returned
    /// as it contains plain data only.
    pub fn lock(&self) -> MutexGuard<'_, StatusRegister> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }
    /// Calls `f` with the locked register.
    pub fn with<R, F: FnOnce(&mut StatusRegister) -> R>(&self, f: F) -> R {
        f(&mut self.lock())
    }
    #[inline]
    pub fn service_requested(&self) -> bool {
        self.lock().service_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_register_works() {
        let status = StatusHandle::new(&[]);
        assert_eq!(status.lock().bytes(), &[0]);
        let ui = status.clone();
        ui.with(|st| {
            st.set_bytes(&[0x14, 0x01]);
            st.request_service();
        });
        assert!(status.service_requested());
        assert_eq!(&status.lock().snapshot()[..], &[0x54, 0x01]);
        assert_eq!(status.lock().bytes(), &[0x14, 0x01]);
        status.with(|st| st.set_byte(5, 0xFF));
        assert_eq!(status.lock().bytes().len(), 2);
        status.with(StatusRegister::set_modified);
        assert!(ui.with(|st| st.take_modified()));
        assert!(!ui.lock().is_modified());
        let long = StatusRegister::new(&[1; 20]);
        assert_eq!(long.bytes().len(), MAX_STATUS_BYTES);
    }
}

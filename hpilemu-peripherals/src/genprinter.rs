/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! An emulator of the **HP2225B** ThinkJet style generic printer.
//!
//! All received bytes, including escape sequences, are passed unchanged to a writer.
use core::fmt;
use std::io::Write;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::bus::{DeviceExt, StatusHandle};
use hpilemu_core::frame::Frame;

/// The default loop address of a generic printer.
pub const DEFAULT_ADDRESS: u8 = 1;
pub const DEVICE_ID: &str = "HP2225B";
pub const ACCESSORY_ID: u8 = 0x20;

/// Status bit: the output could not be written.
pub const STATUS_ERROR: u8 = 0x80;

const LF: u8 = 0x0A;
const FF: u8 = 0x0C;

/// The generic printer device extension. Printed bytes are written to `W`.
#[derive(Debug)]
pub struct GenericPrinter<W> {
    /// Direct access to the underlying output writer.
    pub writer: W,
    status: StatusHandle,
    failed: bool,
}

impl<W: Write + Send + fmt::Debug> GenericPrinter<W> {
    pub fn new(writer: W) -> Self {
        GenericPrinter { writer, status: StatusHandle::default(), failed: false }
    }
    /// Returns `true` if writing the output has failed since the last device clear.
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn print(&mut self, byte: u8) -> std::io::Result<()> {
        self.writer.write_all(&[byte])?;
        if byte == LF || byte == FF {
            self.writer.flush()?;
        }
        Ok(())
    }
}

impl<W: Write + Send + fmt::Debug> DeviceExt for GenericPrinter<W> {
    fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn on_clear(&mut self) {
        self.failed = false;
        self.status.with(|st| st.set_byte(0, 0));
    }

    fn on_receive_data(&mut self, frame: Frame) {
        if let Err(err) = self.print(frame.data()) {
            if !self.failed {
                error!("printer output: {}", err);
                self.failed = true;
                self.status.with(|st| st.set_byte(0, STATUS_ERROR));
            }
        }
    }

    fn device_id(&self) -> &str {
        DEVICE_ID
    }

    fn accessory_id(&self) -> u8 {
        ACCESSORY_ID
    }
}

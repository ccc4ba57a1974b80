/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! An emulator of the **HP82162A** thermal printer.
//!
//! The printer collects received bytes in a 24 column line buffer. A line is handed to the
//! [Spooler] when a `CR` or `LF` is received (`LF` directly after `CR` doesn't print an empty line),
//! when the buffer gets full, or on request with `DDL 1`. `DDL 0` discards the buffered line.
//!
//! The printing mode (one of the `MAN`, `NORM` or `TRACE` switch positions) and the paper advance
//! button are operated through a [command queue][crate::queue].
use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use arrayvec::ArrayVec;
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use hpilemu_core::bus::{BusState, DeviceExt, StatusHandle};
use hpilemu_core::frame::{CommandGroup, Frame};

use crate::queue::{command_queue, QueueReceiver, QueueSender, QUEUE_CAPACITY};

/// The number of characters in each printed line.
pub const LINE_WIDTH: usize = 24;
/// The default loop address of a printer.
pub const DEFAULT_ADDRESS: u8 = 1;
pub const DEVICE_ID: &str = "HP82162A";
pub const ACCESSORY_ID: u8 = 0x20;

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;
const FF: u8 = 0x0C;

bitflags! {
    /// The printer status reported as 2 bytes in response to `SST`.
    ///
    /// The most significant byte is sent first. Bit `0x4000` is reserved for the service request.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[derive(Default, Debug, PartialEq, Eq, Hash, Clone, Copy)]
    pub struct PrinterStatus: u16 {
        const ERROR     = 0x8000;
        const PAPER_OUT = 0x2000;
        /// The line buffer is empty.
        const EMPTY     = 0x1000;
        /// The printer mechanism is idle.
        const IDLE      = 0x0800;
        const MAN       = 0x0004;
        const NORM      = 0x0002;
        const TRACE     = 0x0001;
    }
}

impl PrinterStatus {
    /// Returns the status bytes as sent over the loop.
    #[inline]
    pub fn to_bytes(self) -> [u8; 2] {
        self.bits().to_be_bytes()
    }
}

/// The position of the printing mode switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrinterMode {
    Manual,
    Normal,
    Trace,
}

impl Default for PrinterMode {
    fn default() -> Self {
        PrinterMode::Manual
    }
}

impl PrinterMode {
    fn flag(self) -> PrinterStatus {
        match self {
            PrinterMode::Manual => PrinterStatus::MAN,
            PrinterMode::Normal => PrinterStatus::NORM,
            PrinterMode::Trace => PrinterStatus::TRACE,
        }
    }
}

/// User actions sent to the printer from other threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrinterCommand {
    /// Changes the position of the mode switch.
    SetMode(PrinterMode),
    /// Advances the paper by one empty line.
    PaperAdvance,
}

/// An interface to the printer's paper.
///
/// An implementation of this trait must be provided in order to complete the emulation of [Printer].
pub trait Spooler: fmt::Debug + Send {
    /// Called with each printed line. The slice is never longer than [LINE_WIDTH] and
    /// is empty when the paper is advanced.
    fn push_line(&mut self, line: &[u8]);
    /// Can be implemented to get the notification of a form feed.
    fn form_feed(&mut self) {}
}

/// A spooler that logs each printed line.
#[derive(Clone, Copy, Default, Debug)]
pub struct LogSpooler;

impl Spooler for LogSpooler {
    fn push_line(&mut self, line: &[u8]) {
        info!("printer: {}", String::from_utf8_lossy(line));
    }
    fn form_feed(&mut self) {
        info!("printer: ----");
    }
}

/// The content of a [BufferSpooler].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paper {
    pub lines: Vec<Vec<u8>>,
    pub form_feeds: usize,
}

/// A spooler collecting printed lines in memory. Clones share the same paper.
#[derive(Clone, Debug, Default)]
pub struct BufferSpooler(Arc<Mutex<Paper>>);

impl BufferSpooler {
    pub fn new() -> Self {
        BufferSpooler::default()
    }
    /// Returns the printed paper.
    pub fn paper(&self) -> MutexGuard<'_, Paper> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }
    /// Returns the printed lines converted to text.
    pub fn text_lines(&self) -> Vec<String> {
        self.paper().lines.iter().map(|line| String::from_utf8_lossy(line).into_owned()).collect()
    }
}

impl Spooler for BufferSpooler {
    fn push_line(&mut self, line: &[u8]) {
        self.paper().lines.push(line.to_vec());
    }
    fn form_feed(&mut self) {
        self.paper().form_feeds += 1;
    }
}

impl<S: Spooler + ?Sized> Spooler for Box<S> {
    fn push_line(&mut self, line: &[u8]) {
        (**self).push_line(line)
    }
    fn form_feed(&mut self) {
        (**self).form_feed()
    }
}

/// The printer device extension.
///
/// An implementation of a [Spooler] trait is required as generic `S` to complete this type.
#[derive(Debug)]
pub struct Printer<S> {
    /// An instance of the [Spooler] trait implementation type.
    pub spooler: S,
    status: StatusHandle,
    flags: PrinterStatus,
    line: ArrayVec<u8, LINE_WIDTH>,
    last_byte: u8,
    commands: Option<QueueReceiver<PrinterCommand>>,
}

impl<S: Spooler + Default> Default for Printer<S> {
    fn default() -> Self {
        Printer::new(S::default())
    }
}

impl<S: Spooler> Printer<S> {
    pub fn new(spooler: S) -> Self {
        let flags = PrinterStatus::EMPTY | PrinterStatus::IDLE | PrinterMode::default().flag();
        Printer {
            spooler,
            status: StatusHandle::new(&flags.to_bytes()),
            flags,
            line: ArrayVec::new(),
            last_byte: 0,
            commands: None
        }
    }
    /// Creates a printer together with the sending end of its command queue.
    pub fn with_queue(spooler: S) -> (Self, QueueSender<PrinterCommand>) {
        let (tx, rx) = command_queue(QUEUE_CAPACITY);
        let mut printer = Printer::new(spooler);
        printer.commands = Some(rx);
        (printer, tx)
    }
    /// Returns the current status flags.
    #[inline]
    pub fn flags(&self) -> PrinterStatus {
        self.flags
    }
    /// Returns the position of the mode switch.
    pub fn mode(&self) -> PrinterMode {
        if self.flags.contains(PrinterStatus::TRACE) {
            PrinterMode::Trace
        }
        else if self.flags.contains(PrinterStatus::NORM) {
            PrinterMode::Normal
        }
        else {
            PrinterMode::Manual
        }
    }
    /// Returns the content of the line buffer.
    #[inline]
    pub fn pending_line(&self) -> &[u8] {
        &self.line
    }

    pub fn set_mode(&mut self, mode: PrinterMode) {
        self.flags.remove(PrinterStatus::MAN | PrinterStatus::NORM | PrinterStatus::TRACE);
        self.flags.insert(mode.flag());
        debug!("printer mode: {:?}", mode);
        self.update_status();
    }
    /// Prints an empty line.
    pub fn paper_advance(&mut self) {
        self.spooler.push_line(&[]);
    }

    fn update_status(&mut self) {
        self.flags.set(PrinterStatus::EMPTY, self.line.is_empty());
        let bytes = self.flags.to_bytes();
        self.status.with(|st| st.set_bytes(&bytes));
    }

    fn print_line(&mut self) {
        self.spooler.push_line(&self.line);
        self.line.clear();
    }

    fn print_byte(&mut self, byte: u8) {
        match byte {
            CR => self.print_line(),
            LF if self.last_byte != CR => self.print_line(),
            LF => {}
            FF => {
                if !self.line.is_empty() {
                    self.print_line();
                }
                self.spooler.form_feed();
            }
            _ => {
                if self.line.try_push(byte).is_err() {
                    self.print_line();
                    self.line.push(byte);
                }
                if self.line.is_full() {
                    self.print_line();
                }
            }
        }
        self.last_byte = byte;
    }
}

impl<S: Spooler> DeviceExt for Printer<S> {
    fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn on_clear(&mut self) {
        self.line.clear();
        self.last_byte = 0;
        self.update_status();
    }

    fn on_extended_command(&mut self, frame: Frame, state: BusState) {
        if state.is_listener() && frame.command_group() == Some(CommandGroup::DeviceListen) {
            match frame.operand() {
                0 => self.line.clear(),
                1 => self.print_line(),
                ddl => debug!("unsupported DDL {}", ddl)
            }
            self.update_status();
        }
    }

    fn on_receive_data(&mut self, frame: Frame) {
        self.print_byte(frame.data());
        self.update_status();
    }

    fn on_poll(&mut self) {
        let commands: Vec<PrinterCommand> = match self.commands.as_ref() {
            Some(rx) => rx.drain().collect(),
            None => return
        };
        for command in commands {
            match command {
                PrinterCommand::SetMode(mode) => self.set_mode(mode),
                PrinterCommand::PaperAdvance => self.paper_advance(),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn send(printer: &mut Printer<BufferSpooler>, bytes: &[u8]) {
        for &b in bytes {
            printer.on_receive_data(Frame::data_byte(b));
        }
    }

    #[test]
    fn printer_lines_work() {
        let spooler = BufferSpooler::new();
        let mut printer = Printer::new(spooler.clone());
        assert_eq!(printer.status().lock().bytes(), &[0x18, 0x04]);
        send(&mut printer, b"HELLO\r\nWORLD\n\nX");
        assert_eq!(spooler.text_lines(), ["HELLO", "WORLD", ""]);
        assert_eq!(printer.pending_line(), b"X");
        assert_eq!(printer.status().lock().bytes(), &[0x08, 0x04]);
        send(&mut printer, b"\x0c");
        assert_eq!(spooler.paper().form_feeds, 1);
        assert_eq!(spooler.paper().lines.len(), 4);
        send(&mut printer, b"0123456789ABCDEFGHIJKLMNOP");
        assert_eq!(spooler.text_lines()[4], "0123456789ABCDEFGHIJKLMN");
        assert_eq!(printer.pending_line(), b"OP");
    }

    #[test]
    fn printer_commands_work() {
        let spooler = BufferSpooler::new();
        let (mut printer, tx) = Printer::with_queue(spooler.clone());
        send(&mut printer, b"AB");
        printer.on_extended_command(Frame::device_listen(0), BusState::AddressedListener);
        assert!(printer.pending_line().is_empty());
        send(&mut printer, b"CD");
        printer.on_extended_command(Frame::device_listen(1), BusState::AddressedTalker);
        assert_eq!(printer.pending_line(), b"CD");
        printer.on_extended_command(Frame::device_listen(1), BusState::AddressedListener);
        assert_eq!(spooler.text_lines(), ["CD"]);

        tx.try_push(PrinterCommand::SetMode(PrinterMode::Trace)).unwrap();
        tx.try_push(PrinterCommand::PaperAdvance).unwrap();
        printer.on_poll();
        assert_eq!(printer.mode(), PrinterMode::Trace);
        assert_eq!(printer.flags(), PrinterStatus::EMPTY | PrinterStatus::IDLE | PrinterStatus::TRACE);
        assert_eq!(printer.status().lock().bytes(), &[0x18, 0x01]);
        assert_eq!(spooler.text_lines(), ["CD", ""]);
        assert_eq!(printer.device_id(), "HP82162A");
    }
}

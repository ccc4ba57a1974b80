/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! An emulator of the **HP7470A** graphics plotter.
//!
//! The received HP-GL instructions are passed unchanged to a writer, e.g. a file to be rendered
//! by an external program. The plotter recognises the instruction mnemonics to keep track of
//! the pen state and to answer the output instructions (`OI`, `OS`, `OE`, `OP`, `OF`).
//! An answer is sent as a `CR LF` terminated ASCII line when the plotter is asked for data.
use core::fmt;
use std::collections::VecDeque;
use std::io::Write;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::bus::{DeviceExt, StatusHandle, SRQ_STATUS_BIT};
use hpilemu_core::frame::Frame;

/// The default loop address of a plotter.
pub const DEFAULT_ADDRESS: u8 = 5;
pub const DEVICE_ID: &str = "HP7470A";
pub const ACCESSORY_ID: u8 = 0x60;

/// Output status bits reported by `OS`.
pub const OS_PEN_DOWN: u8 = 0x01;
pub const OS_INITIALIZED: u8 = 0x08;
pub const OS_READY: u8 = 0x10;
pub const OS_ERROR: u8 = 0x20;

/// The error code of an unrecognised instruction reported by `OE`.
pub const ERROR_UNKNOWN_INSTRUCTION: u8 = 1;

/// The answer to `OP`: the scaling points P1 and P2 in plotter units.
pub const SCALING_POINTS: &str = "250,279,10250,7479";
/// The answer to `OF`: plotter units per millimetre.
pub const FACTORS: &str = "40,40";

const ETX: u8 = 0x03;

const MNEMONICS: &[&[u8; 2]] = &[
    b"AA", b"AR", b"CA", b"CI", b"CP", b"CS", b"DC", b"DF", b"DI", b"DP", b"DR", b"DT",
    b"EA", b"ER", b"EW", b"FT", b"IM", b"IN", b"IP", b"IW", b"LB", b"LT", b"OA", b"OC",
    b"OD", b"OE", b"OF", b"OI", b"OO", b"OP", b"OS", b"OW", b"PA", b"PD", b"PR", b"PT",
    b"PU", b"RA", b"RR", b"SA", b"SC", b"SI", b"SL", b"SM", b"SP", b"SR", b"SS", b"TL",
    b"UC", b"VS", b"WG", b"XT", b"YT",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Parser {
    Mnemonic(Option<u8>),
    Label,
}

/// The plotter device extension. Plot data is written to `W`.
#[derive(Debug)]
pub struct Plotter<W> {
    /// Direct access to the underlying plot data writer.
    pub writer: W,
    status: StatusHandle,
    parser: Parser,
    output_status: u8,
    error: u8,
    response: VecDeque<u8>,
}

impl<W: Write + Send + fmt::Debug> Plotter<W> {
    pub fn new(writer: W) -> Self {
        let output_status = OS_INITIALIZED|OS_READY;
        Plotter {
            writer,
            status: StatusHandle::new(&[output_status]),
            parser: Parser::Mnemonic(None),
            output_status,
            error: 0,
            response: VecDeque::new()
        }
    }
    /// Returns the current output status as reported by `OS`.
    #[inline]
    pub fn output_status(&self) -> u8 {
        self.output_status
    }
    #[inline]
    pub fn is_pen_down(&self) -> bool {
        self.output_status & OS_PEN_DOWN != 0
    }
    /// Returns the last error code as reported by `OE`.
    #[inline]
    pub fn error(&self) -> u8 {
        self.error
    }

    fn initialize(&mut self) {
        self.output_status = OS_INITIALIZED|OS_READY;
        self.error = 0;
    }

    fn respond(&mut self, text: &str) {
        trace!("plotter response: {}", text);
        self.response.clear();
        self.response.extend(text.bytes());
        self.response.extend(b"\r\n");
    }

    fn instruction(&mut self, mnemonic: [u8; 2]) {
        match &mnemonic {
            b"IN"|b"DF" => {
                self.initialize();
            }
            b"PU" => self.output_status &= !OS_PEN_DOWN,
            b"PD" => self.output_status |= OS_PEN_DOWN,
            b"LB" => self.parser = Parser::Label,
            b"OI" => self.respond(DEVICE_ID.trim_start_matches("HP")),
            b"OS" => {
                let status = self.output_status;
                self.respond(&status.to_string());
                self.output_status &= !OS_INITIALIZED;
            }
            b"OE" => {
                let error = self.error;
                self.respond(&error.to_string());
                self.error = 0;
                self.output_status &= !OS_ERROR;
            }
            b"OP" => self.respond(SCALING_POINTS),
            b"OF" => self.respond(FACTORS),
            m if MNEMONICS.contains(&m) => {}
            _ => {
                debug!("unknown HP-GL instruction: {}", String::from_utf8_lossy(&mnemonic));
                self.error = ERROR_UNKNOWN_INSTRUCTION;
                self.output_status |= OS_ERROR;
            }
        }
    }

    fn parse(&mut self, byte: u8) {
        match self.parser {
            Parser::Label => {
                if byte == ETX {
                    self.parser = Parser::Mnemonic(None);
                }
            }
            Parser::Mnemonic(first) if byte.is_ascii_alphabetic() => {
                let byte = byte.to_ascii_uppercase();
                match first {
                    Some(first) => {
                        self.parser = Parser::Mnemonic(None);
                        self.instruction([first, byte]);
                    }
                    None => self.parser = Parser::Mnemonic(Some(byte))
                }
            }
            Parser::Mnemonic(..) => self.parser = Parser::Mnemonic(None)
        }
    }

    fn update_status(&self) {
        let status = self.output_status & !SRQ_STATUS_BIT;
        self.status.with(|st| st.set_byte(0, status));
    }
}

impl<W: Write + Send + fmt::Debug> DeviceExt for Plotter<W> {
    fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn on_clear(&mut self) {
        self.parser = Parser::Mnemonic(None);
        self.response.clear();
    }

    fn on_receive_data(&mut self, frame: Frame) {
        let byte = frame.data();
        if let Err(err) = self.writer.write_all(&[byte]) {
            error!("plotter output: {}", err);
            self.output_status |= OS_ERROR;
        }
        self.parse(byte);
        self.update_status();
    }

    fn on_send_data(&mut self, frame: Frame) -> Frame {
        match self.response.pop_front() {
            Some(byte) => Frame::data_byte(byte),
            None if frame == Frame::SDA => frame,
            None => Frame::EOT
        }
    }

    fn on_abort(&mut self) {
        self.response.clear();
    }

    fn device_id(&self) -> &str {
        DEVICE_ID
    }

    fn accessory_id(&self) -> u8 {
        ACCESSORY_ID
    }
}

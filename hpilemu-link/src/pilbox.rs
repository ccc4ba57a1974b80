/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The PIL-Box serial adapter.
//!
//! The PIL-Box connects a real HP-IL loop to a serial port. Frames travel as pairs of bytes
//! in the [WireFormat::PilBox] layout, the high byte being sent only when it changes.
//!
//! The adapter is configured with commands sent as frames in the 8-bit layout, each command
//! being acknowledged by a byte whose lower 6 bits are equal to those of the command's low byte.
use core::fmt;
use core::time::Duration;
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use hpilemu_core::codec::{CodecMode, FrameCodec, WireFormat};
use hpilemu_core::frame::Frame;
use hpilemu_core::link::{Link, LinkError, LinkResult};

/// Baud rates supported by the PIL-Box. `0` stands for automatic detection.
pub const BAUD_RATES: [u32; 4] = [0, 9600, 115200, 230400];
/// How long to wait for the acknowledge of a command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
/// How long to wait for a byte of an ordinary frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(50);

const ACK_MASK: u8 = 0x3F;

/// The operating mode the PIL-Box is put into after connecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PilBoxMode {
    /// Controller off: the PIL-Box acts as a loop device (`COFF`).
    ControllerOff,
    /// Controller off, also forwarding `IDY` frames (`COFI`).
    ControllerOffIdy,
    /// No mode command is sent. The adapter stays in the mode set by the baud rate handshake.
    PassThrough,
}

impl Default for PilBoxMode {
    fn default() -> Self {
        PilBoxMode::ControllerOffIdy
    }
}

impl PilBoxMode {
    /// Returns the command frame selecting this mode.
    pub fn command(self) -> Option<Frame> {
        match self {
            PilBoxMode::ControllerOff => Some(Frame::COFF),
            PilBoxMode::ControllerOffIdy => Some(Frame::COFI),
            PilBoxMode::PassThrough => None
        }
    }
}

impl fmt::Display for PilBoxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PilBoxMode::ControllerOff => "COFF",
            PilBoxMode::ControllerOffIdy => "COFI",
            PilBoxMode::PassThrough => "pass-through",
        })
    }
}

/// This trait is being used by [PilBoxLink] to access a serial port.
pub trait SerialPortIo: fmt::Debug + Send {
    /// Should open the port with the given `baud` rate. Opening an open port should only change
    /// its baud rate.
    fn open(&mut self, baud: u32) -> io::Result<()>;
    /// Should close the port.
    fn close(&mut self);
    /// Should wait up to `timeout` for a single byte. Returns `Ok(None)` on timeout.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;
    /// Should write all `bytes` to the port.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Should discard any received and not yet read data.
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<P: SerialPortIo + ?Sized> SerialPortIo for Box<P> {
    fn open(&mut self, baud: u32) -> io::Result<()> {
        (**self).open(baud)
    }
    fn close(&mut self) {
        (**self).close()
    }
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        (**self).read_byte(timeout)
    }
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// The PIL-Box [Link].
///
/// An implementation of [SerialPortIo] should be provided as its `P` type parameter.
#[derive(Debug)]
pub struct PilBoxLink<P> {
    /// Direct access to the underlying serial port.
    pub port: P,
    baud: u32,
    mode: PilBoxMode,
    codec: FrameCodec,
    connected_baud: Option<u32>,
}

impl<P: SerialPortIo> PilBoxLink<P> {
    /// Creates a link using `port`. A `baud` rate of `0` selects automatic detection.
    pub fn new(port: P, baud: u32, mode: PilBoxMode) -> Self {
        PilBoxLink {
            port,
            baud,
            mode,
            codec: FrameCodec::new(WireFormat::PilBox),
            connected_baud: None
        }
    }
    /// Returns the baud rate of the open link.
    #[inline]
    pub fn connected_baud(&self) -> Option<u32> {
        self.connected_baud
    }
    #[inline]
    pub fn mode(&self) -> PilBoxMode {
        self.mode
    }
    /// Sends a command frame to the PIL-Box and waits for its acknowledge.
    pub fn send_command(&mut self, command: Frame) -> LinkResult<()> {
        let mut codec = FrameCodec::new(WireFormat::PilBox);
        codec.set_mode(CodecMode::EightBit);
        let (high, low) = codec.disassemble(command);
        self.port.write_all(&[high, low])?;
        match self.port.read_byte(COMMAND_TIMEOUT)? {
            Some(ack) if ack & ACK_MASK == low & ACK_MASK => Ok(()),
            Some(ack) => {
                Err(LinkError::BadAcknowledge { expected: low & ACK_MASK, received: ack & ACK_MASK })
            }
            None => Err(LinkError::NoAcknowledge)
        }
    }

    fn connect_at(&mut self, baud: u32) -> LinkResult<()> {
        debug!("PIL-Box: trying {} baud", baud);
        self.port.open(baud)?;
        self.port.clear_input()?;
        self.send_command(Frame::COFF)
    }

    fn connect(&mut self) -> LinkResult<u32> {
        if self.baud != 0 {
            self.connect_at(self.baud)?;
            return Ok(self.baud)
        }
        for &baud in BAUD_RATES.iter().rev().filter(|&&b| b != 0) {
            match self.connect_at(baud) {
                Ok(()) => return Ok(baud),
                Err(err) if err.is_acknowledge() => {
                    debug!("PIL-Box: no response at {} baud: {}", baud, err);
                }
                Err(err) => return Err(err)
            }
        }
        Err(LinkError::BaudDetection)
    }
}

impl<P: SerialPortIo> Link for PilBoxLink<P> {
    fn open(&mut self) -> LinkResult<()> {
        self.codec = FrameCodec::new(WireFormat::PilBox);
        let baud = match self.connect() {
            Ok(baud) => baud,
            Err(err) => {
                self.port.close();
                return Err(err)
            }
        };
        if let Some(command) = self.mode.command() {
            if let Err(err) = self.send_command(command) {
                self.port.close();
                return Err(err)
            }
        }
        info!("PIL-Box connected at {} baud, mode {}", baud, self.mode);
        self.connected_baud = Some(baud);
        Ok(())
    }

    fn close(&mut self) -> LinkResult<()> {
        if self.connected_baud.take().is_none() {
            return Ok(())
        }
        let res = self.send_command(Frame::TDIS);
        self.port.close();
        info!("PIL-Box disconnected");
        res
    }

    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        if self.connected_baud.is_none() {
            return Err(LinkError::NotConnected)
        }
        Ok(self.port.read_byte(timeout)?)
    }

    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
        if self.connected_baud.is_none() {
            return Err(LinkError::NotConnected)
        }
        match high {
            Some(high) => self.port.write_all(&[high, low])?,
            None => self.port.write_all(&[low])?
        }
        Ok(())
    }

    #[inline]
    fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    #[inline]
    fn codec_mut(&mut self) -> &mut FrameCodec {
        &mut self.codec
    }

    fn description(&self) -> String {
        format!("PIL-Box {:?}", self.port)
    }
}

#[cfg(feature = "serial")]
mod device {
    use core::fmt;
    use core::time::Duration;
    use std::io::{self, Read, Write};

    use serialport::{ClearBuffer, SerialPort};

    use super::SerialPortIo;

    /// A [SerialPortIo] implementation using the operating system's serial port.
    pub struct SerialPortDevice {
        path: String,
        port: Option<Box<dyn SerialPort>>,
        timeout: Duration,
    }

    impl fmt::Debug for SerialPortDevice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.path)
        }
    }

    impl SerialPortDevice {
        /// Creates a closed port device for the given path, e.g. `/dev/ttyUSB0` or `COM3`.
        pub fn new<S: Into<String>>(path: S) -> Self {
            SerialPortDevice { path: path.into(), port: None, timeout: Duration::from_millis(0) }
        }
        #[inline]
        pub fn path(&self) -> &str {
            &self.path
        }

        fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
            self.port.as_mut().ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
        }
    }

    impl SerialPortIo for SerialPortDevice {
        fn open(&mut self, baud: u32) -> io::Result<()> {
            match self.port.as_mut() {
                Some(port) => port.set_baud_rate(baud)?,
                None => {
                    let port = serialport::new(self.path.as_str(), baud)
                                .timeout(self.timeout)
                                .open()?;
                    self.port = Some(port);
                }
            }
            Ok(())
        }

        fn close(&mut self) {
            self.port = None;
        }

        fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
            if self.timeout != timeout {
                self.port()?.set_timeout(timeout)?;
                self.timeout = timeout;
            }
            let mut buf = [0u8];
            match self.port()?.read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
                Err(e) => Err(e)
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            let port = self.port()?;
            Write::write_all(port, bytes)?;
            port.flush()
        }

        fn clear_input(&mut self) -> io::Result<()> {
            self.port()?.clear(ClearBuffer::Input)?;
            Ok(())
        }
    }
}

#[cfg(feature = "serial")]
pub use device::*;

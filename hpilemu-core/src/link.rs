/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The transport abstraction the loop is pumped through.
use core::fmt;
use core::time::Duration;
use std::error::Error;
use std::io;

use crate::codec::FrameCodec;
use crate::frame::Frame;

/// The acknowledge byte expected by the TCP/IP transport after a changed high byte.
pub const NETWORK_ACK: u8 = 0x0D;

/// Errors reported by [Link] implementations.
///
/// All of them are fatal for the current session.
#[derive(Debug)]
pub enum LinkError {
    /// The underlying channel could not be opened, read or written.
    Io(io::Error),
    /// An acknowledge byte did not arrive in time.
    NoAcknowledge,
    /// An unexpected acknowledge byte arrived.
    BadAcknowledge { expected: u8, received: u8 },
    /// The link was used before it was opened.
    NotConnected,
    /// The peer closed the connection.
    Disconnected,
    /// None of the baud rates was acknowledged by the PIL-Box.
    BaudDetection,
    /// The transport was not compiled in or is not available on this platform.
    Unsupported,
}

/// The result type of [Link] methods.
pub type LinkResult<T> = Result<T, LinkError>;

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Io(err) => err.fmt(f),
            LinkError::NoAcknowledge => f.write_str("no acknowledge received"),
            LinkError::BadAcknowledge { expected, received } => {
                write!(f, "wrong acknowledge: expected {:02X}h, received {:02X}h", expected, received)
            }
            LinkError::NotConnected => f.write_str("link is not open"),
            LinkError::Disconnected => f.write_str("peer disconnected"),
            LinkError::BaudDetection => f.write_str("cannot detect PIL-Box baud rate"),
            LinkError::Unsupported => f.write_str("transport is not supported"),
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LinkError::Io(err) => Some(err),
            _ => None
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(err: io::Error) -> Self {
        LinkError::Io(err)
    }
}

impl LinkError {
    /// Returns `true` for an acknowledge protocol error.
    pub fn is_acknowledge(&self) -> bool {
        matches!(self, LinkError::NoAcknowledge|LinkError::BadAcknowledge {..})
    }
}

/// A duplex byte channel the loop frames travel through.
///
/// The link owns the [FrameCodec] used to assemble the received and disassemble the transmitted
/// frames, so the encoding mode is kept per link.
pub trait Link: fmt::Debug + Send {
    /// Opens the channel and performs any transport specific handshake.
    fn open(&mut self) -> LinkResult<()>;
    /// Closes the channel. Closing a closed link does nothing.
    fn close(&mut self) -> LinkResult<()>;
    /// Waits up to `timeout` for a single received byte.
    ///
    /// Returns `Ok(None)` on timeout.
    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>>;
    /// Transmits a single frame split into its bytes. The `high` byte is `None` if it was
    /// not changed since the previously transmitted frame.
    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()>;
    /// Returns a reference to the frame codec of this link.
    fn codec(&self) -> &FrameCodec;
    /// Returns a mutable reference to the frame codec of this link.
    fn codec_mut(&mut self) -> &mut FrameCodec;
    /// Returns a short description of the link for logs and status messages.
    fn description(&self) -> String {
        format!("{} link", self.codec().format())
    }
    /// Reads bytes until a frame is assembled or `timeout` elapses between bytes.
    fn read_frame(&mut self, timeout: Duration) -> LinkResult<Option<Frame>> {
        while let Some(byte) = self.read_byte(timeout)? {
            if let Some(frame) = self.codec_mut().feed(byte) {
                return Ok(Some(frame))
            }
        }
        Ok(None)
    }
}

impl<L: Link + ?Sized> Link for Box<L> {
    #[inline]
    fn open(&mut self) -> LinkResult<()> {
        (**self).open()
    }
    #[inline]
    fn close(&mut self) -> LinkResult<()> {
        (**self).close()
    }
    #[inline]
    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        (**self).read_byte(timeout)
    }
    #[inline]
    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
        (**self).write_frame(high, low)
    }
    #[inline]
    fn codec(&self) -> &FrameCodec {
        (**self).codec()
    }
    #[inline]
    fn codec_mut(&mut self) -> &mut FrameCodec {
        (**self).codec_mut()
    }
    #[inline]
    fn description(&self) -> String {
        (**self).description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_works() {
        let err = LinkError::BadAcknowledge { expected: 0x0D, received: 0x41 };
        assert!(err.is_acknowledge());
        assert_eq!(err.to_string(), "wrong acknowledge: expected 0Dh, received 41h");
        let err: LinkError = io::Error::new(io::ErrorKind::NotFound, "no such port").into();
        assert!(!err.is_acknowledge());
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "no such port");
    }
}

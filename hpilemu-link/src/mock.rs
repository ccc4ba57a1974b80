/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! In-memory link doubles.
//!
//! [MockLink] replays scripted bytes and records transmitted ones; clones share the same
//! buffers so a test can feed and inspect a link owned by a dispatcher thread.
//! [MockPilBox] is a serial port acknowledging PIL-Box commands at a single baud rate.
use core::time::Duration;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use hpilemu_core::codec::{CodecMode, FrameCodec, WireFormat};
use hpilemu_core::frame::Frame;
use hpilemu_core::link::{Link, LinkError, LinkResult};

use crate::pilbox::SerialPortIo;

const IDLE_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Default)]
struct MockState {
    input: VecDeque<u8>,
    written: Vec<u8>,
    last_high: Option<u8>,
    open: bool,
    open_count: usize,
    hang_up: bool,
}

/// A scripted [Link].
#[derive(Clone, Debug)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    codec: FrameCodec,
}

impl MockLink {
    pub fn new(format: WireFormat) -> Self {
        MockLink { state: Arc::default(), codec: FrameCodec::new(format) }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }

    fn encoder(&self) -> FrameCodec {
        let mut codec = FrameCodec::new(self.codec.format());
        codec.set_mode(CodecMode::EightBit);
        codec
    }
    /// Appends raw bytes to be received.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().input.extend(bytes);
    }
    /// Appends frames to be received, each with its high byte.
    pub fn push_frames(&self, frames: &[Frame]) {
        let codec = self.encoder();
        let mut state = self.lock();
        for &frame in frames {
            let (high, low) = codec.disassemble(frame);
            state.input.push_back(high);
            state.input.push_back(low);
        }
    }
    /// Makes the link report a disconnection once all scripted input has been received.
    pub fn hang_up(&self) {
        self.lock().hang_up = true;
    }
    /// Returns `true` if all scripted input has been received.
    pub fn is_drained(&self) -> bool {
        self.lock().input.is_empty()
    }
    /// Returns all transmitted bytes.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }
    /// Returns all transmitted frames.
    pub fn written_frames(&self) -> Vec<Frame> {
        let mut codec = FrameCodec::new(self.codec.format());
        self.lock().written.iter().filter_map(|&b| codec.feed(b)).collect()
    }
    /// Waits up to `timeout` until at least `count` frames were transmitted.
    /// Returns the transmitted frames.
    pub fn wait_frames(&self, count: usize, timeout: Duration) -> Vec<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            let frames = self.written_frames();
            if frames.len() >= count || Instant::now() >= deadline {
                return frames
            }
            thread::sleep(IDLE_SLEEP);
        }
    }
    #[inline]
    pub fn is_open(&self) -> bool {
        self.lock().open
    }
    /// Returns how many times the link was opened.
    #[inline]
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }
}

impl Link for MockLink {
    fn open(&mut self) -> LinkResult<()> {
        let mut state = self.lock();
        state.open = true;
        state.open_count += 1;
        state.last_high = None;
        Ok(())
    }

    fn close(&mut self) -> LinkResult<()> {
        self.lock().open = false;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        {
            let mut state = self.lock();
            if !state.open {
                return Err(LinkError::NotConnected)
            }
            if let Some(byte) = state.input.pop_front() {
                return Ok(Some(byte))
            }
            if state.hang_up {
                return Err(LinkError::Disconnected)
            }
        }
        thread::sleep(timeout.min(IDLE_SLEEP));
        Ok(None)
    }

    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
        let format = self.codec.format();
        let mut state = self.lock();
        if !state.open {
            return Err(LinkError::NotConnected)
        }
        match (high, format) {
            (Some(high), _) => {
                state.last_high = Some(high);
                state.written.push(high);
            }
            (None, WireFormat::Network) => {
                let high = state.last_high.unwrap_or(0);
                state.written.push(high);
            }
            (None, WireFormat::PilBox) => {}
        }
        state.written.push(low);
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
        format!("mock {} link", self.codec.format())
    }
}

/// A serial port double of a PIL-Box.
///
/// Commands are acknowledged only while the port is open with the configured baud rate.
#[derive(Clone, Debug, Default)]
pub struct MockPilBox {
    ack_baud: Option<u32>,
    baud: Option<u32>,
    attempts: Vec<u32>,
    written: Vec<u8>,
    replies: VecDeque<u8>,
    input: VecDeque<u8>,
    corrupt: Option<u8>,
}

const PILBOX_COMMANDS: [Frame; 3] = [Frame::TDIS, Frame::COFI, Frame::COFF];

impl MockPilBox {
    /// Creates a port acknowledging commands at `ack_baud`, or never if `None`.
    pub fn new(ack_baud: Option<u32>) -> Self {
        MockPilBox { ack_baud, ..MockPilBox::default() }
    }
    /// Makes the command with the given low byte be answered with a wrong acknowledge.
    pub fn corrupt_ack(&mut self, low: u8) {
        self.corrupt = Some(low);
    }
    /// Returns the baud rates the port was opened with.
    pub fn baud_attempts(&self) -> Vec<u32> {
        self.attempts.clone()
    }
    pub fn written(&self) -> Vec<u8> {
        self.written.clone()
    }
    pub fn clear_written(&mut self) {
        self.written.clear();
    }
    /// Appends bytes arriving from the loop.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }
    #[inline]
    pub fn is_open(&self) -> bool {
        self.baud.is_some()
    }

    fn is_command(high: u8, low: u8) -> bool {
        let mut codec = FrameCodec::new(WireFormat::PilBox);
        let frame = codec.assemble(high, low);
        codec.mode() == CodecMode::EightBit && PILBOX_COMMANDS.contains(&frame)
    }
}

impl SerialPortIo for MockPilBox {
    fn open(&mut self, baud: u32) -> io::Result<()> {
        self.attempts.push(baud);
        self.baud = Some(baud);
        Ok(())
    }

    fn close(&mut self) {
        self.baud = None;
        self.replies.clear();
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"))
        }
        Ok(self.replies.pop_front().or_else(|| self.input.pop_front()))
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"))
        }
        self.written.extend_from_slice(bytes);
        if let &[high, low] = bytes {
            if self.baud.is_some() && self.baud == self.ack_baud && MockPilBox::is_command(high, low) {
                let reply = if self.corrupt == Some(low) { low ^ 0x01 } else { low };
                self.replies.push_back(reply);
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.replies.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_link_works() {
        let mut link = MockLink::new(WireFormat::PilBox);
        let probe = link.clone();
        probe.push_frames(&[Frame::IFC, Frame::data_byte(0x41)]);
        probe.hang_up();
        match link.read_byte(IDLE_SLEEP) {
            Err(LinkError::NotConnected) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        link.open().unwrap();
        assert!(probe.is_open());
        assert_eq!(link.read_frame(IDLE_SLEEP).unwrap(), Some(Frame::IFC));
        assert_eq!(link.read_frame(IDLE_SLEEP).unwrap(), Some(Frame::data_byte(0x41)));
        assert!(probe.is_drained());
        match link.read_byte(IDLE_SLEEP) {
            Err(LinkError::Disconnected) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        link.write_frame(Some(0x32), 0x90).unwrap();
        link.write_frame(None, 0x9A).unwrap();
        assert_eq!(probe.written(), vec![0x32, 0x90, 0x9A]);
        assert_eq!(probe.written_frames(), vec![Frame::IFC, Frame::AAU]);
        link.close().unwrap();
        assert!(!probe.is_open());
        assert_eq!(probe.open_count(), 1);
    }

    #[test]
    fn mock_network_link_repeats_high_byte() {
        let mut link = MockLink::new(WireFormat::Network);
        link.open().unwrap();
        link.write_frame(Some(0x01), 0x41).unwrap();
        link.write_frame(None, 0x40).unwrap();
        assert_eq!(link.written(), vec![0x01, 0x41, 0x01, 0x40]);
        assert_eq!(link.written_frames(), vec![Frame::new(0x141), Frame::new(0x140)]);
    }
}

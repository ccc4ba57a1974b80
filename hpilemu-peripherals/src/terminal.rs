/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! A video display and keyboard terminal.
//!
//! Bytes sent to the terminal are written to the display writer. Key presses are queued by
//! the user interface and raise a service request until the controller reads them.
use core::fmt;
use std::collections::VecDeque;
use std::io::Write;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::bus::{DeviceExt, StatusHandle};
use hpilemu_core::frame::Frame;

use crate::queue::{command_queue, QueueReceiver, QueueSender, QUEUE_CAPACITY};

/// The default loop address of a terminal.
pub const DEFAULT_ADDRESS: u8 = 3;
pub const ACCESSORY_ID: u8 = 0x30;

/// Status bit: key presses are waiting to be read.
pub const STATUS_KEYS_PENDING: u8 = 0x01;
/// Status bit: the display could not be written.
pub const STATUS_DISPLAY_ERROR: u8 = 0x80;

/// The terminal device extension. Received text is written to `W`.
#[derive(Debug)]
pub struct Terminal<W> {
    /// Direct access to the underlying display writer.
    pub display: W,
    status: StatusHandle,
    keys: VecDeque<u8>,
    keyboard: Option<QueueReceiver<u8>>,
    display_error: bool,
}

impl<W: Write + Send + fmt::Debug> Terminal<W> {
    pub fn new(display: W) -> Self {
        Terminal {
            display,
            status: StatusHandle::default(),
            keys: VecDeque::new(),
            keyboard: None,
            display_error: false
        }
    }
    /// Creates a terminal together with the sending end of its keyboard queue.
    pub fn with_keyboard(display: W) -> (Self, QueueSender<u8>) {
        let (tx, rx) = command_queue(QUEUE_CAPACITY);
        let mut terminal = Terminal::new(display);
        terminal.keyboard = Some(rx);
        (terminal, tx)
    }
    /// Queues a key press directly. Returns `false` if [QUEUE_CAPACITY] key presses
    /// are already pending.
    pub fn push_key(&mut self, key: u8) -> bool {
        if self.keys.len() >= QUEUE_CAPACITY {
            return false
        }
        self.keys.push_back(key);
        self.update_status();
        true
    }
    /// Returns the number of key presses not yet read by the controller.
    #[inline]
    pub fn pending_keys(&self) -> usize {
        self.keys.len()
    }

    fn update_status(&self) {
        let pending = !self.keys.is_empty();
        let mut byte = 0;
        if pending {
            byte |= STATUS_KEYS_PENDING;
        }
        if self.display_error {
            byte |= STATUS_DISPLAY_ERROR;
        }
        self.status.with(|st| {
            st.set_byte(0, byte);
            st.set_service_request(pending);
        });
    }
}

impl<W: Write + Send + fmt::Debug> DeviceExt for Terminal<W> {
    fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn on_clear(&mut self) {
        self.keys.clear();
        self.display_error = false;
        self.update_status();
    }

    fn on_receive_data(&mut self, frame: Frame) {
        let res = self.display.write_all(&[frame.data()]).and_then(|_| self.display.flush());
        if let Err(err) = res {
            if !self.display_error {
                error!("terminal display: {}", err);
            }
            self.display_error = true;
            self.update_status();
        }
    }

    fn on_send_data(&mut self, frame: Frame) -> Frame {
        let res = match self.keys.pop_front() {
            Some(key) => Frame::data_byte(key),
            None if frame == Frame::SDA => frame,
            None => Frame::EOT
        };
        self.update_status();
        res
    }

    fn on_poll(&mut self) {
        if let Some(keyboard) = self.keyboard.as_ref() {
            let room = QUEUE_CAPACITY.saturating_sub(self.keys.len());
            self.keys.extend(keyboard.drain().take(room));
        }
        if !self.keys.is_empty() && !self.status.service_requested() {
            self.update_status();
        }
    }

    fn accessory_id(&self) -> u8 {
        ACCESSORY_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_works() {
        let (mut terminal, keyboard) = Terminal::with_keyboard(Vec::new());
        assert_eq!(terminal.device_id(), "");
        for &b in b"HI\r\n" {
            terminal.on_receive_data(Frame::data_byte(b));
        }
        assert_eq!(terminal.display, b"HI\r\n");
        assert!(!terminal.status().service_requested());

        keyboard.try_push(b'A').unwrap();
        keyboard.try_push(b'B').unwrap();
        terminal.on_poll();
        assert_eq!(terminal.pending_keys(), 2);
        assert!(terminal.status().service_requested());
        assert_eq!(terminal.status().lock().bytes(), &[STATUS_KEYS_PENDING]);
        // reading the status clears the request, pending keys raise it again
        terminal.status().with(|st| st.clear_service_request());
        assert!(!terminal.status().service_requested());
        terminal.on_poll();
        assert!(terminal.status().service_requested());
        assert!(terminal.push_key(b'C'));
        assert_eq!(terminal.pending_keys(), 3);

        let mut frame = terminal.on_send_data(Frame::SDA);
        let mut keys = Vec::new();
        while frame.is_data() {
            keys.push(frame.data());
            frame = terminal.on_send_data(frame);
        }
        assert_eq!(frame, Frame::EOT);
        assert_eq!(keys, b"ABC");
        assert_eq!(terminal.status().lock().bytes(), &[0]);
        assert!(!terminal.status().service_requested());
        assert_eq!(terminal.on_send_data(Frame::SDA), Frame::SDA);
    }

    #[test]
    fn terminal_keyboard_is_bounded() {
        let (mut terminal, keyboard) = Terminal::with_keyboard(Vec::new());
        let mut rejected = 0;
        for _ in 0..4 {
            for key in 0..QUEUE_CAPACITY {
                if keyboard.try_push(key as u8).is_err() {
                    rejected += 1;
                }
            }
            terminal.on_poll();
            assert!(terminal.pending_keys() <= QUEUE_CAPACITY);
        }
        assert_eq!(terminal.pending_keys(), QUEUE_CAPACITY);
        // the first batch is pending, the second waits in the queue, the rest is rejected
        assert_eq!(rejected, 2 * QUEUE_CAPACITY);
        assert!(!terminal.push_key(b'X'));
        assert_eq!(terminal.on_send_data(Frame::SDA), Frame::data_byte(0));
        terminal.on_poll();
        assert_eq!(terminal.pending_keys(), QUEUE_CAPACITY);
        assert!(keyboard.try_push(b'Y').is_ok());
    }
}

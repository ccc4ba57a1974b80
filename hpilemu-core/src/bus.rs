/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The HP-IL protocol state machine shared by all virtual loop devices.
//!
//! Every frame circulating the loop passes through [BusDevice::process] of each attached device.
//! [LoopDevice] implements the addressing, talker and listener logic common to all peripherals
//! and delegates payload semantics to a [DeviceExt] implementation.
use core::fmt;

use arrayvec::ArrayVec;
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

mod address;
mod state;
mod status;

pub use address::*;
pub use state::*;
pub use status::*;

use crate::frame::{Frame, FrameClass, CommandGroup, UNADDRESS};

/// A loop frame counter value. Incremented once for every frame delivered to the device chain.
pub type FrameTs = u64;

/// The maximum number of bytes sent in response to `SST`, `SDI` or `SAI`.
pub const MAX_OUTPUT_BYTES: usize = 32;

/// An interface of devices attached to the loop.
///
/// Only the dispatcher owning the device may call [BusDevice::process].
pub trait BusDevice: fmt::Debug + Send {
    /// Processes the frame currently circulating the loop and returns the frame to be passed on.
    ///
    /// `timestamp` is the value of the loop frame counter, already incremented for this frame.
    ///
    /// Implementations must not block.
    fn process(&mut self, frame: Frame, timestamp: FrameTs) -> Frame;
    /// Returns `true` if the device requests service.
    fn service_request(&self) -> bool {
        false
    }
    /// Called once per dispatcher iteration, between frames, to let the device drain queues
    /// fed by other threads.
    fn poll(&mut self) {}
    /// Called when the device is attached to a loop whose last address assignment occured
    /// at `addressing_epoch`.
    fn attach(&mut self, _addressing_epoch: FrameTs) {}
    /// Resets the addressing state, e.g. after the link was lost.
    fn reset(&mut self) {}
    /// Returns the current addressing state.
    fn bus_state(&self) -> BusState;
    /// Returns the current loop address.
    fn address(&self) -> DeviceAddress;
}

impl<D: BusDevice + ?Sized> BusDevice for Box<D> {
    #[inline]
    fn process(&mut self, frame: Frame, timestamp: FrameTs) -> Frame {
        (**self).process(frame, timestamp)
    }
    #[inline]
    fn service_request(&self) -> bool {
        (**self).service_request()
    }
    #[inline]
    fn poll(&mut self) {
        (**self).poll()
    }
    #[inline]
    fn attach(&mut self, addressing_epoch: FrameTs) {
        (**self).attach(addressing_epoch)
    }
    #[inline]
    fn reset(&mut self) {
        (**self).reset()
    }
    #[inline]
    fn bus_state(&self) -> BusState {
        (**self).bus_state()
    }
    #[inline]
    fn address(&self) -> DeviceAddress {
        (**self).address()
    }
}

/// Device specific hooks called by [LoopDevice].
///
/// All methods but [DeviceExt::status] have default implementations doing nothing.
pub trait DeviceExt: fmt::Debug + Send {
    /// Should return the handle to the status register of the device.
    fn status(&self) -> &StatusHandle;
    /// Device clear (`DCL`, or `SDC` while listening). Should reset the payload state.
    fn on_clear(&mut self) {}
    /// Commands not handled by the state machine: device dependent `DDL`/`DDT` and
    /// other addressed commands (`GET`, `GTL` ...). `state` is the current addressing state.
    fn on_extended_command(&mut self, _frame: Frame, _state: BusState) {}
    /// Called with `SDA` when the device is the addressed talker, and with every data frame
    /// coming back around the loop while the device is an active talker.
    ///
    /// Should return the next data frame to be sent, `EOT` (or `ETE`) after the last one,
    /// or the given `SDA` frame unmodified if there is no data to be sent.
    fn on_send_data(&mut self, frame: Frame) -> Frame {
        frame
    }
    /// Called with every data frame while the device is the addressed listener.
    fn on_receive_data(&mut self, _frame: Frame) {}
    /// Called when a data transfer is aborted by `NRD` or by a talker echo mismatch.
    fn on_abort(&mut self) {}
    /// Called from [BusDevice::poll].
    fn on_poll(&mut self) {}
    /// The device identification sent in response to `SDI`. An empty string means no `SDI` support.
    fn device_id(&self) -> &str {
        ""
    }
    /// The accessory identification byte sent in response to `SAI`.
    fn accessory_id(&self) -> u8 {
        0
    }
    /// Should return `true` if the device takes part in the extended (`AEP`/`AES`) addressing.
    fn extended_addressing(&self) -> bool {
        false
    }
}

/// The HP-IL state machine of a single virtual device.
///
/// Device specific behaviour is provided by the [DeviceExt] implementation `E`.
#[derive(Clone, Debug)]
pub struct LoopDevice<E> {
    /// The device extension.
    pub ext: E,
    state: BusState,
    address: DeviceAddress,
    default_address: u8,
    epoch: FrameTs,
    output: ArrayVec<u8, MAX_OUTPUT_BYTES>,
    output_cursor: usize,
    last_sent: Option<Frame>,
}

impl<E: DeviceExt> LoopDevice<E> {
    /// Creates a device with the given compiled-in `default_address`.
    pub fn new(ext: E, default_address: u8) -> Self {
        LoopDevice {
            ext,
            state: BusState::Idle,
            address: DeviceAddress::new(default_address),
            default_address: default_address & 0x1F,
            epoch: 0,
            output: ArrayVec::new(),
            output_cursor: 0,
            last_sent: None
        }
    }
    /// Returns the default primary address.
    #[inline]
    pub fn default_address(&self) -> u8 {
        self.default_address
    }
    /// Returns the frame counter value of the last address change.
    #[inline]
    pub fn address_epoch(&self) -> FrameTs {
        self.epoch
    }
    /// Returns the current addressing state.
    #[inline]
    pub fn state(&self) -> BusState {
        self.state
    }

    fn clear_device(&mut self) {
        self.ext.on_clear();
        self.ext.status().with(StatusRegister::clear_service_request);
        self.end_transfer();
        self.state = BusState::Idle;
    }

    fn end_transfer(&mut self) {
        self.output.clear();
        self.output_cursor = 0;
        self.last_sent = None;
        if self.state.is_active_talker() {
            self.state = BusState::AddressedTalker;
        }
    }

    fn do_command(&mut self, frame: Frame, timestamp: FrameTs) -> Frame {
        let operand = frame.operand();
        match CommandGroup::from_data(frame.data()) {
            CommandGroup::Addressed if frame == Frame::SDC => {
                if self.state.is_listener() {
                    self.clear_device();
                }
            }
            CommandGroup::Addressed if frame == Frame::DCL => {
                self.clear_device();
            }
            CommandGroup::Listen => {
                if operand == UNADDRESS {
                    if !self.state.is_talker() {
                        self.state = BusState::Idle;
                    }
                }
                else if self.address.is_primary(operand) {
                    self.end_transfer();
                    self.state = if self.address.is_extended() {
                        BusState::AddressedListenerSecondary
                    }
                    else {
                        BusState::AddressedListener
                    };
                }
            }
            CommandGroup::Talk => {
                if self.address.is_primary(operand) {
                    self.end_transfer();
                    self.state = if self.address.is_extended() {
                        BusState::AddressedTalkerSecondary
                    }
                    else {
                        BusState::AddressedTalker
                    };
                }
                else if self.state.is_talker() || self.state == BusState::AddressedTalkerSecondary {
                    self.end_transfer();
                    self.state = BusState::Idle;
                }
            }
            CommandGroup::Secondary => {
                if self.state.is_awaiting_secondary() {
                    self.state = if self.address.is_secondary(operand) {
                        self.state.promote()
                    }
                    else {
                        BusState::Idle
                    };
                }
            }
            CommandGroup::Universal if frame == Frame::IFC => {
                self.end_transfer();
                self.state = BusState::Idle;
                self.address.unconfigure(self.default_address);
            }
            CommandGroup::Universal if frame == Frame::AAU => {
                self.epoch = timestamp;
                self.address.unconfigure(self.default_address);
            }
            _ => {
                self.ext.on_extended_command(frame, self.state);
            }
        }
        frame
    }

    fn do_ready(&mut self, frame: Frame, timestamp: FrameTs) -> Frame {
        let data = frame.data();
        if data < 0x80 {
            if !self.state.is_talker() {
                return frame
            }
            match frame {
                Frame::NRD => {
                    if self.state.is_active_talker() {
                        self.ext.on_abort();
                    }
                    self.end_transfer();
                    frame
                }
                Frame::SDA => {
                    self.end_transfer();
                    let out = self.ext.on_send_data(frame);
                    if out != frame {
                        self.state = BusState::ActiveTalkerData;
                        self.track_output(out)
                    }
                    else {
                        frame
                    }
                }
                Frame::SST => {
                    let status = self.ext.status().with(|st| {
                        let bytes = st.snapshot();
                        st.clear_service_request();
                        bytes
                    });
                    self.start_output(frame, &status)
                }
                Frame::SDI => {
                    let mut id = ArrayVec::<u8, MAX_OUTPUT_BYTES>::new();
                    for &b in self.ext.device_id().as_bytes().iter().take(MAX_OUTPUT_BYTES - 2) {
                        id.push(b);
                    }
                    if id.is_empty() {
                        return frame
                    }
                    id.push(b'\r');
                    id.push(b'\n');
                    self.start_output(frame, &id)
                }
                Frame::SAI => {
                    let accessory = self.ext.accessory_id();
                    self.start_output(frame, &[accessory])
                }
                _ => frame
            }
        }
        else {
            let operand = frame.operand();
            let claimed = match data & 0xE0 {
                0x80 => self.address.claim_primary(operand),
                0xA0 if self.ext.extended_addressing() => self.address.claim_primary(operand),
                0xC0 if self.ext.extended_addressing() && self.address.primary_assigned => {
                    self.address.claim_secondary(operand)
                }
                _ => false
            };
            if claimed {
                self.epoch = timestamp;
                debug!("claimed {}", frame);
                frame.increment()
            }
            else {
                frame
            }
        }
    }

    fn do_data(&mut self, frame: Frame) -> Frame {
        match self.state {
            BusState::AddressedListener => {
                self.ext.on_receive_data(frame);
                frame
            }
            BusState::ActiveTalkerData|BusState::ActiveTalkerStatus => {
                if let Some(sent) = self.last_sent {
                    if !sent.matches(frame) {
                        warn!("talker echo mismatch: sent {} received {}", sent, frame);
                        if self.state == BusState::ActiveTalkerData {
                            self.ext.on_abort();
                        }
                        self.end_transfer();
                        return Frame::ETE
                    }
                }
                let out = if self.state == BusState::ActiveTalkerStatus {
                    self.next_output_byte()
                }
                else {
                    self.ext.on_send_data(frame)
                };
                self.track_output(out)
            }
            _ => frame
        }
    }

    fn start_output(&mut self, frame: Frame, bytes: &[u8]) -> Frame {
        self.end_transfer();
        self.output.try_extend_from_slice(bytes).unwrap_or(());
        if self.output.is_empty() {
            return frame
        }
        self.state = BusState::ActiveTalkerStatus;
        let out = self.next_output_byte();
        self.track_output(out)
    }

    fn next_output_byte(&mut self) -> Frame {
        match self.output.get(self.output_cursor) {
            Some(&byte) => {
                self.output_cursor += 1;
                Frame::data_byte(byte)
            }
            None => Frame::EOT
        }
    }

    fn track_output(&mut self, out: Frame) -> Frame {
        if out.is_data() {
            self.last_sent = Some(out);
        }
        else {
            self.end_transfer();
        }
        out
    }
}

impl<E: DeviceExt> BusDevice for LoopDevice<E> {
    fn process(&mut self, frame: Frame, timestamp: FrameTs) -> Frame {
        match frame.class() {
            FrameClass::DataOrEnd => self.do_data(frame),
            FrameClass::Command => self.do_command(frame, timestamp),
            FrameClass::Ready => self.do_ready(frame, timestamp),
            FrameClass::Identify => frame
        }
    }
    #[inline]
    fn service_request(&self) -> bool {
        self.ext.status().service_requested()
    }
    #[inline]
    fn poll(&mut self) {
        self.ext.on_poll()
    }
    fn attach(&mut self, addressing_epoch: FrameTs) {
        if self.epoch < addressing_epoch {
            debug!("address epoch {} is stale ({}), dropping address", self.epoch, addressing_epoch);
            self.address.unassign();
            self.epoch = addressing_epoch;
        }
        self.end_transfer();
        self.state = BusState::Idle;
    }
    fn reset(&mut self) {
        self.end_transfer();
        self.state = BusState::Idle;
    }
    #[inline]
    fn bus_state(&self) -> BusState {
        self.state
    }
    #[inline]
    fn address(&self) -> DeviceAddress {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct TestExt {
        status: StatusHandle,
        received: Vec<u8>,
        outbound: VecDeque<u8>,
        commands: Vec<(Frame, BusState)>,
        cleared: usize,
        aborted: usize,
    }

    impl DeviceExt for TestExt {
        fn status(&self) -> &StatusHandle {
            &self.status
        }
        fn on_clear(&mut self) {
            self.cleared += 1;
            self.received.clear();
        }
        fn on_extended_command(&mut self, frame: Frame, state: BusState) {
            self.commands.push((frame, state));
        }
        fn on_send_data(&mut self, frame: Frame) -> Frame {
            match self.outbound.pop_front() {
                Some(byte) => Frame::data_byte(byte),
                None if frame == Frame::SDA => frame,
                None => Frame::EOT
            }
        }
        fn on_receive_data(&mut self, frame: Frame) {
            self.received.push(frame.data());
        }
        fn on_abort(&mut self) {
            self.aborted += 1;
            self.outbound.clear();
        }
        fn device_id(&self) -> &str {
            "TEST"
        }
        fn accessory_id(&self) -> u8 {
            0x7A
        }
        fn extended_addressing(&self) -> bool {
            true
        }
    }

    fn addressed(default: u8) -> LoopDevice<TestExt> {
        let mut dev = LoopDevice::new(TestExt::default(), default);
        assert_eq!(dev.process(Frame::AAU, 1), Frame::AAU);
        assert_eq!(dev.process(Frame::auto_address(default), 2), Frame::auto_address(default + 1));
        dev
    }

    #[test]
    fn listener_addressing_works() {
        let mut dev = addressed(2);
        assert_eq!(dev.state(), BusState::Idle);
        dev.process(Frame::listen(2), 3);
        assert_eq!(dev.state(), BusState::AddressedListener);
        assert_eq!(dev.process(Frame::data_byte(0x41), 4), Frame::data_byte(0x41));
        dev.process(Frame::end_byte(0x42), 5);
        assert_eq!(dev.ext.received, b"AB");
        dev.process(Frame::UNL, 6);
        assert_eq!(dev.state(), BusState::Idle);
        dev.process(Frame::data_byte(0x43), 7);
        assert_eq!(dev.ext.received, b"AB");
        dev.process(Frame::listen(3), 8);
        assert_eq!(dev.state(), BusState::Idle);
    }

    #[test]
    fn talker_addressing_works() {
        let mut dev = addressed(4);
        dev.process(Frame::talk(4), 3);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        // UNL doesn't affect talkers
        dev.process(Frame::UNL, 4);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        dev.process(Frame::talk(5), 5);
        assert_eq!(dev.state(), BusState::Idle);
        dev.process(Frame::talk(4), 6);
        dev.process(Frame::UNT, 7);
        assert_eq!(dev.state(), BusState::Idle);
        // an unassigned device doesn't respond to its default address
        let mut dev = LoopDevice::new(TestExt::default(), 4);
        dev.process(Frame::talk(4), 1);
        assert_eq!(dev.state(), BusState::Idle);
    }

    #[test]
    fn ifc_resets_state_and_address() {
        let mut dev = addressed(2);
        dev.process(Frame::listen(2), 3);
        dev.process(Frame::IFC, 4);
        assert_eq!(dev.state(), BusState::Idle);
        let addr = dev.address();
        assert!(!addr.primary_assigned);
        assert!(!addr.secondary_assigned);
        assert_eq!(addr.primary, 2);
    }

    #[test]
    fn auto_addressing_works() {
        let mut dev = LoopDevice::new(TestExt::default(), 2);
        assert_eq!(dev.process(Frame::AAU, 10), Frame::AAU);
        assert_eq!(dev.address_epoch(), 10);
        assert_eq!(dev.process(Frame::new(0x582), 11).raw(), 0x583);
        assert_eq!(dev.address(), DeviceAddress {
            primary: 2, primary_assigned: true, secondary: 0, secondary_assigned: false
        });
        assert_eq!(dev.address_epoch(), 11);
        // first writer wins
        assert_eq!(dev.process(Frame::auto_address(7), 12), Frame::auto_address(7));
        assert_eq!(dev.address().primary, 2);
        // AAD 31 is never claimed
        let mut dev = LoopDevice::new(TestExt::default(), 2);
        assert_eq!(dev.process(Frame::auto_address(31), 1), Frame::auto_address(31));
        assert!(!dev.address().primary_assigned);
    }

    #[test]
    fn secondary_addressing_works() {
        let mut dev = LoopDevice::new(TestExt::default(), 1);
        dev.process(Frame::AAU, 1);
        assert_eq!(dev.process(Frame::auto_extended_primary(1), 2), Frame::auto_extended_primary(2));
        assert_eq!(dev.process(Frame::auto_extended_secondary(3), 3), Frame::auto_extended_secondary(4));
        assert_eq!(dev.process(Frame::auto_extended_secondary(4), 4), Frame::auto_extended_secondary(4));
        dev.process(Frame::listen(1), 5);
        assert_eq!(dev.state(), BusState::AddressedListenerSecondary);
        dev.process(Frame::data_byte(0x20), 6);
        assert!(dev.ext.received.is_empty());
        dev.process(Frame::secondary(3), 7);
        assert_eq!(dev.state(), BusState::AddressedListener);
        dev.process(Frame::talk(1), 8);
        assert_eq!(dev.state(), BusState::AddressedTalkerSecondary);
        dev.process(Frame::secondary(2), 9);
        assert_eq!(dev.state(), BusState::Idle);
    }

    #[test]
    fn data_transfer_works() {
        let mut dev = addressed(2);
        dev.process(Frame::talk(2), 3);
        // nothing to send
        assert_eq!(dev.process(Frame::SDA, 4), Frame::SDA);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        dev.ext.outbound.extend(b"HI");
        assert_eq!(dev.process(Frame::SDA, 5), Frame::data_byte(b'H'));
        assert_eq!(dev.state(), BusState::ActiveTalkerData);
        // the echo may come back with SRQ set
        assert_eq!(dev.process(Frame::data_byte(b'H').with_service_request(), 6), Frame::data_byte(b'I'));
        assert_eq!(dev.process(Frame::data_byte(b'I'), 7), Frame::EOT);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        // data passing by an addressed talker is left alone
        assert_eq!(dev.process(Frame::data_byte(b'X'), 8), Frame::data_byte(b'X'));
    }

    #[test]
    fn talker_echo_mismatch_terminates() {
        let mut dev = addressed(2);
        dev.process(Frame::talk(2), 3);
        dev.ext.outbound.extend(b"ABC");
        assert_eq!(dev.process(Frame::SDA, 4), Frame::data_byte(b'A'));
        assert_eq!(dev.process(Frame::data_byte(b'Z'), 5), Frame::ETE);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        assert_eq!(dev.ext.aborted, 1);
    }

    #[test]
    fn nrd_aborts_transfer() {
        let mut dev = addressed(2);
        dev.process(Frame::talk(2), 3);
        dev.ext.outbound.extend(b"ABC");
        dev.process(Frame::SDA, 4);
        assert_eq!(dev.process(Frame::NRD, 5), Frame::NRD);
        assert_eq!(dev.state(), BusState::AddressedTalker);
        assert_eq!(dev.ext.aborted, 1);
        assert_eq!(dev.process(Frame::SDA, 6), Frame::SDA);
    }

    #[test]
    fn status_and_identification_work() {
        let mut dev = addressed(2);
        dev.ext.status.with(|st| {
            st.set_bytes(&[0x01, 0x02]);
            st.request_service();
        });
        // not a talker: SST passes by
        assert_eq!(dev.process(Frame::SST, 3), Frame::SST);
        dev.process(Frame::talk(2), 4);
        assert_eq!(dev.process(Frame::SST, 5), Frame::data_byte(0x41));
        assert!(!dev.service_request());
        assert_eq!(dev.state(), BusState::ActiveTalkerStatus);
        assert_eq!(dev.process(Frame::data_byte(0x41), 6), Frame::data_byte(0x02));
        assert_eq!(dev.process(Frame::data_byte(0x02), 7), Frame::EOT);
        assert_eq!(dev.state(), BusState::AddressedTalker);

        let mut id = Vec::new();
        let mut frame = dev.process(Frame::SDI, 8);
        while frame.is_data() {
            id.push(frame.data());
            frame = dev.process(frame, 9);
        }
        assert_eq!(frame, Frame::EOT);
        assert_eq!(id, b"TEST\r\n");

        assert_eq!(dev.process(Frame::SAI, 10), Frame::data_byte(0x7A));
        assert_eq!(dev.process(Frame::data_byte(0x7A), 11), Frame::EOT);
    }

    #[test]
    fn device_clear_works() {
        let mut dev = addressed(2);
        dev.ext.status.with(StatusRegister::request_service);
        dev.process(Frame::listen(2), 3);
        dev.process(Frame::data_byte(1), 4);
        dev.process(Frame::SDC, 5);
        assert_eq!(dev.ext.cleared, 1);
        assert!(dev.ext.received.is_empty());
        assert!(!dev.service_request());
        assert_eq!(dev.state(), BusState::Idle);
        // SDC is ignored when not listening
        dev.process(Frame::SDC, 6);
        assert_eq!(dev.ext.cleared, 1);
        dev.process(Frame::DCL, 7);
        assert_eq!(dev.ext.cleared, 2);
    }

    #[test]
    fn extended_commands_are_delegated() {
        let mut dev = addressed(2);
        dev.process(Frame::listen(2), 3);
        dev.process(Frame::device_listen(4), 4);
        dev.process(Frame::GET, 5);
        assert_eq!(dev.ext.commands, vec![
            (Frame::device_listen(4), BusState::AddressedListener),
            (Frame::GET, BusState::AddressedListener)
        ]);
    }

    #[test]
    fn stale_epoch_drops_address() {
        let mut dev = addressed(2);
        assert!(dev.address().primary_assigned);
        dev.attach(2);
        assert!(dev.address().primary_assigned);
        dev.attach(100);
        assert!(!dev.address().primary_assigned);
        assert_eq!(dev.address_epoch(), 100);
        assert_eq!(dev.process(Frame::auto_address(3), 101), Frame::auto_address(4));
    }
}

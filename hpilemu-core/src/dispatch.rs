/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The frame pump threading every received frame through the attached devices.
use core::fmt;
use core::time::Duration;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use crate::bus::{BusDevice, FrameTs};
use crate::frame::Frame;
use crate::link::{Link, LinkResult};

/// The default time a dispatcher waits for a single byte before it checks for pause and finish requests.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// The capacity of the attach and detach request queue.
pub const REQUEST_QUEUE_SIZE: usize = 16;

/// A boxed dynamic loop device.
pub type BoxBusDevice = Box<dyn BusDevice>;

/// A device attached to the loop together with its display name.
#[derive(Debug)]
pub struct DeviceRegistration {
    pub name: String,
    pub device: BoxBusDevice,
}

/// An ordered list of devices every frame passes through.
///
/// The order is significant: during auto-addressing the first device in the list claims
/// the first offered address.
#[derive(Debug, Default)]
pub struct LoopChain {
    devices: Vec<DeviceRegistration>,
    idy_frames: bool,
}

/// Requests sent to a running [Dispatcher] from other threads.
#[derive(Debug)]
pub enum LoopRequest {
    Attach(DeviceRegistration),
    Detach(String),
}

#[derive(Debug, Default)]
struct ControlState {
    pause_requested: bool,
    paused: bool,
    finish: bool,
    running: bool,
}

/// Cooperative pause, resume and finish control of a dispatcher loop.
///
/// The worker calls [LoopControl::checkpoint] once per iteration, other threads call
/// [LoopControl::pause], [LoopControl::resume] and [LoopControl::finish].
#[derive(Debug, Default)]
pub struct LoopControl {
    state: Mutex<ControlState>,
    cond: Condvar,
}

/// A handle to a [Dispatcher] running on another thread.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    control: Arc<LoopControl>,
    requests: SyncSender<LoopRequest>,
}

/// Pumps frames between a [Link] and a [LoopChain].
pub struct Dispatcher<L> {
    link: L,
    chain: LoopChain,
    control: Arc<LoopControl>,
    requests: Receiver<LoopRequest>,
    sender: SyncSender<LoopRequest>,
    read_timeout: Duration,
    clock: FrameTs,
    addressing_epoch: FrameTs,
    last_high: Option<u8>,
}

impl DeviceRegistration {
    pub fn new<S: Into<String>, D: BusDevice + 'static>(name: S, device: D) -> Self {
        DeviceRegistration { name: name.into(), device: Box::new(device) }
    }
}

impl fmt::Display for DeviceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.device.address();
        write!(f, "{}: {}", self.name, self.device.bus_state())?;
        if address.primary_assigned {
            write!(f, " @{}", address.primary)?;
            if address.secondary_assigned {
                write!(f, ".{}", address.secondary)?;
            }
        }
        Ok(())
    }
}

impl LoopChain {
    /// Creates an empty chain. If `idy_frames` is `true` service requests are also signalled
    /// in `IDY` frames.
    pub fn new(idy_frames: bool) -> Self {
        LoopChain { devices: Vec::new(), idy_frames }
    }
    #[inline]
    pub fn idy_frames(&self) -> bool {
        self.idy_frames
    }
    #[inline]
    pub fn set_idy_frames(&mut self, idy_frames: bool) {
        self.idy_frames = idy_frames;
    }
    /// Returns the number of attached devices.
    #[inline]
    pub fn len(&self) -> usize {
        self.devices.len()
    }
    /// Returns `true` if there are no devices in the chain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
    /// Appends a device at the end of the chain, informing it about the loop's `addressing_epoch`.
    /// Returns its index position in the chain.
    pub fn append(&mut self, mut registration: DeviceRegistration, addressing_epoch: FrameTs) -> usize {
        registration.device.attach(addressing_epoch);
        info!("attached {}", registration.name);
        self.devices.push(registration);
        self.devices.len() - 1
    }
    /// Removes the first device with the given `name` from the chain and returns it.
    pub fn remove(&mut self, name: &str) -> Option<DeviceRegistration> {
        let index = self.position(name)?;
        let registration = self.devices.remove(index);
        info!("detached {}", registration.name);
        Some(registration)
    }
    /// Returns the index of the first device with the given `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|reg| reg.name == name)
    }
    /// Returns a reference to the registration at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&DeviceRegistration> {
        self.devices.get(index)
    }
    /// Returns a mutable reference to the registration at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut DeviceRegistration> {
        self.devices.get_mut(index)
    }
    /// Returns an iterator over the attached devices in the loop order.
    pub fn iter(&self) -> impl Iterator<Item=&DeviceRegistration> {
        self.devices.iter()
    }
    /// Passes the `frame` through every device in the loop order and returns the resulting frame.
    ///
    /// The service request bit is set in data frames (and in `IDY` frames if enabled) leaving
    /// a device requesting service.
    pub fn process(&mut self, mut frame: Frame, timestamp: FrameTs) -> Frame {
        for reg in self.devices.iter_mut() {
            frame = reg.device.process(frame, timestamp);
            if reg.device.service_request() && (frame.is_data() || (frame.is_identify() && self.idy_frames)) {
                frame = frame.with_service_request();
            }
        }
        frame
    }
    /// Lets every device drain its inbound queues.
    pub fn poll(&mut self) {
        for reg in self.devices.iter_mut() {
            reg.device.poll();
        }
    }
    /// Resets the addressing state of every device.
    pub fn reset_all(&mut self) {
        for reg in self.devices.iter_mut() {
            reg.device.reset();
        }
    }
}

impl LoopControl {
    pub fn new() -> Self {
        LoopControl::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, ControlState>) -> MutexGuard<'a, ControlState> {
        match self.cond.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }
    /// Called by the worker at the top of each loop iteration.
    ///
    /// Blocks while the loop is paused. Returns `false` if the loop should finish.
    pub fn checkpoint(&self) -> bool {
        let mut state = self.lock();
        if state.pause_requested && !state.finish {
            debug!("loop paused");
            state.paused = true;
            self.cond.notify_all();
            while state.pause_requested && !state.finish {
                state = self.wait(state);
            }
            state.paused = false;
            self.cond.notify_all();
            debug!("loop resumed");
        }
        !state.finish
    }
    /// Requests the loop to pause and blocks until the worker has paused.
    ///
    /// Returns immediately if the loop is not running or is finishing.
    pub fn pause(&self) {
        let mut state = self.lock();
        if !state.running || state.finish {
            return
        }
        state.pause_requested = true;
        while !state.paused && state.running && !state.finish {
            state = self.wait(state);
        }
    }
    /// Resumes the paused loop. Calling it on a running loop does nothing.
    pub fn resume(&self) {
        let mut state = self.lock();
        state.pause_requested = false;
        self.cond.notify_all();
    }
    /// Requests the loop to finish. Wakes up a paused worker.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.finish = true;
        self.cond.notify_all();
    }
    /// Returns `true` if the worker is currently paused.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }
    /// Returns `true` if finish was requested.
    pub fn is_finishing(&self) -> bool {
        self.lock().finish
    }
    /// Returns `true` while the worker is inside [Dispatcher::run].
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Marks the loop as running or stopped.
    ///
    /// [Dispatcher::run] does this itself. A thread spawning the worker should mark the loop
    /// running before it spawns, so a pause requested in the meantime waits for the worker.
    /// Stopping also cancels a pending pause request.
    pub fn set_running(&self, running: bool) {
        let mut state = self.lock();
        state.running = running;
        if !running {
            state.paused = false;
            state.pause_requested = false;
        }
        self.cond.notify_all();
    }
}

impl DispatcherHandle {
    /// Requests a device to be attached at the end of the loop. Returns `false` if the dispatcher
    /// is gone or its request queue is full.
    pub fn attach(&self, registration: DeviceRegistration) -> bool {
        self.request(LoopRequest::Attach(registration))
    }
    /// Requests the named device to be detached.
    pub fn detach<S: Into<String>>(&self, name: S) -> bool {
        self.request(LoopRequest::Detach(name.into()))
    }

    fn request(&self, request: LoopRequest) -> bool {
        match self.requests.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(req)) => {
                warn!("loop request queue full, dropped: {:?}", req);
                false
            }
            Err(TrySendError::Disconnected(..)) => false
        }
    }
    /// See [LoopControl::pause].
    pub fn pause(&self) {
        self.control.pause()
    }
    /// See [LoopControl::resume].
    pub fn resume(&self) {
        self.control.resume()
    }
    /// See [LoopControl::finish].
    pub fn finish(&self) {
        self.control.finish()
    }
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }
    #[inline]
    pub fn control(&self) -> &Arc<LoopControl> {
        &self.control
    }
}

/// Keeps the loop marked as running, also when the worker unwinds.
struct Running(Arc<LoopControl>);

impl Running {
    fn new(control: Arc<LoopControl>) -> Self {
        control.set_running(true);
        Running(control)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.0.set_running(false);
    }
}

impl<L: Link> fmt::Debug for Dispatcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("link", &self.link)
            .field("chain", &self.chain)
            .field("clock", &self.clock)
            .field("addressing_epoch", &self.addressing_epoch)
            .finish()
    }
}

impl<L: Link> Dispatcher<L> {
    /// Creates a dispatcher pumping frames through the given `link`.
    pub fn new(link: L, idy_frames: bool) -> Self {
        let (sender, requests) = sync_channel(REQUEST_QUEUE_SIZE);
        Dispatcher {
            link,
            chain: LoopChain::new(idy_frames),
            control: Arc::new(LoopControl::new()),
            requests,
            sender,
            read_timeout: DEFAULT_READ_TIMEOUT,
            clock: 0,
            addressing_epoch: 0,
            last_high: None
        }
    }
    /// Changes the time the dispatcher waits for a single byte. This bounds the latency
    /// of pause and finish requests.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }
    /// Returns a handle for controlling the dispatcher from another thread.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle { control: Arc::clone(&self.control), requests: self.sender.clone() }
    }
    /// Attaches a device at the end of the loop.
    pub fn attach<S: Into<String>, D: BusDevice + 'static>(&mut self, name: S, device: D) -> usize {
        self.chain.append(DeviceRegistration::new(name, device), self.addressing_epoch)
    }
    /// Detaches the named device.
    pub fn detach(&mut self, name: &str) -> Option<DeviceRegistration> {
        self.chain.remove(name)
    }
    #[inline]
    pub fn chain(&self) -> &LoopChain {
        &self.chain
    }
    #[inline]
    pub fn chain_mut(&mut self) -> &mut LoopChain {
        &mut self.chain
    }
    #[inline]
    pub fn link(&self) -> &L {
        &self.link
    }
    #[inline]
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
    /// Returns the number of frames delivered to the device chain so far.
    #[inline]
    pub fn clock(&self) -> FrameTs {
        self.clock
    }
    /// Returns the value of the frame counter at the last `AAU` frame.
    #[inline]
    pub fn addressing_epoch(&self) -> FrameTs {
        self.addressing_epoch
    }
    /// Opens the link and pumps frames until finish is requested or an error occurs.
    ///
    /// On exit every device is reset and the link is closed.
    pub fn run(&mut self) -> LinkResult<()> {
        let _running = Running::new(Arc::clone(&self.control));
        let res = self.link.open().and_then(|_| {
            info!("{} open", self.link.description());
            self.pump()
        });
        if let Err(err) = &res {
            error!("{}: {}", self.link.description(), err);
        }
        self.chain.reset_all();
        if let Err(err) = self.link.close() {
            warn!("closing {}: {}", self.link.description(), err);
        }
        res
    }

    fn pump(&mut self) -> LinkResult<()> {
        self.last_high = None;
        self.link.codec_mut().reset();
        while self.control.checkpoint() {
            self.apply_requests();
            self.chain.poll();
            if let Some(byte) = self.link.read_byte(self.read_timeout)? {
                if let Some(frame) = self.link.codec_mut().feed(byte) {
                    self.dispatch(frame)?;
                }
            }
        }
        Ok(())
    }
    /// Applies pending attach and detach requests.
    pub fn apply_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                LoopRequest::Attach(registration) => {
                    self.chain.append(registration, self.addressing_epoch);
                }
                LoopRequest::Detach(name) => {
                    if self.chain.remove(&name).is_none() {
                        warn!("no device named {} to detach", name);
                    }
                }
            }
        }
    }
    /// Delivers a single received `frame` to the device chain and transmits the result.
    ///
    /// Returns the transmitted frame.
    pub fn dispatch(&mut self, frame: Frame) -> LinkResult<Frame> {
        self.clock += 1;
        if frame == Frame::AAU {
            self.addressing_epoch = self.clock;
        }
        let out = self.chain.process(frame, self.clock);
        if frame.is_command() {
            self.chain.process(Frame::RFC, self.clock);
        }
        trace!("{:>6} {} -> {}", self.clock, frame, out);
        self.send(out)?;
        Ok(out)
    }

    fn send(&mut self, frame: Frame) -> LinkResult<()> {
        let (high, low) = self.link.codec().disassemble(frame);
        let high = if self.last_high == Some(high) {
            None
        }
        else {
            self.last_high = Some(high);
            Some(high)
        };
        self.link.write_frame(high, low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use crate::bus::*;
    use crate::codec::{FrameCodec, WireFormat};
    use crate::link::LinkError;

    #[derive(Debug)]
    struct TestLink {
        codec: FrameCodec,
        input: VecDeque<u8>,
        written: Vec<(Option<u8>, u8)>,
        open: bool,
    }

    impl TestLink {
        fn new(frames: &[Frame]) -> Self {
            let mut input = VecDeque::new();
            for &frame in frames {
                let [high, low] = frame.raw().to_be_bytes();
                input.push_back(high);
                input.push_back(low);
            }
            TestLink { codec: FrameCodec::new(WireFormat::Network), input, written: Vec::new(), open: false }
        }
    }

    impl Link for TestLink {
        fn open(&mut self) -> LinkResult<()> {
            self.open = true;
            Ok(())
        }
        fn close(&mut self) -> LinkResult<()> {
            self.open = false;
            Ok(())
        }
        fn read_byte(&mut self, _timeout: Duration) -> LinkResult<Option<u8>> {
            self.input.pop_front().map(Some).ok_or(LinkError::Disconnected)
        }
        fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
            self.written.push((high, low));
            Ok(())
        }
        fn codec(&self) -> &FrameCodec {
            &self.codec
        }
        fn codec_mut(&mut self) -> &mut FrameCodec {
            &mut self.codec
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<(Frame, FrameTs)>>>,
        srq: bool,
        resets: Arc<AtomicUsize>,
    }

    impl BusDevice for Recorder {
        fn process(&mut self, frame: Frame, timestamp: FrameTs) -> Frame {
            self.frames.lock().unwrap().push((frame, timestamp));
            frame
        }
        fn service_request(&self) -> bool {
            self.srq
        }
        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
        fn bus_state(&self) -> BusState {
            BusState::Idle
        }
        fn address(&self) -> DeviceAddress {
            DeviceAddress::default()
        }
    }

    #[derive(Debug, Default)]
    struct Plain(StatusHandle);

    impl DeviceExt for Plain {
        fn status(&self) -> &StatusHandle {
            &self.0
        }
    }

    #[test]
    fn dispatch_counts_frames_and_sends_rfc() {
        let mut disp = Dispatcher::new(TestLink::new(&[]), false);
        let rec = Recorder::default();
        let frames = Arc::clone(&rec.frames);
        disp.attach("rec", rec);
        assert_eq!(disp.dispatch(Frame::listen(1)).unwrap(), Frame::listen(1));
        assert_eq!(disp.dispatch(Frame::data_byte(0x41)).unwrap(), Frame::data_byte(0x41));
        assert_eq!(disp.dispatch(Frame::AAU).unwrap(), Frame::AAU);
        assert_eq!(disp.clock(), 3);
        assert_eq!(disp.addressing_epoch(), 3);
        assert_eq!(*frames.lock().unwrap(), vec![
            (Frame::listen(1), 1), (Frame::RFC, 1),
            (Frame::data_byte(0x41), 2),
            (Frame::AAU, 3), (Frame::RFC, 3)
        ]);
        let written = &disp.link().written;
        assert_eq!(written[0], (Some(0x04), 0x21));
        assert_eq!(written[1], (Some(0x00), 0x41));
        assert_eq!(written[2], (Some(0x04), 0x9A));
    }

    #[test]
    fn unchanged_high_byte_is_skipped() {
        let mut disp = Dispatcher::new(TestLink::new(&[]), false);
        disp.dispatch(Frame::data_byte(0x40)).unwrap();
        disp.dispatch(Frame::new(0x140)).unwrap();
        disp.dispatch(Frame::new(0x141)).unwrap();
        assert_eq!(disp.link().written, vec![(Some(0x00), 0x40), (Some(0x01), 0x40), (None, 0x41)]);
    }

    #[test]
    fn service_request_overlay_works() {
        let mut disp = Dispatcher::new(TestLink::new(&[]), false);
        disp.attach("rec", Recorder { srq: true, ..Recorder::default() });
        assert_eq!(disp.dispatch(Frame::data_byte(1)).unwrap(), Frame::new(0x101));
        assert_eq!(disp.dispatch(Frame::IDY).unwrap(), Frame::IDY);
        assert_eq!(disp.dispatch(Frame::SDA).unwrap(), Frame::SDA);
        assert_eq!(disp.dispatch(Frame::UNL).unwrap(), Frame::UNL);
        disp.chain_mut().set_idy_frames(true);
        assert_eq!(disp.dispatch(Frame::IDY).unwrap(), Frame::new(0x700));
    }

    #[test]
    fn loop_auto_addressing_works() {
        let mut disp = Dispatcher::new(TestLink::new(&[]), false);
        disp.attach("a", LoopDevice::new(Plain::default(), 2));
        disp.attach("b", LoopDevice::new(Plain::default(), 5));
        disp.dispatch(Frame::AAU).unwrap();
        for reg in disp.chain().iter() {
            assert!(!reg.device.address().primary_assigned);
        }
        assert_eq!(disp.chain().get(0).unwrap().device.address().primary, 2);
        assert_eq!(disp.chain().get(1).unwrap().device.address().primary, 5);
        assert_eq!(disp.dispatch(Frame::auto_address(1)).unwrap(), Frame::auto_address(3));
        assert_eq!(disp.chain().get(0).unwrap().device.address().primary, 1);
        assert_eq!(disp.chain().get(1).unwrap().device.address().primary, 2);
        assert_eq!(disp.chain().get(1).unwrap().to_string(), "b: idle @2");
        // a device attached later with a stale address drops it
        let mut late = LoopDevice::new(Plain::default(), 7);
        late.process(Frame::auto_address(7), 0);
        assert!(late.address().primary_assigned);
        disp.attach("late", late);
        assert!(!disp.chain().get(2).unwrap().device.address().primary_assigned);
        assert!(disp.detach("a").is_some());
        assert!(disp.detach("a").is_none());
        assert_eq!(disp.chain().len(), 2);
    }

    #[test]
    fn run_pumps_until_link_error() {
        let link = TestLink::new(&[Frame::listen(1), Frame::data_byte(0x33)]);
        let mut disp = Dispatcher::new(link, false);
        let handle = disp.handle();
        let rec = Recorder::default();
        let resets = Arc::clone(&rec.resets);
        assert!(handle.attach(DeviceRegistration::new("rec", rec)));
        match disp.run() {
            Err(LinkError::Disconnected) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        assert!(!disp.link().open);
        assert_eq!(disp.clock(), 2);
        assert_eq!(disp.link().written.len(), 2);
        assert_eq!(disp.chain().len(), 1);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert!(!disp.control.is_running());
    }

    #[test]
    fn link_loss_resets_listener_to_idle() {
        let link = TestLink::new(&[Frame::AAU, Frame::auto_address(1), Frame::listen(1)]);
        let mut disp = Dispatcher::new(link, false);
        disp.attach("dev", LoopDevice::new(Plain::default(), 2));
        let mut listening = LoopDevice::new(Plain::default(), 2);
        for frame in [Frame::AAU, Frame::auto_address(1), Frame::listen(1)].iter() {
            listening.process(*frame, 0);
        }
        assert_eq!(listening.bus_state(), BusState::AddressedListener);
        match disp.run() {
            Err(LinkError::Disconnected) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        let device = &disp.chain().get(0).unwrap().device;
        assert_eq!(device.bus_state(), BusState::Idle);
        assert!(device.address().primary_assigned);
        assert_eq!(device.address().primary, 1);
        assert_eq!(disp.link().written[1], (Some(0x05), 0x82));
    }

    #[test]
    fn finish_stops_run() {
        let mut disp = Dispatcher::new(TestLink::new(&[Frame::IFC]), false);
        disp.handle().finish();
        disp.run().unwrap();
        assert_eq!(disp.clock(), 0);
    }

    #[test]
    fn pause_resume_and_finish_work() {
        let control = Arc::new(LoopControl::new());
        control.pause();
        assert!(!control.is_paused());
        control.set_running(true);
        let worker = {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                while control.checkpoint() {
                    thread::sleep(Duration::from_millis(1));
                }
                control.set_running(false);
            })
        };
        control.pause();
        assert!(control.is_paused());
        control.resume();
        control.resume();
        control.pause();
        assert!(control.is_paused());
        control.finish();
        worker.join().unwrap();
        assert!(control.is_finishing());
        assert!(!control.is_paused());
        assert!(!control.is_running());
        control.pause();
    }
}

/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! A running loop: the dispatcher worker thread and the handles to its devices.
use core::fmt;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::dispatch::{DeviceRegistration, Dispatcher, DispatcherHandle};
use hpilemu_core::link::{Link, LinkResult};
use hpilemu_link::{PilBoxMode, TcpLink};

use crate::config::{ConfigError, DeviceConfig, LoopConfig, TransportConfig};
use crate::devices::{build_device, DeviceHandle};

/// The exit status of a session finished on request.
pub const EXIT_FINISHED: &str = "finished";

/// Creates a link for the configured transport. The link is opened by the dispatcher.
pub fn create_link(transport: &TransportConfig) -> LinkResult<Box<dyn Link>> {
    match transport {
        TransportConfig::Serial { device, baud, mode } => serial_link(device, *baud, *mode),
        TransportConfig::Tcp { port, remote } => Ok(Box::new(TcpLink::new(*port, remote.clone()))),
        TransportConfig::Unix { path } => unix_link(path),
    }
}

#[cfg(feature = "serial")]
fn serial_link(device: &str, baud: u32, mode: PilBoxMode) -> LinkResult<Box<dyn Link>> {
    use hpilemu_link::{PilBoxLink, SerialPortDevice};
    Ok(Box::new(PilBoxLink::new(SerialPortDevice::new(device), baud, mode)))
}

#[cfg(not(feature = "serial"))]
fn serial_link(device: &str, _baud: u32, _mode: PilBoxMode) -> LinkResult<Box<dyn Link>> {
    error!("{}: serial ports are not supported in this build", device);
    Err(hpilemu_core::link::LinkError::Unsupported)
}

#[cfg(unix)]
fn unix_link(path: &Path) -> LinkResult<Box<dyn Link>> {
    Ok(Box::new(hpilemu_link::UnixLink::new(path)))
}

#[cfg(not(unix))]
fn unix_link(path: &Path) -> LinkResult<Box<dyn Link>> {
    error!("{}: domain sockets are not supported on this platform", path.display());
    Err(hpilemu_core::link::LinkError::Unsupported)
}

/// A loop of devices run by a dispatcher on its own thread.
///
/// Dropping the session finishes the dispatcher and waits for it.
pub struct Session {
    description: String,
    handle: DispatcherHandle,
    devices: Vec<DeviceHandle>,
    worker: Option<JoinHandle<LinkResult<()>>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("description", &self.description)
            .field("devices", &self.devices)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Session {
    /// Creates the configured link and devices and starts the dispatcher.
    pub fn start(config: &LoopConfig) -> Result<Session, ConfigError> {
        config.validate()?;
        let link = create_link(&config.transport)?;
        Session::with_link(link, config)
    }
    /// Starts the dispatcher with the devices of `config` on the given `link`.
    /// The transport of `config` is ignored.
    pub fn with_link<L: Link + 'static>(link: L, config: &LoopConfig) -> Result<Session, ConfigError> {
        config.validate()?;
        let description = link.description();
        let mut dispatcher = Dispatcher::new(link, config.idy_frames);
        dispatcher.set_read_timeout(Duration::from_millis(config.read_timeout_ms.max(1)));
        let mut devices = Vec::with_capacity(config.devices.len());
        for device_config in config.devices.iter() {
            let (device, handle) = build_device(device_config)?;
            dispatcher.attach(device_config.name.clone(), device);
            devices.push(handle);
        }
        let handle = dispatcher.handle();
        handle.control().set_running(true);
        let worker = thread::Builder::new()
            .name("hpilemu-loop".into())
            .spawn(move || dispatcher.run())
            .map_err(|err| {
                handle.control().set_running(false);
                err
            })?;
        info!("{}: started with {} device(s)", description, devices.len());
        Ok(Session { description, handle, devices, worker: Some(worker) })
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }
    /// Returns handles to the devices in the loop order.
    #[inline]
    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&DeviceHandle> {
        self.devices.iter().find(|dev| dev.name == name)
    }
    /// Builds a device and requests it to be attached at the end of the loop.
    ///
    /// Returns `Ok(false)` if the request could not be queued.
    pub fn attach(&mut self, config: &DeviceConfig) -> Result<bool, ConfigError> {
        if self.device(&config.name).is_some() {
            return Err(ConfigError::DuplicateName(config.name.clone()))
        }
        let (device, handle) = build_device(config)?;
        let queued = self.handle.attach(DeviceRegistration::new(config.name.clone(), device));
        if queued {
            self.devices.push(handle);
        }
        Ok(queued)
    }
    /// Requests the named device to be detached. Returns `false` if there is no such device
    /// or the request could not be queued.
    pub fn detach(&mut self, name: &str) -> bool {
        match self.devices.iter().position(|dev| dev.name == name) {
            Some(index) if self.handle.detach(name) => {
                self.devices.remove(index);
                true
            }
            _ => false
        }
    }
    /// Suspends the dispatcher between frames and waits until it is suspended.
    pub fn pause(&self) {
        self.handle.pause()
    }

    pub fn resume(&self) {
        self.handle.resume()
    }
    /// Requests the dispatcher to finish. Use [Session::join] to wait for it.
    pub fn finish(&self) {
        self.handle.finish()
    }

    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }
    /// Returns `false` once the dispatcher has exited.
    pub fn is_running(&self) -> bool {
        match self.worker.as_ref() {
            Some(worker) => !worker.is_finished(),
            None => false
        }
    }
    /// Waits for the dispatcher to exit and returns its exit status: [EXIT_FINISHED]
    /// or the error message.
    pub fn join(mut self) -> String {
        let status = self.join_worker();
        info!("{}: {}", self.description, status);
        status
    }

    fn join_worker(&mut self) -> String {
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(Ok(()))) | None => EXIT_FINISHED.into(),
            Some(Ok(Err(err))) => err.to_string(),
            Some(Err(..)) => "dispatcher panicked".into()
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.handle.finish();
            self.join_worker();
        }
    }
}

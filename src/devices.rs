/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The closed set of emulated devices and their construction from a [DeviceConfig].
use core::fmt;
use std::fs::File;
use std::io::{self, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::bus::{BusState, DeviceExt, LoopDevice, StatusHandle};
use hpilemu_core::frame::Frame;
use hpilemu_peripherals::drive::{self, Drive, FileMedium, Geometry, Medium, MemoryMedium};
use hpilemu_peripherals::genprinter::{self, GenericPrinter};
use hpilemu_peripherals::plotter::{self, Plotter};
use hpilemu_peripherals::printer::{self, LogSpooler, Printer, PrinterCommand, Spooler};
use hpilemu_peripherals::queue::{QueueError, QueueSender};
use hpilemu_peripherals::terminal::{self, Terminal};

use crate::config::{ConfigError, DeviceConfig, DeviceKind};

/// A byte sink for device output.
pub trait Output: Write + Send + fmt::Debug {}

impl<T: Write + Send + fmt::Debug> Output for T {}

pub type BoxOutput = Box<dyn Output>;

/// An [Output] writing each received line to the log.
pub struct LogWriter {
    name: String,
    line: Vec<u8>,
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogWriter({})", self.name)
    }
}

impl LogWriter {
    pub fn new<S: Into<String>>(name: S) -> Self {
        LogWriter { name: name.into(), line: Vec::new() }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            match byte {
                b'\n' => self.flush()?,
                b'\r' => {}
                _ => self.line.push(byte)
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.line.is_empty() {
            info!("{}: {}", self.name, String::from_utf8_lossy(&self.line));
            self.line.clear();
        }
        Ok(())
    }
}

/// One of the emulated devices.
#[derive(Debug)]
pub enum Device {
    Drive(Drive<Box<dyn Medium>>),
    Printer(Printer<Box<dyn Spooler>>),
    Plotter(Plotter<BoxOutput>),
    Terminal(Terminal<BoxOutput>),
    GenericPrinter(GenericPrinter<BoxOutput>),
}

/// A [DeviceExt] implementation dispatching to one of the [Device]s, with an optionally
/// overridden identity.
#[derive(Debug)]
pub struct Peripheral {
    pub device: Device,
    device_id: Option<String>,
    accessory_id: Option<u8>,
}

/// User controls of a device, used from other threads.
#[derive(Clone, Debug)]
pub enum DeviceControl {
    Printer(QueueSender<PrinterCommand>),
    Keyboard(QueueSender<u8>),
}

/// A handle to a device attached to a running loop.
#[derive(Clone, Debug)]
pub struct DeviceHandle {
    pub name: String,
    pub kind: DeviceKind,
    /// The shared status register of the device.
    pub status: StatusHandle,
    pub control: Option<DeviceControl>,
}

macro_rules! delegate {
    ($dev:expr, $ext:ident => $body:expr) => {
        match $dev {
            Device::Drive($ext) => $body,
            Device::Printer($ext) => $body,
            Device::Plotter($ext) => $body,
            Device::Terminal($ext) => $body,
            Device::GenericPrinter($ext) => $body,
        }
    };
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Drive(..) => DeviceKind::Drive,
            Device::Printer(..) => DeviceKind::Printer,
            Device::Plotter(..) => DeviceKind::Plotter,
            Device::Terminal(..) => DeviceKind::Terminal,
            Device::GenericPrinter(..) => DeviceKind::GenericPrinter,
        }
    }
    /// Returns the default primary address of the device kind.
    pub fn default_address(kind: DeviceKind) -> u8 {
        match kind {
            DeviceKind::Drive => drive::DEFAULT_ADDRESS,
            DeviceKind::Printer => printer::DEFAULT_ADDRESS,
            DeviceKind::Plotter => plotter::DEFAULT_ADDRESS,
            DeviceKind::Terminal => terminal::DEFAULT_ADDRESS,
            DeviceKind::GenericPrinter => genprinter::DEFAULT_ADDRESS,
        }
    }
}

impl Peripheral {
    pub fn new(device: Device) -> Self {
        Peripheral { device, device_id: None, accessory_id: None }
    }
}

impl From<Device> for Peripheral {
    fn from(device: Device) -> Self {
        Peripheral::new(device)
    }
}

impl DeviceExt for Peripheral {
    fn status(&self) -> &StatusHandle {
        delegate!(&self.device, ext => ext.status())
    }
    fn on_clear(&mut self) {
        delegate!(&mut self.device, ext => ext.on_clear())
    }
    fn on_extended_command(&mut self, frame: Frame, state: BusState) {
        delegate!(&mut self.device, ext => ext.on_extended_command(frame, state))
    }
    fn on_send_data(&mut self, frame: Frame) -> Frame {
        delegate!(&mut self.device, ext => ext.on_send_data(frame))
    }
    fn on_receive_data(&mut self, frame: Frame) {
        delegate!(&mut self.device, ext => ext.on_receive_data(frame))
    }
    fn on_abort(&mut self) {
        delegate!(&mut self.device, ext => ext.on_abort())
    }
    fn on_poll(&mut self) {
        delegate!(&mut self.device, ext => ext.on_poll())
    }
    fn device_id(&self) -> &str {
        match self.device_id.as_deref() {
            Some(id) => id,
            None => delegate!(&self.device, ext => ext.device_id())
        }
    }
    fn accessory_id(&self) -> u8 {
        match self.accessory_id {
            Some(id) => id,
            None => delegate!(&self.device, ext => ext.accessory_id())
        }
    }
    fn extended_addressing(&self) -> bool {
        delegate!(&self.device, ext => ext.extended_addressing())
    }
}

impl DeviceControl {
    /// Sends a command to a printer. Returns `false` if this is not a printer control or the
    /// command could not be queued.
    pub fn printer(&self, command: PrinterCommand) -> bool {
        match self {
            DeviceControl::Printer(tx) => queued(tx.try_push(command)),
            _ => false
        }
    }
    /// Sends a key press to a terminal. Returns `false` if this is not a terminal control or
    /// the key could not be queued.
    pub fn press_key(&self, key: u8) -> bool {
        match self {
            DeviceControl::Keyboard(tx) => queued(tx.try_push(key)),
            _ => false
        }
    }
}

fn queued<T>(res: Result<(), QueueError<T>>) -> bool {
    match res {
        Ok(()) => true,
        Err(err) => {
            warn!("{}", err);
            false
        }
    }
}

fn open_output(config: &DeviceConfig) -> io::Result<BoxOutput> {
    let output: BoxOutput = match config.medium.as_ref() {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(LogWriter::new(config.name.clone()))
    };
    Ok(output)
}

fn open_medium(config: &DeviceConfig) -> io::Result<Box<dyn Medium>> {
    let geometry = Geometry::HP9114B;
    let medium: Box<dyn Medium> = match config.medium.as_ref() {
        Some(path) if path.exists() => Box::new(FileMedium::open(path, geometry)?),
        Some(path) => {
            info!("{}: creating blank medium {}", config.name, path.display());
            Box::new(FileMedium::create(path, geometry)?)
        }
        None => Box::new(MemoryMedium::new(geometry))
    };
    Ok(medium)
}

/// Creates a loop device from its configuration.
///
/// Returns the device together with a handle to be used by the user interface.
pub fn build_device(config: &DeviceConfig) -> Result<(LoopDevice<Peripheral>, DeviceHandle), ConfigError> {
    config.validate()?;
    let mut control = None;
    let device = match config.kind {
        DeviceKind::Drive => Device::Drive(Drive::new(Some(open_medium(config)?))),
        DeviceKind::Printer => {
            let spooler: Box<dyn Spooler> = Box::new(LogSpooler);
            let (printer, tx) = Printer::with_queue(spooler);
            control = Some(DeviceControl::Printer(tx));
            Device::Printer(printer)
        }
        DeviceKind::Plotter => Device::Plotter(Plotter::new(open_output(config)?)),
        DeviceKind::Terminal => {
            let (terminal, tx) = Terminal::with_keyboard(open_output(config)?);
            control = Some(DeviceControl::Keyboard(tx));
            Device::Terminal(terminal)
        }
        DeviceKind::GenericPrinter => Device::GenericPrinter(GenericPrinter::new(open_output(config)?)),
    };
    let peripheral = Peripheral {
        device,
        device_id: config.device_id.clone(),
        accessory_id: config.accessory_id
    };
    let handle = DeviceHandle {
        name: config.name.clone(),
        kind: config.kind,
        status: peripheral.status().clone(),
        control
    };
    let address = config.address.unwrap_or_else(|| Device::default_address(config.kind));
    debug!("{}: {} at default address {}", config.name, config.kind, address);
    Ok((LoopDevice::new(peripheral, address), handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpilemu_core::bus::BusDevice;

    #[test]
    fn build_device_works() {
        let mut config = DeviceConfig::new(DeviceKind::Printer).with_address(4);
        config.device_id = Some("PRINTER".into());
        let (mut dev, handle) = build_device(&config).unwrap();
        assert_eq!(dev.default_address(), 4);
        assert_eq!(handle.kind, DeviceKind::Printer);
        assert_eq!(dev.ext.device_id(), "PRINTER");
        assert_eq!(dev.ext.accessory_id(), printer::ACCESSORY_ID);
        assert_eq!(dev.ext.device.kind(), DeviceKind::Printer);
        assert_eq!(handle.status.lock().bytes().len(), 2);

        let control = handle.control.unwrap();
        assert!(control.printer(PrinterCommand::SetMode(printer::PrinterMode::Normal)));
        assert!(!control.press_key(b'A'));
        dev.poll();
        assert_eq!(handle.status.lock().bytes()[1], 0x02);
    }

    #[test]
    fn build_drive_creates_medium() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.lif");
        let config = DeviceConfig::new(DeviceKind::Drive).with_medium(&path);
        let (dev, handle) = build_device(&config).unwrap();
        assert_eq!(dev.default_address(), drive::DEFAULT_ADDRESS);
        assert_eq!(dev.ext.device_id(), "HP9114B");
        assert!(handle.control.is_none());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), Geometry::HP9114B.size());

        let config = DeviceConfig::new(DeviceKind::Terminal).with_address(40);
        assert!(matches!(build_device(&config), Err(ConfigError::AddressOutOfRange { address: 40, .. })));
    }

    #[test]
    fn log_writer_works() {
        let mut writer = LogWriter::new("test");
        writer.write_all(b"AB\r\nC").unwrap();
        assert_eq!(writer.line, b"C");
        writer.flush().unwrap();
        assert!(writer.line.is_empty());
    }
}

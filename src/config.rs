/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! The configuration of a virtual loop: the transport and the devices attached to it.
//!
//! With the `serde` feature enabled all types can be (de)serialized with camel case field names,
//! so an application may persist them in its own format.
use core::fmt;
use core::str::FromStr;
use std::error::Error;
use std::io;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use hpilemu_core::bus::MAX_ADDRESS;
use hpilemu_core::dispatch::DEFAULT_READ_TIMEOUT;
use hpilemu_core::link::LinkError;
use hpilemu_link::PilBoxMode;
use hpilemu_link::tcp::DEFAULT_PORT;

/// The default serial device of a PIL-Box.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB0";

/// The transport the loop frames travel through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "camelCase"))]
pub enum TransportConfig {
    /// A PIL-Box on a serial port. A `baud` rate of `0` selects automatic detection.
    Serial { device: String, baud: u32, mode: PilBoxMode },
    /// HP-IL over TCP/IP: listening on `port` and optionally sending to `remote` (`host:port`).
    Tcp { port: u16, remote: Option<String> },
    /// A Unix domain socket at `path`.
    Unix { path: PathBuf },
}

/// The kind of an emulated device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum DeviceKind {
    Drive,
    Printer,
    Plotter,
    Terminal,
    GenericPrinter,
}

/// The configuration of a single device.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", from = "entry::DeviceEntry"))]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    /// A unique name of the device in the loop.
    pub name: String,
    /// The default primary address, the kind's default when `None`.
    pub address: Option<u8>,
    /// Overrides the identification string sent in response to `SDI`.
    pub device_id: Option<String>,
    /// Overrides the accessory id sent in response to `SAI`.
    pub accessory_id: Option<u8>,
    /// The disc image of a drive, or the output file of a printer, a plotter or a terminal.
    pub medium: Option<PathBuf>,
}

/// The configuration of a loop.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct LoopConfig {
    pub transport: TransportConfig,
    /// Whether the service request bit is set in passing `IDY` frames.
    pub idy_frames: bool,
    /// How long the dispatcher waits for a byte before checking its control requests.
    pub read_timeout_ms: u64,
    /// Devices in the loop order.
    pub devices: Vec<DeviceConfig>,
}

/// Invalid configuration values.
#[derive(Debug)]
pub enum ConfigError {
    /// An unrecognised transport name.
    UnknownTransport(String),
    /// An unrecognised device kind.
    UnknownDevice(String),
    /// A device address above [MAX_ADDRESS].
    AddressOutOfRange { name: String, address: u8 },
    /// Two devices with the same name.
    DuplicateName(String),
    /// A device medium could not be opened.
    Io(io::Error),
    /// The link could not be created.
    Link(LinkError),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial {
            device: DEFAULT_SERIAL_DEVICE.into(),
            baud: 0,
            mode: PilBoxMode::default()
        }
    }
}

impl TransportConfig {
    /// Returns the named transport with its default parameters.
    ///
    /// Recognised names are: `serial`, `tcp` and `unix`.
    pub fn with_defaults(name: &str) -> Result<Self, ConfigError> {
        match name {
            "serial"|"pilbox" => Ok(TransportConfig::default()),
            "tcp" => Ok(TransportConfig::Tcp { port: DEFAULT_PORT, remote: None }),
            "unix" => Ok(TransportConfig::Unix { path: std::env::temp_dir().join("hpilemu.sock") }),
            _ => Err(ConfigError::UnknownTransport(name.into()))
        }
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::Serial { device, baud: 0, mode } => write!(f, "PIL-Box {} (auto baud, {})", device, mode),
            TransportConfig::Serial { device, baud, mode } => write!(f, "PIL-Box {} ({} baud, {})", device, baud, mode),
            TransportConfig::Tcp { port, remote: Some(remote) } => write!(f, "TCP/IP :{} -> {}", port, remote),
            TransportConfig::Tcp { port, remote: None } => write!(f, "TCP/IP :{}", port),
            TransportConfig::Unix { path } => write!(f, "socket {}", path.display()),
        }
    }
}

impl Default for DeviceKind {
    fn default() -> Self {
        DeviceKind::Drive
    }
}

impl DeviceKind {
    /// Returns the name used in configuration strings.
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Drive => "drive",
            DeviceKind::Printer => "printer",
            DeviceKind::Plotter => "plotter",
            DeviceKind::Terminal => "terminal",
            DeviceKind::GenericPrinter => "genprinter",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "drive"|"disc"|"hp9114b" => DeviceKind::Drive,
            "printer"|"hp82162a" => DeviceKind::Printer,
            "plotter"|"hp7470a" => DeviceKind::Plotter,
            "terminal" => DeviceKind::Terminal,
            "genprinter"|"hp2225b" => DeviceKind::GenericPrinter,
            _ => return Err(ConfigError::UnknownDevice(s.into()))
        })
    }
}

#[cfg(feature = "serde")]
mod entry {
    use std::path::PathBuf;
    use serde::Deserialize;
    use super::{DeviceConfig, DeviceKind};

    /// A serialized [DeviceConfig]. A missing name is derived from the kind.
    #[derive(Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct DeviceEntry {
        kind: DeviceKind,
        name: Option<String>,
        address: Option<u8>,
        device_id: Option<String>,
        accessory_id: Option<u8>,
        medium: Option<PathBuf>,
    }

    impl From<DeviceEntry> for DeviceConfig {
        fn from(entry: DeviceEntry) -> Self {
            let DeviceEntry { kind, name, address, device_id, accessory_id, medium } = entry;
            let name = name.unwrap_or_else(|| kind.name().into());
            DeviceConfig { kind, name, address, device_id, accessory_id, medium }
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::new(DeviceKind::default())
    }
}

impl DeviceConfig {
    /// Creates a configuration of a device named after its `kind`.
    pub fn new(kind: DeviceKind) -> Self {
        DeviceConfig {
            kind,
            name: kind.name().into(),
            address: None,
            device_id: None,
            accessory_id: None,
            medium: None
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_medium<P: Into<PathBuf>>(mut self, medium: P) -> Self {
        self.medium = Some(medium.into());
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }
    /// Checks the address range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.address {
            Some(address) if address > MAX_ADDRESS => {
                Err(ConfigError::AddressOutOfRange { name: self.name.clone(), address })
            }
            _ => Ok(())
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            transport: TransportConfig::default(),
            idy_frames: false,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            devices: Vec::new()
        }
    }
}

impl LoopConfig {
    /// Checks every device configuration and the uniqueness of device names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, device) in self.devices.iter().enumerate() {
            device.validate()?;
            if self.devices[..index].iter().any(|other| other.name == device.name) {
                return Err(ConfigError::DuplicateName(device.name.clone()))
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownTransport(name) => write!(f, "unknown transport: {}", name),
            ConfigError::UnknownDevice(name) => write!(f, "unknown device kind: {}", name),
            ConfigError::AddressOutOfRange { name, address } => {
                write!(f, "{}: address {} out of range (0-{})", name, address, MAX_ADDRESS)
            }
            ConfigError::DuplicateName(name) => write!(f, "duplicate device name: {}", name),
            ConfigError::Io(err) => err.fmt(f),
            ConfigError::Link(err) => err.fmt(f),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Link(err) => Some(err),
            _ => None
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<LinkError> for ConfigError {
    fn from(err: LinkError) -> Self {
        ConfigError::Link(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_work() {
        let config = LoopConfig::default();
        assert_eq!(config.read_timeout_ms, 100);
        assert!(!config.idy_frames);
        assert_eq!(config.transport, TransportConfig::Serial {
            device: "/dev/ttyUSB0".into(), baud: 0, mode: PilBoxMode::ControllerOffIdy
        });
        assert_eq!(config.transport.to_string(), "PIL-Box /dev/ttyUSB0 (auto baud, COFI)");
        assert_eq!(TransportConfig::with_defaults("tcp").unwrap(),
                   TransportConfig::Tcp { port: 60001, remote: None });
        match TransportConfig::with_defaults("usb") {
            Err(ConfigError::UnknownTransport(name)) => assert_eq!(name, "usb"),
            res => panic!("unexpected: {:?}", res)
        }
    }

    #[test]
    fn config_validation_works() {
        assert_eq!("HP9114B".parse::<DeviceKind>().unwrap(), DeviceKind::Drive);
        assert_eq!("genprinter".parse::<DeviceKind>().unwrap(), DeviceKind::GenericPrinter);
        assert_eq!("modem".parse::<DeviceKind>().unwrap_err().to_string(), "unknown device kind: modem");

        let mut config = LoopConfig::default();
        config.devices.push(DeviceConfig::new(DeviceKind::Printer));
        config.devices.push(DeviceConfig::new(DeviceKind::Drive).with_address(31));
        assert_eq!(config.validate().unwrap_err().to_string(), "drive: address 31 out of range (0-30)");
        config.devices[1] = DeviceConfig::new(DeviceKind::Drive).with_name("printer");
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateName(..))));
        config.devices[1].name = "disc".into();
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_serde_works() {
        let config = LoopConfig {
            transport: TransportConfig::Tcp { port: 60001, remote: Some("localhost:60000".into()) },
            idy_frames: true,
            read_timeout_ms: 50,
            devices: vec![DeviceConfig::new(DeviceKind::GenericPrinter).with_medium("out.txt")]
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""type":"tcp""#));
        assert!(json.contains(r#""idyFrames":true"#));
        assert!(json.contains(r#""kind":"genericPrinter""#));
        let config2: LoopConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, config2);
        let config3: LoopConfig = serde_json::from_str(r#"{"devices":[{"kind":"plotter"}]}"#).unwrap();
        assert_eq!(config3.transport, TransportConfig::default());
        assert_eq!(config3.devices[0].kind, DeviceKind::Plotter);
        assert_eq!(config3.devices[0].name, "plotter");
        let config4: LoopConfig = serde_json::from_str(
            r#"{"devices":[{"kind":"terminal"},{"kind":"drive","name":"disc","address":4}]}"#).unwrap();
        assert_eq!(config4.devices, [
            DeviceConfig::new(DeviceKind::Terminal),
            DeviceConfig::new(DeviceKind::Drive).with_name("disc").with_address(4)
        ]);
        config4.validate().unwrap();
        assert_eq!(config3.read_timeout_ms, 100);
    }
}

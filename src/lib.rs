/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    HPILEMU is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    HPILEMU is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! # HPILEMU
//!
//! HPILEMU is a library for emulating HP-IL loop devices in software. A calculator (HP-41,
//! HP-71, HP-75) drives the virtual devices through a PIL-Box serial adapter, or another
//! emulator through an HP-IL over TCP/IP bridge.
//!
//! The library consists of several crates re-exported here:
//!
//! * [frame], [codec], [bus] and [dispatch] - the core components from `hpilemu-core`.
//! * [link] - the transports from `hpilemu-link`.
//! * [peripherals] - the device emulators from `hpilemu-peripherals` (feature `peripherals`).
//!
//! This crate adds the [config] of a loop, the closed set of [devices] built from it and
//! a [session] running the dispatcher on its own thread:
//!
//! ```no_run
//! use hpilemu::config::{DeviceConfig, DeviceKind, LoopConfig, TransportConfig};
//! use hpilemu::session::Session;
//!
//! let mut config = LoopConfig::default();
//! config.transport = TransportConfig::Tcp { port: 60001, remote: None };
//! config.devices.push(DeviceConfig::new(DeviceKind::Printer));
//! config.devices.push(DeviceConfig::new(DeviceKind::Drive).with_medium("disc.lif"));
//! let session = Session::start(&config).unwrap();
//! // ...
//! session.finish();
//! println!("{}", session.join());
//! ```
pub use hpilemu_core::{frame, codec, dispatch};

/// The loop device state machine and the [BusDevice][bus::BusDevice] interface.
pub mod bus {
    pub use hpilemu_core::bus::*;
}

/// The [Link][link::Link] interface and its transports.
pub mod link {
    pub use hpilemu_core::link::*;
    pub use hpilemu_link::*;
}

/// Emulators of HP-IL peripheral devices.
#[cfg(feature = "peripherals")]
pub mod peripherals {
    pub use hpilemu_peripherals::*;
}

pub mod config;
#[cfg(feature = "peripherals")]
pub mod devices;
#[cfg(feature = "peripherals")]
pub mod session;

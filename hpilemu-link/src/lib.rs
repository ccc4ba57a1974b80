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
//! Link transports carrying HP-IL frames between a calculator loop and the emulated devices.
//!
//! * [pilbox] - a PIL-Box serial adapter with baud rate detection.
//! * [tcp] - the HP-IL over TCP/IP convention used by other emulators.
//! * [unix] - a Unix domain socket carrying the PIL-Box byte layout.
//! * [mock] - scripted in-memory doubles for tests and demos.
//!
//! Every transport implements [Link][hpilemu_core::link::Link].
pub mod mock;
pub mod pilbox;
mod server;
pub mod tcp;
#[cfg(unix)]
pub mod unix;

pub use pilbox::{PilBoxLink, PilBoxMode, SerialPortIo};
#[cfg(feature = "serial")]
pub use pilbox::SerialPortDevice;
pub use tcp::TcpLink;
#[cfg(unix)]
pub use unix::UnixLink;
pub use hpilemu_core::link::{Link, LinkError, LinkResult};

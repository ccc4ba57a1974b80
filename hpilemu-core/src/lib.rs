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
//! The core components of the HPILEMU library.
//!
//! * [frame] - 11-bit HP-IL frames and their mnemonics.
//! * [codec] - conversion between frames and the bytes travelling over a link.
//! * [bus] - the protocol state machine shared by every virtual loop device.
//! * [link] - the transport abstraction the loop is pumped through.
//! * [dispatch] - the frame pump threading frames through the attached devices.
pub mod bus;
pub mod codec;
pub mod dispatch;
pub mod frame;
pub mod link;

pub use arrayvec;

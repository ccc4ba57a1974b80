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
//! Emulators of HP-IL peripheral devices.
//!
//! Each device is a [DeviceExt][hpilemu_core::bus::DeviceExt] implementation adding its payload
//! semantics to the shared [LoopDevice][hpilemu_core::bus::LoopDevice] state machine.
#[macro_use]
extern crate bitflags;

pub mod drive;
pub mod genprinter;
pub mod plotter;
pub mod printer;
pub mod queue;
pub mod terminal;

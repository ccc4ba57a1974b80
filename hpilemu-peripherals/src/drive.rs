/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! An emulator of the HP-IL mass storage devices: **HP9114B** disc drive / **HP82161A** tape drive.
//!
//! The drive holds two 256 byte record buffers, a byte pointer into buffer 0 and a record pointer.
//! Data is transferred between the loop and the buffers, and between buffer 0 and the medium,
//! as selected by the device dependent listener (`DDL`) and talker (`DDT`) commands:
//!
//! | cmd | `DDL` (listener)                          | `DDT` (talker)                           |
//! |-----|-------------------------------------------|------------------------------------------|
//! |  0  | receive data into buffer 0                | send buffer 0 from the byte pointer      |
//! |  1  | receive data, write full buffer 0         | send buffer 1                            |
//! |  2  | reset the byte pointer                    | read the record into buffer 0 and send it|
//! |  3  | receive the byte pointer                  | send the byte pointer                    |
//! |  4  | receive the record address (2 bytes)      | send the record address                  |
//! |  5  | format the medium                         |                                          |
//! |  6  | write partially filled buffer 0           | send the medium geometry                 |
//! |  7  | format the medium                         | read the record into buffer 0            |
//! |  8  | write buffer 0                            |                                          |
//! |  9  | copy buffer 0 to buffer 1                 |                                          |
//! | 10  | exchange buffers                          |                                          |
//!
//! Every record read or written advances the record pointer.
use core::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use arrayvec::ArrayVec;
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use hpilemu_core::bus::{BusState, DeviceExt, StatusHandle, StatusRegister};
use hpilemu_core::frame::{CommandGroup, Frame};

/// The size of a single record.
pub const RECORD_SIZE: usize = 256;
/// The default loop address of a drive.
pub const DEFAULT_ADDRESS: u8 = 2;
pub const DEVICE_ID: &str = "HP9114B";
pub const ACCESSORY_ID: u8 = 0x10;

/// The drive is ready.
pub const STATUS_READY: u8 = 0;
/// There is no medium or it can't be accessed.
pub const STATUS_NO_MEDIUM: u8 = 20;
/// The record address is beyond the medium.
pub const STATUS_RECORD_RANGE: u8 = 23;
/// The medium is write protected.
pub const STATUS_WRITE_PROTECTED: u8 = 29;

/// A single record.
pub type Record = [u8; RECORD_SIZE];

/// The layout of a medium.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    pub tracks: u32,
    pub surfaces: u32,
    pub sectors: u32,
}

impl Geometry {
    /// A 3.5" double sided disc of the HP9114B.
    pub const HP9114B: Geometry = Geometry { tracks: 77, surfaces: 2, sectors: 16 };
    /// A mini cassette of the HP82161A.
    pub const HP82161A: Geometry = Geometry { tracks: 2, surfaces: 1, sectors: 256 };
    /// Returns the number of records.
    #[inline]
    pub fn records(&self) -> u32 {
        self.tracks * self.surfaces * self.sectors
    }
    /// Returns the size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.records() as u64 * RECORD_SIZE as u64
    }
    /// Returns the geometry as sent in response to `DDT 6`: tracks, surfaces and sectors
    /// as 32-bit big endian numbers.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut res = [0u8; 12];
        res[0..4].copy_from_slice(&self.tracks.to_be_bytes());
        res[4..8].copy_from_slice(&self.surfaces.to_be_bytes());
        res[8..12].copy_from_slice(&self.sectors.to_be_bytes());
        res
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::HP9114B
    }
}

/// An interface to the storage medium of a [Drive].
pub trait Medium: fmt::Debug + Send {
    /// Should return the layout of the medium.
    fn geometry(&self) -> Geometry;
    /// Should return `true` if the medium can't be written.
    fn is_write_protected(&self) -> bool {
        false
    }
    /// Should read the `record` into `buf`. `record` is always within the geometry.
    fn read_record(&mut self, record: u32, buf: &mut Record) -> io::Result<()>;
    /// Should write `buf` to the `record`. `record` is always within the geometry.
    fn write_record(&mut self, record: u32, buf: &Record) -> io::Result<()>;
    /// Should flush written records to the backing store.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
    /// Erases all records.
    fn format(&mut self) -> io::Result<()> {
        let blank = [0xFF; RECORD_SIZE];
        for record in 0..self.geometry().records() {
            self.write_record(record, &blank)?;
        }
        self.flush()
    }
}

impl<M: Medium + ?Sized> Medium for Box<M> {
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }
    fn is_write_protected(&self) -> bool {
        (**self).is_write_protected()
    }
    fn read_record(&mut self, record: u32, buf: &mut Record) -> io::Result<()> {
        (**self).read_record(record, buf)
    }
    fn write_record(&mut self, record: u32, buf: &Record) -> io::Result<()> {
        (**self).write_record(record, buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
    fn format(&mut self) -> io::Result<()> {
        (**self).format()
    }
}

/// A medium kept in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryMedium {
    pub write_protected: bool,
    geometry: Geometry,
    data: Vec<u8>,
}

impl MemoryMedium {
    /// Creates a blank medium.
    pub fn new(geometry: Geometry) -> Self {
        MemoryMedium { write_protected: false, geometry, data: vec![0xFF; geometry.size() as usize] }
    }
    /// Creates a medium with the given content, padded with blank bytes or truncated to its size.
    pub fn with_data(geometry: Geometry, mut data: Vec<u8>) -> Self {
        data.resize(geometry.size() as usize, 0xFF);
        MemoryMedium { write_protected: false, geometry, data }
    }
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn range(record: u32) -> core::ops::Range<usize> {
        let start = record as usize * RECORD_SIZE;
        start..start + RECORD_SIZE
    }
}

impl Medium for MemoryMedium {
    fn geometry(&self) -> Geometry {
        self.geometry
    }
    fn is_write_protected(&self) -> bool {
        self.write_protected
    }
    fn read_record(&mut self, record: u32, buf: &mut Record) -> io::Result<()> {
        buf.copy_from_slice(&self.data[MemoryMedium::range(record)]);
        Ok(())
    }
    fn write_record(&mut self, record: u32, buf: &Record) -> io::Result<()> {
        self.data[MemoryMedium::range(record)].copy_from_slice(buf);
        Ok(())
    }
}

/// A medium backed by a disc image file, e.g. a LIF volume.
///
/// Records beyond the end of a shorter file read as blank.
#[derive(Debug)]
pub struct FileMedium {
    file: File,
    path: PathBuf,
    geometry: Geometry,
    write_protected: bool,
}

impl FileMedium {
    /// Opens an existing image. An image which can't be opened for writing is opened write protected.
    pub fn open<P: AsRef<Path>>(path: P, geometry: Geometry) -> io::Result<Self> {
        let path = path.as_ref();
        let (file, write_protected) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => (file, false),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => (File::open(path)?, true),
            Err(e) => return Err(e)
        };
        let write_protected = write_protected || file.metadata()?.permissions().readonly();
        if write_protected {
            info!("{}: write protected", path.display());
        }
        debug!("opened medium {} ({} records)", path.display(), geometry.records());
        Ok(FileMedium { file, path: path.to_path_buf(), geometry, write_protected })
    }
    /// Creates a new blank image, truncating an existing file.
    pub fn create<P: AsRef<Path>>(path: P, geometry: Geometry) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
        let mut medium = FileMedium { file, path: path.to_path_buf(), geometry, write_protected: false };
        medium.format()?;
        Ok(medium)
    }
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Makes the medium write protected.
    pub fn set_write_protected(&mut self) {
        self.write_protected = true;
    }

    fn seek(&mut self, record: u32) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(record as u64 * RECORD_SIZE as u64))
    }
}

impl Medium for FileMedium {
    fn geometry(&self) -> Geometry {
        self.geometry
    }
    fn is_write_protected(&self) -> bool {
        self.write_protected
    }
    fn read_record(&mut self, record: u32, buf: &mut Record) -> io::Result<()> {
        self.seek(record)?;
        let mut len = 0;
        while len < RECORD_SIZE {
            match self.file.read(&mut buf[len..]) {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e)
            }
        }
        for p in buf[len..].iter_mut() {
            *p = 0xFF;
        }
        Ok(())
    }
    fn write_record(&mut self, record: u32, buf: &Record) -> io::Result<()> {
        if self.write_protected {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "medium is write protected"))
        }
        self.seek(record)?;
        self.file.write_all(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Listen {
    Ignore,
    Buffer { write_full: bool },
    BytePointer,
    RecordAddress(ArrayVec<u8, 2>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Output {
    Empty,
    Buffer { index: usize, pos: usize },
    Bytes(ArrayVec<u8, 12>, usize),
}

/// The mass storage device extension.
///
/// An implementation of [Medium] should be provided as its `M` type parameter.
#[derive(Debug)]
pub struct Drive<M> {
    status: StatusHandle,
    medium: Option<M>,
    buffers: [Record; 2],
    pointer: usize,
    record: u32,
    listen: Listen,
    output: Output,
}

impl<M: Medium> Default for Drive<M> {
    fn default() -> Self {
        Drive::new(None)
    }
}

impl<M: Medium> Drive<M> {
    /// Creates a drive with an optional `medium` inserted.
    pub fn new(medium: Option<M>) -> Self {
        let drive = Drive {
            status: StatusHandle::default(),
            medium,
            buffers: [[0; RECORD_SIZE]; 2],
            pointer: 0,
            record: 0,
            listen: Listen::Ignore,
            output: Output::Empty
        };
        drive.set_status(drive.idle_status());
        drive
    }
    /// Inserts a medium, returning the previous one.
    pub fn insert(&mut self, medium: M) -> Option<M> {
        let prev = self.eject();
        self.medium = Some(medium);
        self.set_status(STATUS_READY);
        prev
    }
    /// Removes the medium, flushing it first.
    pub fn eject(&mut self) -> Option<M> {
        let mut medium = self.medium.take()?;
        if let Err(err) = medium.flush() {
            error!("flushing medium: {}", err);
        }
        self.set_status(STATUS_NO_MEDIUM);
        Some(medium)
    }
    #[inline]
    pub fn medium(&self) -> Option<&M> {
        self.medium.as_ref()
    }
    #[inline]
    pub fn medium_mut(&mut self) -> Option<&mut M> {
        self.medium.as_mut()
    }
    /// Returns the record pointer.
    #[inline]
    pub fn record(&self) -> u32 {
        self.record
    }
    /// Returns the byte pointer into buffer 0.
    #[inline]
    pub fn pointer(&self) -> usize {
        self.pointer
    }
    /// Returns one of the two record buffers.
    ///
    /// # Panics
    /// Panics if `index` is not 0 or 1.
    #[inline]
    pub fn buffer(&self, index: usize) -> &Record {
        &self.buffers[index]
    }

    fn idle_status(&self) -> u8 {
        if self.medium.is_some() { STATUS_READY } else { STATUS_NO_MEDIUM }
    }

    fn set_status(&self, code: u8) {
        self.status.with(|st| st.set_byte(0, code));
    }

    fn check_record(&self) -> Result<(), u8> {
        match self.medium.as_ref() {
            None => Err(STATUS_NO_MEDIUM),
            Some(medium) if self.record >= medium.geometry().records() => Err(STATUS_RECORD_RANGE),
            Some(..) => Ok(())
        }
    }

    fn read_record(&mut self) -> bool {
        let res = self.check_record().and_then(|_| {
            let record = self.record;
            let buf = &mut self.buffers[0];
            match self.medium.as_mut() {
                Some(medium) => medium.read_record(record, buf).map_err(|err| {
                    error!("reading record {}: {}", record, err);
                    STATUS_NO_MEDIUM
                }),
                None => Err(STATUS_NO_MEDIUM)
            }
        });
        self.finish_transfer(res)
    }

    fn write_record(&mut self) -> bool {
        let res = self.check_record().and_then(|_| {
            let record = self.record;
            let buf = &self.buffers[0];
            match self.medium.as_mut() {
                Some(medium) if medium.is_write_protected() => Err(STATUS_WRITE_PROTECTED),
                Some(medium) => medium.write_record(record, buf).map_err(|err| {
                    error!("writing record {}: {}", record, err);
                    STATUS_NO_MEDIUM
                }),
                None => Err(STATUS_NO_MEDIUM)
            }
        });
        let ok = self.finish_transfer(res);
        if ok {
            self.status.with(StatusRegister::set_modified);
        }
        ok
    }

    fn finish_transfer(&mut self, res: Result<(), u8>) -> bool {
        match res {
            Ok(()) => {
                self.record += 1;
                self.set_status(STATUS_READY);
                true
            }
            Err(code) => {
                debug!("record {}: status {}", self.record, code);
                self.set_status(code);
                false
            }
        }
    }

    fn format(&mut self) {
        let code = match self.medium.as_mut() {
            None => STATUS_NO_MEDIUM,
            Some(medium) if medium.is_write_protected() => STATUS_WRITE_PROTECTED,
            Some(medium) => match medium.format() {
                Ok(()) => STATUS_READY,
                Err(err) => {
                    error!("formatting medium: {}", err);
                    STATUS_NO_MEDIUM
                }
            }
        };
        if code == STATUS_READY {
            self.record = 0;
            self.pointer = 0;
            self.status.with(StatusRegister::set_modified);
        }
        self.set_status(code);
    }

    fn device_listen(&mut self, command: u8) {
        match command {
            0 => self.listen = Listen::Buffer { write_full: false },
            1 => self.listen = Listen::Buffer { write_full: true },
            2 => self.pointer = 0,
            3 => self.listen = Listen::BytePointer,
            4 => self.listen = Listen::RecordAddress(ArrayVec::new()),
            5|7 => self.format(),
            6 => {
                if self.pointer != 0 {
                    self.pointer = 0;
                    self.write_record();
                }
            }
            8 => {
                self.write_record();
            }
            9 => self.buffers[1] = self.buffers[0],
            10 => self.buffers.swap(0, 1),
            _ => debug!("unsupported DDL {}", command)
        }
    }

    fn device_talk(&mut self, command: u8) {
        self.output = Output::Empty;
        match command {
            0 => self.output = Output::Buffer { index: 0, pos: self.pointer },
            1 => self.output = Output::Buffer { index: 1, pos: 0 },
            2 => {
                if self.read_record() {
                    self.pointer = 0;
                    self.output = Output::Buffer { index: 0, pos: 0 };
                }
            }
            3 => self.output = output_bytes(&[self.pointer as u8]),
            4 => self.output = output_bytes(&(self.record as u16).to_be_bytes()),
            6 => {
                let geometry = self.medium.as_ref().map(Medium::geometry).unwrap_or_default();
                self.output = output_bytes(&geometry.to_bytes());
            }
            7 => {
                if self.read_record() {
                    self.pointer = 0;
                }
            }
            _ => debug!("unsupported DDT {}", command)
        }
    }

    fn next_output(&mut self) -> Option<u8> {
        match &mut self.output {
            Output::Empty => None,
            Output::Buffer { index, pos } => {
                let byte = self.buffers[*index].get(*pos).copied();
                if byte.is_some() {
                    *pos += 1;
                    if *index == 0 {
                        self.pointer = *pos % RECORD_SIZE;
                    }
                }
                byte
            }
            Output::Bytes(bytes, pos) => {
                let byte = bytes.get(*pos).copied();
                *pos += 1;
                byte
            }
        }
    }
}

fn output_bytes(bytes: &[u8]) -> Output {
    let mut out = ArrayVec::new();
    out.try_extend_from_slice(bytes).unwrap_or(());
    Output::Bytes(out, 0)
}

impl<M: Medium> DeviceExt for Drive<M> {
    fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn on_clear(&mut self) {
        self.listen = Listen::Ignore;
        self.output = Output::Empty;
        self.pointer = 0;
        self.set_status(self.idle_status());
    }

    fn on_extended_command(&mut self, frame: Frame, state: BusState) {
        match frame.command_group() {
            Some(CommandGroup::DeviceListen) if state.is_listener() => self.device_listen(frame.operand()),
            Some(CommandGroup::DeviceTalk) if state.is_talker() => self.device_talk(frame.operand()),
            _ => {}
        }
    }

    fn on_send_data(&mut self, frame: Frame) -> Frame {
        match self.next_output() {
            Some(byte) => Frame::data_byte(byte),
            None if frame == Frame::SDA => frame,
            None => {
                self.output = Output::Empty;
                Frame::EOT
            }
        }
    }

    fn on_receive_data(&mut self, frame: Frame) {
        let byte = frame.data();
        match &mut self.listen {
            Listen::Ignore => {}
            Listen::Buffer { write_full } => {
                let write_full = *write_full;
                self.buffers[0][self.pointer] = byte;
                self.pointer += 1;
                if self.pointer == RECORD_SIZE {
                    self.pointer = 0;
                    if write_full {
                        self.write_record();
                    }
                }
            }
            Listen::BytePointer => {
                self.pointer = byte as usize;
                self.listen = Listen::Ignore;
            }
            Listen::RecordAddress(bytes) => {
                bytes.push(byte);
                if bytes.is_full() {
                    self.record = u16::from_be_bytes([bytes[0], bytes[1]]) as u32;
                    self.listen = Listen::Ignore;
                    let code = match self.check_record() {
                        Ok(()) => STATUS_READY,
                        Err(code) => code
                    };
                    self.set_status(code);
                }
            }
        }
    }

    fn on_abort(&mut self) {
        self.output = Output::Empty;
    }

    fn device_id(&self) -> &str {
        DEVICE_ID
    }

    fn accessory_id(&self) -> u8 {
        ACCESSORY_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listen(drive: &mut Drive<MemoryMedium>, ddl: u8, data: &[u8]) {
        drive.on_extended_command(Frame::device_listen(ddl), BusState::AddressedListener);
        for &b in data {
            drive.on_receive_data(Frame::data_byte(b));
        }
    }

    fn talk(drive: &mut Drive<MemoryMedium>, ddt: u8) -> Vec<u8> {
        drive.on_extended_command(Frame::device_talk(ddt), BusState::AddressedTalker);
        let mut res = Vec::new();
        let mut frame = drive.on_send_data(Frame::SDA);
        if frame == Frame::SDA {
            return res
        }
        while frame.is_data() {
            res.push(frame.data());
            frame = drive.on_send_data(frame);
        }
        assert_eq!(frame, Frame::EOT);
        res
    }

    fn status(drive: &Drive<MemoryMedium>) -> u8 {
        drive.status().lock().bytes()[0]
    }

    #[test]
    fn drive_records_work() {
        let mut drive = Drive::new(Some(MemoryMedium::new(Geometry::HP82161A)));
        assert_eq!(status(&drive), STATUS_READY);
        listen(&mut drive, 4, &[0, 3]);
        assert_eq!(drive.record(), 3);
        let data: Vec<u8> = (0..=255).collect();
        listen(&mut drive, 1, &data);
        assert_eq!(drive.record(), 4);
        assert_eq!(drive.pointer(), 0);
        assert!(drive.status().with(|st| st.take_modified()));
        assert_eq!(&drive.medium().unwrap().data()[3*256..4*256], &data[..]);
        assert_eq!(talk(&mut drive, 4), [0, 4]);

        listen(&mut drive, 4, &[0, 3]);
        assert_eq!(talk(&mut drive, 2), data);
        assert_eq!(drive.record(), 4);
        // a partial transfer leaves the pointer
        listen(&mut drive, 3, &[0xFE]);
        assert_eq!(talk(&mut drive, 3), [0xFE]);
        assert_eq!(talk(&mut drive, 0), [0xFE, 0xFF]);
        assert_eq!(drive.pointer(), 0);
    }

    #[test]
    fn drive_buffers_work() {
        let mut drive = Drive::new(Some(MemoryMedium::new(Geometry::HP82161A)));
        listen(&mut drive, 0, b"ABC");
        assert_eq!(drive.pointer(), 3);
        listen(&mut drive, 9, &[]);
        assert_eq!(&drive.buffer(1)[..3], b"ABC");
        listen(&mut drive, 2, b"X");
        assert_eq!(&drive.buffer(0)[..3], b"XBC");
        listen(&mut drive, 10, &[]);
        assert_eq!(&drive.buffer(0)[..3], b"ABC");
        assert_eq!(&talk(&mut drive, 1)[..3], b"XBC");
        // write the partially filled buffer 0
        listen(&mut drive, 3, &[2]);
        listen(&mut drive, 0, b"Z");
        listen(&mut drive, 6, &[]);
        assert_eq!(drive.record(), 1);
        assert_eq!(&drive.medium().unwrap().data()[..3], b"ABZ");
        listen(&mut drive, 4, &[0, 0]);
        listen(&mut drive, 7, &[]);
        assert_eq!(drive.record(), 0);
        talk(&mut drive, 7);
        assert_eq!(drive.record(), 1);
    }

    #[test]
    fn drive_errors_work() {
        let mut drive: Drive<MemoryMedium> = Drive::new(None);
        assert_eq!(status(&drive), STATUS_NO_MEDIUM);
        assert!(talk(&mut drive, 2).is_empty());
        assert_eq!(status(&drive), STATUS_NO_MEDIUM);
        let mut medium = MemoryMedium::new(Geometry::HP82161A);
        medium.write_protected = true;
        assert!(drive.insert(medium).is_none());
        assert_eq!(status(&drive), STATUS_READY);
        listen(&mut drive, 8, &[]);
        assert_eq!(status(&drive), STATUS_WRITE_PROTECTED);
        assert_eq!(drive.record(), 0);
        listen(&mut drive, 4, &[0x02, 0x00]);
        assert_eq!(status(&drive), STATUS_RECORD_RANGE);
        assert!(talk(&mut drive, 2).is_empty());
        drive.on_clear();
        assert_eq!(status(&drive), STATUS_READY);
        assert!(drive.eject().is_some());
        assert_eq!(status(&drive), STATUS_NO_MEDIUM);
        // talker commands are ignored by a listener
        drive.on_extended_command(Frame::device_talk(4), BusState::AddressedListener);
        assert_eq!(drive.on_send_data(Frame::SDA), Frame::SDA);
    }

    #[test]
    fn drive_format_and_geometry_work() {
        let mut medium = MemoryMedium::with_data(Geometry::HP82161A, vec![0; 10]);
        assert_eq!(medium.data().len(), 512 * 256);
        assert_eq!(&medium.data()[8..12], &[0, 0, 0xFF, 0xFF]);
        medium.write_record(1, &[0x11; RECORD_SIZE]).unwrap();
        let mut drive = Drive::new(Some(medium));
        listen(&mut drive, 5, &[]);
        assert!(drive.medium().unwrap().data().iter().all(|&b| b == 0xFF));
        assert_eq!(talk(&mut drive, 6), [0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 1, 0]);
        assert_eq!(Geometry::HP9114B.records(), 2464);
    }
}

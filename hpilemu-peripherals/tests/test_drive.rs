use std::fs;

use hpilemu_core::bus::{BusDevice, DeviceExt, LoopDevice, FrameTs};
use hpilemu_core::frame::Frame;
use hpilemu_peripherals::drive::*;

fn talk<D: BusDevice>(dev: &mut D, ts: FrameTs, ddt: u8) -> Vec<u8> {
    dev.process(Frame::talk(1), ts);
    dev.process(Frame::device_talk(ddt), ts);
    let mut res = Vec::new();
    let mut frame = dev.process(Frame::SDA, ts);
    while frame.is_data() {
        res.push(frame.data());
        frame = dev.process(frame, ts);
    }
    dev.process(Frame::UNT, ts);
    res
}

fn status<D: BusDevice>(dev: &mut D, ts: FrameTs) -> u8 {
    dev.process(Frame::talk(1), ts);
    let status = dev.process(Frame::SST, ts);
    assert!(status.is_data());
    assert_eq!(dev.process(status, ts), Frame::EOT);
    dev.process(Frame::UNT, ts);
    status.data()
}

fn listen<D: BusDevice>(dev: &mut D, ts: FrameTs, ddl: u8, data: &[u8]) {
    dev.process(Frame::listen(1), ts);
    dev.process(Frame::device_listen(ddl), ts);
    for &b in data {
        assert_eq!(dev.process(Frame::data_byte(b), ts), Frame::data_byte(b));
    }
    dev.process(Frame::UNL, ts);
}

#[test]
fn drive_writes_disc_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disc.lif");
    let medium = FileMedium::create(&path, Geometry::HP82161A).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 512 * 256);

    let mut dev = LoopDevice::new(Drive::new(Some(medium)), DEFAULT_ADDRESS);
    dev.process(Frame::AAU, 1);
    assert_eq!(dev.process(Frame::auto_address(1), 2), Frame::auto_address(2));
    assert_eq!(status(&mut dev, 3), STATUS_READY);

    let record: Vec<u8> = (0..=255u8).rev().collect();
    listen(&mut dev, 4, 4, &[0, 5]);
    listen(&mut dev, 5, 1, &record);
    assert_eq!(talk(&mut dev, 6, 4), [0, 6]);
    assert!(dev.ext.status().with(|st| st.take_modified()));

    listen(&mut dev, 7, 4, &[0, 5]);
    assert_eq!(talk(&mut dev, 8, 2), record);
    assert_eq!(talk(&mut dev, 9, 6), Geometry::HP82161A.to_bytes());

    let mut id = Vec::new();
    dev.process(Frame::talk(1), 10);
    let mut frame = dev.process(Frame::SDI, 10);
    while frame.is_data() {
        id.push(frame.data());
        frame = dev.process(frame, 10);
    }
    assert_eq!(id, b"HP9114B\r\n");
    dev.process(Frame::UNT, 10);

    drop(dev);
    let image = fs::read(&path).unwrap();
    assert_eq!(&image[5*256..6*256], &record[..]);
    assert!(image[..5*256].iter().all(|&b| b == 0xFF));
}

#[test]
fn drive_reports_errors_in_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disc.lif");
    fs::write(&path, vec![0x55; 300]).unwrap();
    let mut medium = FileMedium::open(&path, Geometry::HP9114B).unwrap();
    let mut buf = [0; RECORD_SIZE];
    medium.read_record(1, &mut buf).unwrap();
    assert_eq!(&buf[..44], &[0x55; 44][..]);
    assert!(buf[44..].iter().all(|&b| b == 0xFF));
    medium.set_write_protected();

    let mut dev = LoopDevice::new(Drive::new(Some(medium)), DEFAULT_ADDRESS);
    dev.process(Frame::AAU, 1);
    dev.process(Frame::auto_address(1), 2);
    listen(&mut dev, 3, 8, &[]);
    assert_eq!(status(&mut dev, 4), STATUS_WRITE_PROTECTED);
    listen(&mut dev, 5, 4, &[0x09, 0xA0]);
    assert_eq!(status(&mut dev, 6), STATUS_RECORD_RANGE);
    assert!(talk(&mut dev, 7, 2).is_empty());
    dev.process(Frame::DCL, 8);
    assert_eq!(status(&mut dev, 9), STATUS_READY);
    assert!(dev.ext.eject().is_some());
    assert_eq!(status(&mut dev, 10), STATUS_NO_MEDIUM);
    assert_eq!(fs::read(&path).unwrap(), vec![0x55; 300]);
}

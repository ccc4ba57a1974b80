use std::thread;
use std::time::{Duration, Instant};

use hpilemu::codec::WireFormat;
use hpilemu::config::*;
use hpilemu::frame::Frame;
use hpilemu::link::mock::MockLink;
use hpilemu::session::{Session, EXIT_FINISHED};

const TIMEOUT: Duration = Duration::from_secs(5);

fn wait_until<F: FnMut() -> bool>(mut f: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while !f() {
        if Instant::now() >= deadline {
            return false
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

fn mock_config(devices: Vec<DeviceConfig>) -> LoopConfig {
    LoopConfig { read_timeout_ms: 5, devices, ..LoopConfig::default() }
}

#[test]
fn session_runs_configured_devices() {
    let link = MockLink::new(WireFormat::Network);
    let probe = link.clone();
    let config = mock_config(vec![
        DeviceConfig::new(DeviceKind::Printer),
        DeviceConfig::new(DeviceKind::Drive),
    ]);
    let session = Session::with_link(link, &config).unwrap();
    assert_eq!(session.description(), "mock TCP/IP link");
    assert_eq!(session.devices().len(), 2);
    probe.push_frames(&[
        Frame::AAU,
        Frame::auto_address(1),
        Frame::listen(1),
        Frame::data_byte(b'H'),
        Frame::data_byte(b'I'),
        Frame::UNL,
    ]);
    let frames = probe.wait_frames(6, TIMEOUT);
    assert_eq!(frames, [
        Frame::AAU,
        Frame::auto_address(3),
        Frame::listen(1),
        Frame::data_byte(b'H'),
        Frame::data_byte(b'I'),
        Frame::UNL,
    ]);
    let printer = session.device("printer").unwrap();
    assert_eq!(printer.kind, DeviceKind::Printer);
    // the line is not printed yet
    assert_eq!(printer.status.lock().bytes(), &[0x08, 0x04]);
    assert!(session.is_running());
    session.finish();
    assert_eq!(session.join(), EXIT_FINISHED);
    assert!(!probe.is_open());
}

#[test]
fn session_reports_link_errors() {
    let link = MockLink::new(WireFormat::PilBox);
    let probe = link.clone();
    probe.push_frames(&[Frame::IFC]);
    probe.hang_up();
    let session = Session::with_link(link, &mock_config(Vec::new())).unwrap();
    assert!(wait_until(|| !session.is_running()));
    assert_eq!(session.join(), "peer disconnected");
    assert_eq!(probe.written_frames(), [Frame::IFC]);
}

#[test]
fn session_pauses_right_after_start() {
    for _ in 0..50 {
        let link = MockLink::new(WireFormat::PilBox);
        let probe = link.clone();
        let session = Session::with_link(link, &mock_config(Vec::new())).unwrap();
        session.pause();
        assert!(session.is_paused());
        probe.push_frames(&[Frame::IFC]);
        thread::sleep(Duration::from_millis(1));
        assert!(probe.written_frames().is_empty());
        session.resume();
        assert_eq!(probe.wait_frames(1, TIMEOUT), [Frame::IFC]);
        session.finish();
        assert_eq!(session.join(), EXIT_FINISHED);
    }
}

#[test]
fn session_attaches_and_detaches_devices() {
    let link = MockLink::new(WireFormat::PilBox);
    let probe = link.clone();
    let mut session = Session::with_link(link, &mock_config(Vec::new())).unwrap();
    assert!(session.attach(&DeviceConfig::new(DeviceKind::Terminal)).unwrap());
    assert!(matches!(session.attach(&DeviceConfig::new(DeviceKind::Terminal)),
                     Err(ConfigError::DuplicateName(..))));
    probe.push_frames(&[Frame::AAU, Frame::auto_address(1)]);
    assert_eq!(probe.wait_frames(2, TIMEOUT), [Frame::AAU, Frame::auto_address(2)]);

    let terminal = session.device("terminal").unwrap().clone();
    let control = terminal.control.clone().unwrap();
    assert!(control.press_key(b'A'));
    assert!(wait_until(|| terminal.status.service_requested()));

    session.pause();
    assert!(session.is_paused());
    session.resume();
    assert!(session.detach("terminal"));
    assert!(!session.detach("terminal"));
    assert!(session.devices().is_empty());
    session.finish();
    assert_eq!(session.join(), EXIT_FINISHED);
}

#[test]
fn session_rejects_invalid_config() {
    let config = mock_config(vec![DeviceConfig::new(DeviceKind::Plotter).with_address(31)]);
    match Session::start(&config) {
        Err(ConfigError::AddressOutOfRange { address, .. }) => assert_eq!(address, 31),
        res => panic!("unexpected result: {:?}", res)
    }
}

#[test]
fn session_starts_tcp_transport() {
    let config = LoopConfig {
        transport: TransportConfig::Tcp { port: 0, remote: None },
        ..mock_config(vec![DeviceConfig::new(DeviceKind::GenericPrinter)])
    };
    let session = Session::start(&config).unwrap();
    assert!(session.description().starts_with("TCP/IP"));
    session.finish();
    assert_eq!(session.join(), EXIT_FINISHED);
}

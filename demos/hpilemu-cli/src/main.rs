//! Runs a loop of virtual HP-IL devices driven through a PIL-Box or a TCP/IP bridge.
//!
//! Set `RUST_LOG=debug` or `RUST_LOG=trace` to see the loop traffic.
use std::io::{self, Read};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use clap::clap_app;

use hpilemu::config::{DeviceConfig, DeviceKind, LoopConfig, TransportConfig};
use hpilemu::devices::DeviceControl;
use hpilemu::link::PilBoxMode;
use hpilemu::link::tcp::DEFAULT_PORT;
use hpilemu::session::Session;

type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

const STATUS_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = clap_app!(hpilemu =>
        (version: "0.1")
        (author: "The HPILEMU developers")
        (about: "Runs a loop of virtual HP-IL devices")
        (@arg serial: -s --serial +takes_value "Serial device of a PIL-Box")
        (@arg baud: -b --baud +takes_value "PIL-Box baud rate, 0 for auto detection")
        (@arg coff: --coff "Puts the PIL-Box in COFF mode instead of COFI")
        (@arg tcp: -t --tcp +takes_value "Listens for HP-IL over TCP/IP on this port")
        (@arg remote: -r --remote +takes_value "Sends HP-IL over TCP/IP to host:port")
        (@arg unix: -u --unix +takes_value "Listens on a Unix domain socket")
        (@arg drive: -d --drive +takes_value ... "Attaches a disc drive with the given LIF image")
        (@arg printer: -p --printer "Attaches a HP82162A printer")
        (@arg plotter: --plotter +takes_value "Attaches a HP7470A plotter writing HP-GL to a file")
        (@arg genprinter: --genprinter +takes_value "Attaches a HP2225B printer writing to a file")
        (@arg terminal: --terminal "Attaches a terminal reading keys from stdin")
        (@arg idy: --idy "Sets the service request bit in IDY frames")
    ).get_matches();

    let transport = if let Some(port) = matches.value_of("tcp") {
        TransportConfig::Tcp {
            port: u16::from_str(port)?,
            remote: matches.value_of("remote").map(String::from)
        }
    }
    else if matches.is_present("remote") {
        TransportConfig::Tcp { port: DEFAULT_PORT, remote: matches.value_of("remote").map(String::from) }
    }
    else if let Some(path) = matches.value_of("unix") {
        TransportConfig::Unix { path: path.into() }
    }
    else {
        let mut transport = TransportConfig::default();
        if let TransportConfig::Serial { device, baud, mode } = &mut transport {
            if let Some(serial) = matches.value_of("serial") {
                *device = serial.into();
            }
            if let Some(rate) = matches.value_of("baud") {
                *baud = u32::from_str(rate)?;
            }
            if matches.is_present("coff") {
                *mode = PilBoxMode::ControllerOff;
            }
        }
        transport
    };

    let mut config = LoopConfig { transport, idy_frames: matches.is_present("idy"), ..LoopConfig::default() };
    if matches.is_present("printer") {
        config.devices.push(DeviceConfig::new(DeviceKind::Printer));
    }
    if let Some(images) = matches.values_of("drive") {
        for (n, image) in images.enumerate() {
            config.devices.push(DeviceConfig::new(DeviceKind::Drive)
                                .with_name(format!("drive{}", n + 1))
                                .with_medium(image));
        }
    }
    if let Some(file) = matches.value_of("plotter") {
        config.devices.push(DeviceConfig::new(DeviceKind::Plotter).with_medium(file));
    }
    if let Some(file) = matches.value_of("genprinter") {
        config.devices.push(DeviceConfig::new(DeviceKind::GenericPrinter).with_medium(file));
    }
    if matches.is_present("terminal") {
        config.devices.push(DeviceConfig::new(DeviceKind::Terminal));
    }
    if config.devices.is_empty() {
        warn!("no devices attached, the loop will only pass frames through");
    }

    info!("{}", config.transport);
    let session = Session::start(&config)?;
    for device in session.devices() {
        info!("{} ({})", device.name, device.kind);
        if let Some(DeviceControl::Keyboard(..)) = device.control.as_ref() {
            let control = device.control.clone();
            thread::spawn(move || forward_keys(control));
        }
    }

    while session.is_running() {
        thread::sleep(STATUS_INTERVAL);
        for device in session.devices() {
            if device.status.with(|st| st.take_modified()) {
                debug!("{}: medium modified", device.name);
            }
        }
    }
    let status = session.join();
    if status != hpilemu::session::EXIT_FINISHED {
        error!("{}", status);
        std::process::exit(1);
    }
    Ok(())
}

fn forward_keys(control: Option<DeviceControl>) {
    let control = match control {
        Some(control) => control,
        None => return
    };
    for byte in io::stdin().lock().bytes() {
        match byte {
            Ok(b'\n') => {
                control.press_key(b'\r');
            }
            Ok(key) => {
                control.press_key(key);
            }
            Err(err) => {
                error!("stdin: {}", err);
                break
            }
        }
    }
}

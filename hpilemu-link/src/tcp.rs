/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! HP-IL over TCP/IP.
//!
//! Frames travel as 2 bytes in network byte order. A receiver answers every high byte which
//! differs from the previously received one with [NETWORK_ACK], and a sender must wait for this
//! acknowledge before sending the low byte. An unchanged high byte is sent together with
//! the low byte without waiting.
//!
//! Frames are received from the first client connecting to the listening port. They are sent
//! to the remote party if one is configured, otherwise back to the first client. Bytes from
//! other clients are dropped.
use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::codec::{FrameCodec, WireFormat};
use hpilemu_core::link::{Link, LinkError, LinkResult, NETWORK_ACK};

use crate::server::LoopServer;

/// The default port the TCP/IP link listens on.
pub const DEFAULT_PORT: u16 = 60001;
/// How long to wait for the acknowledge of a high byte.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(500);
/// How long to wait for the remote party to accept the connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// How long a write to the remote party may block.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// The TCP/IP [Link].
#[derive(Debug)]
pub struct TcpLink {
    port: u16,
    remote: Option<String>,
    codec: FrameCodec,
    server: LoopServer<TcpStream>,
    outbound: Option<TcpStream>,
    local_addr: Option<SocketAddr>,
    tx_high: Option<u8>,
    rx_high: Option<u8>,
}

impl TcpLink {
    /// Creates a link listening on `port` and sending frames to the `remote` address
    /// (`host:port`) if given. Port `0` lets the system choose a free port.
    pub fn new(port: u16, remote: Option<String>) -> Self {
        TcpLink {
            port,
            remote,
            codec: FrameCodec::new(WireFormat::Network),
            server: LoopServer::default(),
            outbound: None,
            local_addr: None,
            tx_high: None,
            rx_high: None
        }
    }
    /// Returns the address the open link is listening on.
    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
    #[inline]
    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }
    /// Returns the number of connected clients.
    #[inline]
    pub fn client_count(&self) -> usize {
        self.server.client_count()
    }

    fn connect(remote: &str) -> LinkResult<TcpStream> {
        let mut last_err = None;
        for addr in remote.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(ACK_TIMEOUT))?;
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    info!("connected to {}", remote);
                    return Ok(stream)
                }
                Err(err) => {
                    debug!("connecting to {}: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable,
                                                      "no address to connect to")).into())
    }

    fn send(&mut self, bytes: &[u8]) -> LinkResult<()> {
        match self.outbound.as_mut() {
            Some(stream) => {
                stream.write_all(bytes)?;
                stream.flush()?;
                Ok(())
            }
            None => self.server.send_to(0, bytes)
        }
    }

    fn wait_ack(&mut self) -> LinkResult<()> {
        let ack = match self.outbound.as_mut() {
            Some(stream) => {
                let mut buf = [0u8];
                match stream.read(&mut buf) {
                    Ok(0) => return Err(LinkError::Disconnected),
                    Ok(_) => Some(buf[0]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock ||
                              e.kind() == io::ErrorKind::TimedOut => None,
                    Err(e) => return Err(e.into())
                }
            }
            None => self.recv_peer_ack()?
        };
        match ack {
            Some(NETWORK_ACK) => Ok(()),
            Some(received) => Err(LinkError::BadAcknowledge { expected: NETWORK_ACK, received }),
            None => Err(LinkError::NoAcknowledge)
        }
    }

    fn recv_peer_ack(&mut self) -> LinkResult<Option<u8>> {
        self.server.recv_peer(ACK_TIMEOUT)
    }
}

impl Link for TcpLink {
    fn open(&mut self) -> LinkResult<()> {
        self.outbound = match self.remote.as_ref() {
            Some(remote) => Some(TcpLink::connect(remote)?),
            None => None
        };
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))?;
        let addr = listener.local_addr()?;
        self.server.start(listener)?;
        self.codec = FrameCodec::new(WireFormat::Network);
        self.local_addr = Some(addr);
        self.tx_high = None;
        self.rx_high = None;
        info!("HP-IL over TCP/IP listening on {}", addr);
        Ok(())
    }

    fn close(&mut self) -> LinkResult<()> {
        self.server.stop();
        if let Some(stream) = self.outbound.take() {
            stream.shutdown(std::net::Shutdown::Both).unwrap_or(());
        }
        if self.local_addr.take().is_some() {
            info!("HP-IL over TCP/IP closed");
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        let byte = match self.server.recv_peer(timeout)? {
            Some(byte) => byte,
            None => return Ok(None)
        };
        if !self.codec.is_pending() && self.rx_high != Some(byte) {
            self.rx_high = Some(byte);
            self.server.send_to(0, &[NETWORK_ACK])?;
        }
        Ok(Some(byte))
    }

    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
        if !self.server.is_listening() {
            return Err(LinkError::NotConnected)
        }
        match high {
            Some(high) => {
                self.send(&[high])?;
                self.wait_ack()?;
                self.tx_high = Some(high);
                self.send(&[low])
            }
            None => {
                let high = self.tx_high.unwrap_or(0);
                self.send(&[high, low])
            }
        }
    }

    #[inline]
    fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    #[inline]
    fn codec_mut(&mut self) -> &mut FrameCodec {
        &mut self.codec
    }

    fn description(&self) -> String {
        match (self.local_addr, self.remote.as_ref()) {
            (Some(addr), Some(remote)) => format!("TCP/IP {} -> {}", addr, remote),
            (Some(addr), None) => format!("TCP/IP {}", addr),
            (None, _) => format!("TCP/IP port {}", self.port)
        }
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.close().unwrap_or(());
    }
}

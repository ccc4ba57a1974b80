/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! A listening socket accepting loop peers, shared by the socket based links.
//!
//! The listener is polled by an acceptor thread and every accepted client gets its own reader
//! thread. All of them report to a single channel, so the link waits for the next event with
//! a single bounded receive.
use core::fmt;
use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream, Shutdown};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::link::{LinkError, LinkResult};

/// How often the acceptor thread checks for new connections and the stop flag.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// A connected byte stream.
pub(crate) trait Stream: Read + Write + Send + Sized + 'static {
    fn try_clone(&self) -> io::Result<Self>;
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn shutdown(&self) -> io::Result<()>;
}

/// A listening socket.
pub(crate) trait Acceptor: Send + 'static {
    type Stream: Stream;
    fn accept_peer(&self) -> io::Result<(Self::Stream, String)>;
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
}

impl Stream for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;
    fn accept_peer(&self) -> io::Result<(TcpStream, String)> {
        let (stream, addr) = self.accept()?;
        stream.set_nodelay(true)?;
        Ok((stream, addr.to_string()))
    }
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpListener::set_nonblocking(self, nonblocking)
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;
    use std::net::Shutdown;
    use std::os::unix::net::{UnixListener, UnixStream};
    use super::{Acceptor, Stream};

    impl Stream for UnixStream {
        fn try_clone(&self) -> io::Result<Self> {
            UnixStream::try_clone(self)
        }
        fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
            UnixStream::set_nonblocking(self, nonblocking)
        }
        fn shutdown(&self) -> io::Result<()> {
            UnixStream::shutdown(self, Shutdown::Both)
        }
    }

    impl Acceptor for UnixListener {
        type Stream = UnixStream;
        fn accept_peer(&self) -> io::Result<(UnixStream, String)> {
            let (stream, _) = self.accept()?;
            Ok((stream, "local socket".into()))
        }
        fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
            UnixListener::set_nonblocking(self, nonblocking)
        }
    }
}

/// Events reported by the acceptor and reader threads.
pub(crate) enum Inbound<S> {
    Accepted(S, String),
    Byte(usize, u8),
    Closed(usize),
}

/// The server side of a socket link.
///
/// The client accepted first is the loop peer, frames are written only to it.
/// Clients accepted later are only read from.
pub(crate) struct LoopServer<S: Stream> {
    inbound: Option<Receiver<Inbound<S>>>,
    clients: Vec<Option<S>>,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl<S: Stream> fmt::Debug for LoopServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopServer")
            .field("listening", &self.inbound.is_some())
            .field("clients", &self.clients.iter().filter(|c| c.is_some()).count())
            .finish()
    }
}

impl<S: Stream> Default for LoopServer<S> {
    fn default() -> Self {
        LoopServer {
            inbound: None,
            clients: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            acceptor: None
        }
    }
}

impl<S: Stream> LoopServer<S> {
    /// Starts accepting clients on the `listener`.
    pub fn start<A: Acceptor<Stream=S>>(&mut self, listener: A) -> io::Result<()> {
        self.stop();
        listener.set_nonblocking(true)?;
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        self.acceptor = Some(thread::Builder::new()
            .name("hpil-acceptor".into())
            .spawn(move || accept_loop(listener, tx, stop))?);
        self.inbound = Some(rx);
        Ok(())
    }
    /// Stops accepting, disconnects all clients and waits for the acceptor thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.acceptor.take() {
            if handle.join().is_err() {
                error!("acceptor thread panicked");
            }
        }
        for client in self.clients.drain(..).flatten() {
            client.shutdown().unwrap_or(());
        }
        if let Some(rx) = self.inbound.take() {
            // streams accepted but not yet seen
            for event in rx.try_iter() {
                if let Inbound::Accepted(stream, _) = event {
                    stream.shutdown().unwrap_or(());
                }
            }
        }
    }
    #[inline]
    pub fn is_listening(&self) -> bool {
        self.inbound.is_some()
    }
    /// Returns the number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.iter().filter(|c| c.is_some()).count()
    }
    /// Waits up to `timeout` for a byte from any client. Returns the byte and the index of its client.
    ///
    /// Returns an error if the first accepted client disconnects.
    pub fn recv(&mut self, timeout: Duration) -> LinkResult<Option<(usize, u8)>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.inbound.as_ref() {
                Some(rx) => rx.recv_timeout(remaining),
                None => return Err(LinkError::NotConnected)
            };
            match event {
                Ok(Inbound::Byte(index, byte)) => return Ok(Some((index, byte))),
                Ok(Inbound::Accepted(stream, peer)) => {
                    info!("accepted loop client #{} from {}", self.clients.len(), peer);
                    self.clients.push(Some(stream));
                }
                Ok(Inbound::Closed(index)) => {
                    if let Some(client) = self.clients.get_mut(index) {
                        *client = None;
                    }
                    if index == 0 {
                        info!("loop peer disconnected");
                        return Err(LinkError::Disconnected)
                    }
                    debug!("loop client #{} disconnected", index);
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(LinkError::Disconnected)
            }
        }
    }
    /// Waits up to `timeout` for a byte from the loop peer. Bytes from other clients are dropped.
    pub fn recv_peer(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv(remaining)? {
                Some((0, byte)) => return Ok(Some(byte)),
                Some((index, byte)) => warn!("client #{} is not the loop peer, dropped {:02X}h", index, byte),
                None => return Ok(None)
            }
        }
    }
    /// Writes `bytes` to the client at `index`.
    pub fn send_to(&mut self, index: usize, bytes: &[u8]) -> LinkResult<()> {
        let client = self.clients.get_mut(index)
                         .and_then(Option::as_mut)
                         .ok_or(LinkError::NotConnected)?;
        client.write_all(bytes)?;
        client.flush()?;
        Ok(())
    }
    /// Returns `true` if the loop peer is connected.
    pub fn has_peer(&self) -> bool {
        matches!(self.clients.first(), Some(Some(..)))
    }
}

impl<S: Stream> Drop for LoopServer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop<A: Acceptor>(listener: A, tx: Sender<Inbound<A::Stream>>, stop: Arc<AtomicBool>) {
    let mut index = 0;
    while !stop.load(Ordering::Acquire) {
        match listener.accept_peer() {
            Ok((stream, peer)) => {
                let reader = match stream.set_nonblocking(false).and_then(|_| stream.try_clone()) {
                    Ok(reader) => reader,
                    Err(err) => {
                        warn!("cannot serve {}: {}", peer, err);
                        continue;
                    }
                };
                if tx.send(Inbound::Accepted(stream, peer)).is_err() {
                    break
                }
                if let Err(err) = spawn_reader(reader, index, tx.clone()) {
                    warn!("cannot read from client #{}: {}", index, err);
                    tx.send(Inbound::Closed(index)).unwrap_or(());
                }
                index += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("accept: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("acceptor finished");
}

fn spawn_reader<S: Stream>(mut reader: S, index: usize, tx: Sender<Inbound<S>>) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("hpil-client-{}", index))
        .spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            if tx.send(Inbound::Byte(index, byte)).is_err() {
                                return
                            }
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        debug!("client #{}: {}", index, e);
                        break
                    }
                }
            }
            tx.send(Inbound::Closed(index)).unwrap_or(());
        })?;
    Ok(())
}

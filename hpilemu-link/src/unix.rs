/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! A Unix domain socket link.
//!
//! Bytes are laid out as on a PIL-Box serial line, with a single byte per write.
//! The client connecting first is the loop peer.
use core::time::Duration;
use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use hpilemu_core::codec::{FrameCodec, WireFormat};
use hpilemu_core::link::{Link, LinkError, LinkResult};

use crate::server::LoopServer;

/// The Unix domain socket [Link].
#[derive(Debug)]
pub struct UnixLink {
    path: PathBuf,
    codec: FrameCodec,
    server: LoopServer<UnixStream>,
}

impl UnixLink {
    /// Creates a link listening on the socket at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        UnixLink {
            path: path.into(),
            codec: FrameCodec::new(WireFormat::PilBox),
            server: LoopServer::default()
        }
    }
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn remove_socket(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        res => res
    }
}

impl Link for UnixLink {
    fn open(&mut self) -> LinkResult<()> {
        remove_socket(&self.path)?;
        let listener = UnixListener::bind(&self.path)?;
        self.server.start(listener)?;
        self.codec = FrameCodec::new(WireFormat::PilBox);
        info!("HP-IL socket listening on {}", self.path.display());
        Ok(())
    }

    fn close(&mut self) -> LinkResult<()> {
        if !self.server.is_listening() {
            return Ok(())
        }
        self.server.stop();
        remove_socket(&self.path)?;
        info!("HP-IL socket {} closed", self.path.display());
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> LinkResult<Option<u8>> {
        self.server.recv_peer(timeout)
    }

    fn write_frame(&mut self, high: Option<u8>, low: u8) -> LinkResult<()> {
        if !self.server.has_peer() {
            return Err(LinkError::NotConnected)
        }
        if let Some(high) = high {
            self.server.send_to(0, &[high])?;
        }
        self.server.send_to(0, &[low])
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
        format!("socket {}", self.path.display())
    }
}

impl Drop for UnixLink {
    fn drop(&mut self) {
        self.close().unwrap_or(());
    }
}

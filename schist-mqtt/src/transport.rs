/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
The byte-stream abstraction the client runs over.

A transport is a connected, non-blocking stream.  Reads and writes may be short and may fail
with `std::io::ErrorKind::WouldBlock`; the client's packet reader and writer resume from
wherever the transport left off.  `select` is the client's only blocking point.
 */

use crate::error::{SchistError, SchistResult};

use log::*;
use mio::{Events, Poll, Token};

use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, ToSocketAddrs};
use std::time::Duration;

/// Which kinds of readiness a call to [`Transport::select`] should wait for
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Interest {

    /// wait until the transport has bytes (or an error, or end of stream) to read
    pub readable: bool,

    /// wait until the transport can accept more bytes
    pub writable: bool,
}

/// Result of a call to [`Transport::select`].  Both fields false means the wait timed out.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Readiness {

    /// a read will make progress
    pub readable: bool,

    /// a write will make progress
    pub writable: bool,
}

impl Readiness {

    /// Returns true if neither direction is ready
    pub fn is_timeout(&self) -> bool {
        !self.readable && !self.writable
    }
}

/// A connected, non-blocking byte stream to a broker.
pub trait Transport {

    /// Reads up to `buffer.len()` bytes.  `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    /// Writes up to `buffer.len()` bytes, returning how many were accepted.
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize>;

    /// Waits at most `timeout` for the requested readiness.
    fn select(&mut self, interest: Interest, timeout: Duration) -> io::Result<Readiness>;

    /// Closes the stream.  Further reads and writes fail.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens a transport to a host and port.  The client calls this from `connect`.
pub type TransportFactory = Box<dyn Fn(&str, u16) -> SchistResult<Box<dyn Transport>>>;

/// Returns a factory that opens plain TCP connections.
pub fn tcp_transport_factory() -> TransportFactory {
    Box::new(|host, port| {
        let transport = TcpTransport::connect(host, port)?;
        Ok(Box::new(transport) as Box<dyn Transport>)
    })
}

const TCP_TRANSPORT_TOKEN: Token = Token(0);

/// Plain TCP transport driven by a private `mio` poll instance.
pub struct TcpTransport {
    stream: mio::net::TcpStream,
    poll: Poll,
    events: Events,
    registered: bool,
    closed: bool,
}

impl TcpTransport {

    /// Performs a blocking TCP connect to the first address `host:port` resolves to that
    /// accepts, then switches the socket to non-blocking mode.
    pub fn connect(host: &str, port: u16) -> SchistResult<TcpTransport> {
        let addresses = (host, port).to_socket_addrs()?;

        let mut last_error = None;
        for address in addresses {
            debug!("TcpTransport::connect - attempting connection to {}", address);
            match std::net::TcpStream::connect(address) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_nonblocking(true)?;

                    info!("TcpTransport::connect - connected to {}", address);
                    return Ok(TcpTransport {
                        stream: mio::net::TcpStream::from_std(stream),
                        poll: Poll::new()?,
                        events: Events::with_capacity(16),
                        registered: false,
                        closed: false,
                    });
                }
                Err(error) => {
                    warn!("TcpTransport::connect - connection to {} failed: {}", address, error);
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(SchistError::from(error)),
            None => Err(SchistError::new_invalid_argument(format!("\"{}\" did not resolve to any address", host))),
        }
    }

    fn update_registration(&mut self, interest: mio::Interest) -> io::Result<()> {
        // re-arming on every wait makes edge-triggered readiness behave like level-triggered
        if self.registered {
            self.poll.registry().reregister(&mut self.stream, TCP_TRANSPORT_TOKEN, interest)
        } else {
            self.poll.registry().register(&mut self.stream, TCP_TRANSPORT_TOKEN, interest)?;
            self.registered = true;
            Ok(())
        }
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buffer)
    }

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.stream.write(buffer)
    }

    fn select(&mut self, interest: Interest, timeout: Duration) -> io::Result<Readiness> {
        let mio_interest = match (interest.readable, interest.writable) {
            (_, false) => mio::Interest::READABLE,
            (false, true) => mio::Interest::WRITABLE,
            (true, true) => mio::Interest::READABLE | mio::Interest::WRITABLE,
        };

        self.update_registration(mio_interest)?;

        if let Err(error) = self.poll.poll(&mut self.events, Some(timeout)) {
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::default());
            }

            return Err(error);
        }

        let mut readiness = Readiness::default();
        for event in self.events.iter() {
            if event.token() != TCP_TRANSPORT_TOKEN {
                continue;
            }

            // errors and hangups surface through the next read
            if event.is_readable() || event.is_read_closed() || event.is_error() {
                readiness.readable = true;
            }

            if event.is_writable() || event.is_write_closed() {
                readiness.writable = true;
            }
        }

        readiness.readable &= interest.readable;
        readiness.writable &= interest.writable;

        Ok(readiness)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        if self.registered {
            self.poll.registry().deregister(&mut self.stream)?;
            self.registered = false;
        }

        match self.stream.shutdown(Shutdown::Both) {
            Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error),
            _ => Ok(()),
        }
    }
}

use super::protocol::{Request, Response};
use crate::error::Error;
use std::{
    io::{BufRead, BufReader, ErrorKind, Write},
    net::{TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};
use tracing::{trace, warn};

/// Carries one request to the render server and waits for its response.
pub trait Transport {
    /// Sends `request` and blocks for at most `timeout` waiting for the response.
    fn exchange(&mut self, request: &Request, timeout: Duration) -> Result<Response, Error>;
}

/// Line delimited JSON over a TCP connection.
///
/// A failed exchange may leave a late reply in the socket, so after a timeout or an I/O
/// error the transport refuses further requests. Reconnect to continue.
pub struct TcpTransport {
    address: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    broken: bool,
}

impl TcpTransport {
    /// Connects to `host:port`, trying each resolved address within `timeout`.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let address = format!("{host}:{port}");
        let connection_error = |source| Error::Connection {
            address: address.clone(),
            source,
        };

        let mut last_error = std::io::Error::new(ErrorKind::NotFound, "no address resolved");
        for socket in (host, port).to_socket_addrs().map_err(connection_error)? {
            match TcpStream::connect_timeout(&socket, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(connection_error)?;
                    let writer = stream.try_clone().map_err(connection_error)?;
                    return Ok(Self {
                        address: address.clone(),
                        reader: BufReader::new(stream),
                        writer,
                        broken: false,
                    });
                }
                Err(err) => last_error = err,
            }
        }

        Err(connection_error(last_error))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether an earlier exchange failed and left the connection out of step.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn round_trip(&mut self, line: &[u8], timeout: Duration) -> Result<Vec<u8>, Error> {
        let deadline = Instant::now() + timeout;
        let remaining = || {
            deadline
                .checked_duration_since(Instant::now())
                .filter(|left| !left.is_zero())
                .ok_or(Error::Timeout { timeout })
        };

        self.writer.set_write_timeout(Some(remaining()?))?;
        self.writer
            .write_all(line)
            .map_err(|err| io_error(err, &self.address, timeout))?;

        // The read timeout bounds each read, so shrink it to what is left of the deadline.
        let mut reply = Vec::new();
        loop {
            self.reader.get_ref().set_read_timeout(Some(remaining()?))?;
            let available = self
                .reader
                .fill_buf()
                .map_err(|err| io_error(err, &self.address, timeout))?;

            if available.is_empty() {
                return Err(Error::Connection {
                    address: self.address.clone(),
                    source: ErrorKind::UnexpectedEof.into(),
                });
            }

            let (used, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            };
            reply.extend_from_slice(&available[..used]);
            self.reader.consume(used);

            if complete {
                return Ok(reply);
            }
        }
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, request: &Request, timeout: Duration) -> Result<Response, Error> {
        if self.broken {
            return Err(Error::Connection {
                address: self.address.clone(),
                source: std::io::Error::new(
                    ErrorKind::NotConnected,
                    "connection is out of step after a failed exchange",
                ),
            });
        }

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');

        let reply = match self.round_trip(&line, timeout) {
            Ok(reply) => reply,
            Err(err) => {
                self.broken = true;
                warn!(address = %self.address, op = request.op(), %err, "dropping connection");
                return Err(err);
            }
        };

        trace!(bytes = reply.len(), "received response");
        Ok(serde_json::from_slice(reply.trim_ascii_end())?)
    }
}

fn io_error(err: std::io::Error, address: &str, timeout: Duration) -> Error {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout { timeout },
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            Error::Connection {
                address: address.to_string(),
                source: err,
            }
        }
        _ => Error::Io(err),
    }
}

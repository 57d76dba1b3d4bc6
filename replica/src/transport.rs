//! Message Codec & Transport Adapter (spec §4.1): frames and parses
//! newline-terminated JSON records over a byte stream.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use raft::message::Envelope;

use crate::error::ReplicaError;

/// A full-duplex connection to the network substrate: reads and writes
/// newline-terminated JSON [`Envelope`]s.
pub trait Transport {
    /// Reads whatever is available within `timeout`, re-frames it, and
    /// returns the complete envelopes decoded from it. No data, or only a
    /// partial trailing frame, yields an empty `Vec`.
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Envelope>>;

    /// Serializes `envelope`, appends a newline, and writes it. Fire and
    /// forget: no acknowledgement exists at this layer (spec §4.1).
    fn send(&mut self, envelope: &Envelope) -> io::Result<()>;
}

/// Splits complete newline-terminated frames off the front of `buf`,
/// leaving any partial trailing bytes for the next read. A frame that
/// fails to parse as an [`Envelope`] is logged and dropped; it does not
/// stop the remaining frames in the batch from being returned (spec §7:
/// "JSON parse failure of an inbound frame is fatal-to-that-frame only").
pub fn drain_frames(buf: &mut Vec<u8>) -> Vec<Envelope> {
    let mut out = Vec::new();
    loop {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => break,
        };
        let frame: Vec<u8> = buf.drain(..=newline).collect();
        let line = &frame[..frame.len() - 1];
        match serde_json::from_slice::<Envelope>(line) {
            Ok(envelope) => out.push(envelope),
            Err(err) => log::warn!("dropping malformed frame: {}", err),
        }
    }
    out
}

/// A [`Transport`] backed by a single TCP connection to the endpoint named
/// by this replica's own id (spec §6: "the replica opens a single stream
/// connection to an endpoint named by its own id").
pub struct TcpTransport {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TcpTransport {
    /// Connects to `addr` and configures it for the event loop's 10 ms
    /// poll quantum.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ReplicaError> {
        let stream = TcpStream::connect(addr).map_err(ReplicaError::Connect)?;
        stream.set_nodelay(true).map_err(ReplicaError::Connect)?;
        Ok(Self { stream, buf: Vec::new() })
    }
}

impl Transport for TcpTransport {
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Envelope>> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk) {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "network substrate closed the connection")),
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(drain_frames(&mut self.buf))
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    fn send(&mut self, envelope: &Envelope) -> io::Result<()> {
        let mut line = serde_json::to_vec(envelope).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        line.push(b'\n');
        self.stream.write_all(&line)
    }
}

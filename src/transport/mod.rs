pub mod client;
pub mod server;

use std::cmp::min;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::mem::size_of;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;

use crate::checksum::{Checksum, Summary};
use crate::config::parse_address;
use crate::error::{Error, Result};
use crate::proto::CHUNK_SIZE;

/// Size of the bincode-encoded length that precedes each message.
pub const LEN_PREFIX_SIZE: usize = size_of::<u64>();

/// How message boundaries are marked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Framing {
    /// Each message starts with its length as a bincode u64.
    LengthPrefixed,
    /// A message ends at the first read shorter than [`CHUNK_SIZE`]. A payload
    /// whose length is an exact multiple of the chunk size leaves the receiver
    /// waiting for one more chunk, and small messages sent back to back may
    /// arrive in one read. The payload that ends a session runs until the
    /// peer closes, see [`Connection::save_last_as`].
    Legacy,
}

impl Default for Framing {
    fn default() -> Self {
        Framing::LengthPrefixed
    }
}

/// A byte stream that can be shut down in both directions.
pub trait Endpoint: Read + Write {
    fn shutdown(&self) -> io::Result<()>;
}

impl Endpoint for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconnected,
    Connected,
    Closed,
}

/// One transfer session over a byte stream.
pub struct Connection<T: Endpoint = TcpStream> {
    stream: Option<T>,
    state: State,
    host: Option<String>,
    port: Option<u16>,
    framing: Framing,
    timeout: Option<Duration>,
}

impl Connection<TcpStream> {
    /// Creates an unconnected connection. Host and port given here take
    /// precedence over the ones passed to [`Connection::connect`].
    pub fn new(host: Option<&str>, port: Option<u16>) -> Self {
        Self {
            stream: None,
            state: State::Unconnected,
            host: host.map(str::to_owned),
            port,
            framing: Framing::default(),
            timeout: None,
        }
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Applies to connect, reads and writes. `None` keeps the OS defaults.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect(&mut self, host: Option<&str>, port: Option<u16>) -> Result<()> {
        match self.state {
            State::Unconnected => {}
            State::Connected => return Err(Error::Protocol("already connected".into())),
            State::Closed => return Err(Error::ConnectionClosed),
        }

        let host = self
            .host
            .clone()
            .or_else(|| host.map(str::to_owned))
            .ok_or_else(|| Error::Configuration("no server specified".into()))?;
        let port = self
            .port
            .or(port)
            .ok_or_else(|| Error::Configuration("no server port specified".into()))?;
        let addr = SocketAddr::from((parse_address(&host)?, port));

        let connected = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        let stream = connected.map_err(|source| Error::Connect { addr, source })?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        log::info!("Connected to {}", addr);

        self.host = Some(host);
        self.port = Some(port);
        self.stream = Some(stream);
        self.state = State::Connected;
        Ok(())
    }
}

impl<T: Endpoint> Connection<T> {
    /// Wraps an already established stream.
    pub fn from_stream(stream: T, framing: Framing) -> Self {
        Self {
            stream: Some(stream),
            state: State::Connected,
            host: None,
            port: None,
            framing,
            timeout: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    #[cfg(test)]
    pub(crate) fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn port(&self) -> Option<u16> {
        self.port
    }

    fn stream(&mut self) -> Result<&mut T> {
        match self.state {
            State::Connected => self.stream.as_mut().ok_or(Error::NotConnected),
            State::Unconnected => Err(Error::NotConnected),
            State::Closed => Err(Error::ConnectionClosed),
        }
    }

    pub fn send_bytes(&mut self, payload: &[u8]) -> Result<()> {
        let framing = self.framing;
        let stream = self.stream()?;
        if framing == Framing::LengthPrefixed {
            write_len(stream, payload.len() as u64)?;
        }
        for chunk in payload.chunks(CHUNK_SIZE) {
            stream.write_all(chunk).map_err(Error::from_write)?;
        }
        stream.flush().map_err(Error::from_write)?;
        log::debug!("Sent {} bytes", payload.len());
        Ok(())
    }

    pub fn send_text(&mut self, message: &str) -> Result<()> {
        log::debug!("> {}", message);
        self.send_bytes(message.as_bytes())
    }

    /// Streams a file chunk by chunk; the file is never held in memory whole.
    pub fn send_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Summary> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| Error::from_open(e, path))?;
        let len = file.metadata()?.len();

        let framing = self.framing;
        let stream = self.stream()?;
        if framing == Framing::LengthPrefixed {
            write_len(stream, len)?;
        }

        let mut checksum = Checksum::new();
        let mut buf = [0u8; CHUNK_SIZE];
        let mut source = (&mut file).take(len);
        loop {
            let n = fill_chunk(&mut source, &mut buf)?;
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).map_err(Error::from_write)?;
            checksum.update(&buf[..n]);
            if n < CHUNK_SIZE {
                break;
            }
        }
        stream.flush().map_err(Error::from_write)?;

        // The length prefix is already on the wire.
        if checksum.bytes() != len {
            return Err(Error::Protocol(format!(
                "{} shrank while sending: {} of {} bytes",
                path.display(),
                checksum.bytes(),
                len
            )));
        }
        let summary = checksum.finish();
        log::info!("Sent {} ({})", path.display(), summary);
        Ok(summary)
    }

    /// Receives one message into `sink`, chunk by chunk.
    pub fn receive_into<W: Write>(&mut self, sink: &mut W) -> Result<Summary> {
        let framing = self.framing;
        let stream = self.stream()?;
        let mut checksum = Checksum::new();
        let mut buf = [0u8; CHUNK_SIZE];

        match framing {
            Framing::LengthPrefixed => {
                let mut remaining = read_len(stream)?;
                while remaining > 0 {
                    let want = min(remaining, CHUNK_SIZE as u64) as usize;
                    stream.read_exact(&mut buf[..want]).map_err(Error::from_read)?;
                    sink.write_all(&buf[..want])?;
                    checksum.update(&buf[..want]);
                    remaining -= want as u64;
                }
            }
            Framing::Legacy => loop {
                let n = read_chunk(stream, &mut buf)?;
                sink.write_all(&buf[..n])?;
                checksum.update(&buf[..n]);
                if n < CHUNK_SIZE {
                    break;
                }
            },
        }

        let summary = checksum.finish();
        log::debug!("Received {}", summary);
        Ok(summary)
    }

    pub fn receive_bytes(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.receive_into(&mut data)?;
        Ok(data)
    }

    pub fn receive_text(&mut self) -> Result<String> {
        let text = String::from_utf8(self.receive_bytes()?)?;
        log::debug!("< {}", text);
        Ok(text)
    }

    /// Reads whatever the peer sends until it closes its side.
    pub fn receive_to_end<W: Write>(&mut self, sink: &mut W) -> Result<Summary> {
        let stream = self.stream()?;
        let mut checksum = Checksum::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = read_chunk(stream, &mut buf)?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
            checksum.update(&buf[..n]);
        }

        let summary = checksum.finish();
        log::debug!("Received {} until close", summary);
        Ok(summary)
    }

    /// Receives one message into a new file at `path`. An existing file is
    /// never overwritten. A partially received file is left on disk.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<Summary> {
        self.save(path.as_ref(), false)
    }

    /// Like [`Connection::save_as`], for the payload that ends the session.
    /// With legacy framing it is read until the peer closes, since a short
    /// read says nothing about where a large file ends.
    pub fn save_last_as<P: AsRef<Path>>(&mut self, path: P) -> Result<Summary> {
        let to_end = self.framing == Framing::Legacy;
        self.save(path.as_ref(), to_end)
    }

    fn save(&mut self, path: &Path, to_end: bool) -> Result<Summary> {
        // Fail on a closed connection before touching the filesystem.
        self.stream()?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| Error::from_open(e, path))?;

        let mut writer = BufWriter::new(file);
        let summary = if to_end {
            self.receive_to_end(&mut writer)?
        } else {
            self.receive_into(&mut writer)?
        };
        writer.flush()?;
        log::info!("Saved {} ({})", path.display(), summary);
        Ok(summary)
    }

    /// Shuts down both directions and releases the stream. Calling it again,
    /// or after the peer went away, is not an error.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;

        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown() {
                match e.kind() {
                    io::ErrorKind::NotConnected
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe => {
                        log::debug!("Peer already closed the connection: {}", e)
                    }
                    _ => return Err(e.into()),
                }
            }
        }
        log::debug!("Connection closed");
        Ok(())
    }
}

fn write_len<W: Write>(stream: &mut W, len: u64) -> Result<()> {
    stream
        .write_all(&bincode::serialize(&len)?)
        .map_err(Error::from_write)
}

fn read_len<R: Read>(stream: &mut R) -> Result<u64> {
    let mut buf = [0u8; LEN_PREFIX_SIZE];
    stream.read_exact(&mut buf).map_err(Error::from_read)?;
    Ok(bincode::deserialize(&buf)?)
}

/// A single read of at most one chunk; zero means the peer closed.
fn read_chunk<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_read(e)),
        }
    }
}

/// Reads until `buf` is full or the source is exhausted.
fn fill_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

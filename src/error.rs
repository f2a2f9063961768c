//! Error types for filexfer.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by connections, protocol flows and configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the socket or the local filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Missing or invalid address, port, action or filename.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying TCP connect failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connection is not open")]
    NotConnected,

    /// The connection was closed locally; it cannot be reused.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer closed the stream in the middle of a message.
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("message is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Length prefix could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("operation timed out")]
    Timeout,

    /// Malformed request or inconsistent payload.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Maps an error raised while reading from the stream.
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            io::ErrorKind::UnexpectedEof => Error::PeerClosed,
            _ => Error::Io(err),
        }
    }

    /// Maps an error raised while writing to the stream.
    pub(crate) fn from_write(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(err),
        }
    }

    /// Maps an error raised while opening a local file.
    pub(crate) fn from_open(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.into()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.into()),
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;
use std::net::TcpStream;
use std::path::Path;

use crate::checksum::Summary;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::proto::{self, Action, TransferRequest, FILE_NOT_FOUND, READY, SENDING};
use crate::transport::{Connection, Endpoint, Framing};

/// Why the server turned a request down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The server answered with something other than the expected `READY`.
    NotReady(String),
    FileNotFound,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotReady(_) => {
                f.write_str("Server not ready to transfer file. Please try again.")
            }
            Rejection::FileNotFound => f.write_str("Server cannot find file. Please try again."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Uploaded(Summary),
    Downloaded {
        /// Size from the `SENDING` reply; informational only.
        announced: u64,
        summary: Summary,
    },
    Rejected(Rejection),
}

pub struct Client<'a> {
    config: &'a Config,
}

impl<'a> Client<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<Outcome> {
        match self.config.action() {
            Action::Upload => self.upload(),
            Action::Download => self.download(),
        }
    }

    pub fn upload(&self) -> Result<Outcome> {
        let path = &self.config.filename;
        if !path.is_file() {
            return Err(Error::FileNotFound(path.clone()));
        }
        let mut conn = self.connect()?;
        let result = upload(&mut conn, path);
        close_quietly(&mut conn);
        result
    }

    pub fn download(&self) -> Result<Outcome> {
        let path = &self.config.filename;
        if path.exists() {
            return Err(Error::AlreadyExists(path.clone()));
        }
        let mut conn = self.connect()?;
        let result = download(&mut conn, path);
        close_quietly(&mut conn);
        result
    }

    fn connect(&self) -> Result<Connection<TcpStream>> {
        let host = self.config.server.to_string();
        let mut conn = Connection::new(Some(host.as_str()), Some(self.config.port))
            .with_framing(self.config.framing)
            .with_timeout(self.config.timeout);
        conn.connect(None, None)?;
        Ok(conn)
    }
}

fn close_quietly<T: Endpoint>(conn: &mut Connection<T>) {
    if let Err(e) = conn.close() {
        log::debug!("Ignoring error on close: {}", e);
    }
}

/// Name sent to the server: the final component of the local path.
fn remote_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::Configuration(format!("'{}' has no usable file name", path.display()))
        })
}

/// Upload over an open connection. Expects the caller to have checked that
/// `path` exists.
pub fn upload<T: Endpoint>(conn: &mut Connection<T>, path: &Path) -> Result<Outcome> {
    let request = TransferRequest::new(Action::Upload, remote_name(path)?);
    conn.send_text(&request.to_string())?;

    let reply = conn.receive_text()?;
    if !proto::accepts_upload(&reply) {
        log::warn!("Upload of {} refused: '{}'", path.display(), reply);
        return Ok(Outcome::Rejected(Rejection::NotReady(reply)));
    }

    log::info!("Uploading file {}", path.display());
    let summary = conn.send_file(path)?;
    Ok(Outcome::Uploaded(summary))
}

/// Download over an open connection into `path`.
pub fn download<T: Endpoint>(conn: &mut Connection<T>, path: &Path) -> Result<Outcome> {
    let request = TransferRequest::new(Action::Download, remote_name(path)?);
    conn.send_text(&request.to_string())?;

    let reply = conn.receive_text()?;
    if conn.framing() == Framing::Legacy && reply.starts_with(READY) && reply != READY {
        return Err(Error::Protocol(format!(
            "server replies arrived as one message: '{}'",
            reply.escape_debug()
        )));
    }
    if !proto::accepts_download(&reply) {
        log::warn!("Download of {} refused: '{}'", path.display(), reply);
        return Ok(Outcome::Rejected(Rejection::NotReady(reply)));
    }

    let reply = conn.receive_text()?;
    if reply.contains(SENDING) {
        // Anything past the size means file bytes ran into the reply.
        let announced = proto::announced_size(&reply).ok_or_else(|| {
            Error::Protocol(format!("malformed reply '{}'", reply.escape_debug()))
        })?;
        log::info!("Downloading file {} with {} bytes", path.display(), announced);
        let summary = conn.save_last_as(path)?;
        // Digits from the file can also extend the size undetected.
        if conn.framing() == Framing::Legacy && summary.bytes != announced {
            return Err(Error::Protocol(format!(
                "server announced {} bytes but sent {}",
                announced, summary.bytes
            )));
        }
        Ok(Outcome::Downloaded { announced, summary })
    } else if reply.contains(FILE_NOT_FOUND) {
        log::warn!("Server cannot find {}", path.display());
        Ok(Outcome::Rejected(Rejection::FileNotFound))
    } else {
        log::warn!("Unexpected reply to download of {}: '{}'", path.display(), reply);
        Ok(Outcome::Rejected(Rejection::NotReady(reply)))
    }
}

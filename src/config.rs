//! Command-line configuration for the client and server binaries.
//!
//! Arguments are parsed and validated once at start-up into [`Config`] or
//! [`ServerConfig`], which are then passed explicitly to the components that
//! need them.

use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use crate::error::{Error, Result};
use crate::proto::Action;
use crate::transport::Framing;

/// Parses a dotted IPv4 address, accepting `localhost` as the loopback alias.
pub fn parse_address(s: &str) -> Result<Ipv4Addr> {
    if s == "localhost" {
        return Ok(Ipv4Addr::LOCALHOST);
    }
    let invalid = || Error::Configuration(format!("invalid server address '{}'", s));

    let mut octets = [0u8; 4];
    let mut groups = s.trim().split('.');
    for octet in octets.iter_mut() {
        let group = groups.next().ok_or_else(invalid)?;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u16 = group.parse().map_err(|_| invalid())?;
        *octet = u8::try_from(value).map_err(|_| invalid())?;
    }
    if groups.next().is_some() {
        return Err(invalid());
    }
    Ok(Ipv4Addr::from(octets))
}

pub fn parse_port(s: &str) -> Result<u16> {
    let port: i64 = s
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("invalid port '{}'", s)))?;
    u16::try_from(port)
        .map_err(|_| Error::Configuration(format!("port {} out of range 0-65535", port)))
}

fn parse_timeout(s: &str) -> Result<Duration> {
    match s.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Configuration(format!(
            "invalid timeout '{}', expected a positive number of seconds",
            s
        ))),
    }
}

/// Upload a file to, or download a file from, a file server.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "client", version)]
#[command(group(ArgGroup::new("action").required(true).args(["upload", "download"])))]
pub struct Config {
    /// Server IPv4 address or 'localhost'
    #[arg(short = 's', long = "server", value_parser = parse_address)]
    pub server: Ipv4Addr,

    /// Server port (0-65535)
    #[arg(short = 'p', long = "port", value_parser = parse_port, allow_negative_numbers = true)]
    pub port: u16,

    /// Upload FILE to the server
    #[arg(short = 'u', long = "upload")]
    pub upload: bool,

    /// Download FILE from the server
    #[arg(short = 'd', long = "download")]
    pub download: bool,

    /// Target file name
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub filename: PathBuf,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Message framing; 'legacy' speaks the original short-chunk wire format
    #[arg(long = "framing", value_enum, default_value = "length-prefixed")]
    pub framing: Framing,

    /// Socket timeout in seconds
    #[arg(short = 't', long = "timeout", value_parser = parse_timeout, value_name = "SECS")]
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new(server: Ipv4Addr, port: u16, action: Action, filename: impl Into<PathBuf>) -> Self {
        Self {
            server,
            port,
            upload: action == Action::Upload,
            download: action == Action::Download,
            filename: filename.into(),
            verbose: false,
            framing: Framing::default(),
            timeout: None,
        }
    }

    pub fn action(&self) -> Action {
        if self.upload {
            Action::Upload
        } else {
            Action::Download
        }
    }
}

/// Serve a directory to file transfer clients.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "server", version)]
pub struct ServerConfig {
    /// Port on which to make the file server available
    #[arg(short = 'p', long = "port", value_parser = parse_port, allow_negative_numbers = true)]
    pub port: u16,

    /// Directory in which to store files, and from which to serve them
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: PathBuf,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Message framing; 'legacy' speaks the original short-chunk wire format
    #[arg(long = "framing", value_enum, default_value = "length-prefixed")]
    pub framing: Framing,

    /// Socket timeout in seconds
    #[arg(short = 't', long = "timeout", value_parser = parse_timeout, value_name = "SECS")]
    pub timeout: Option<Duration>,
}

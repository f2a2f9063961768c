use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum size of a single socket read or write.
pub const CHUNK_SIZE: usize = 1024;

pub const READY: &str = "READY";
pub const SENDING: &str = "SENDING";
pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
pub const ERROR: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    Download,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Upload => f.write_str("UPLOAD"),
            Action::Download => f.write_str("DOWNLOAD"),
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UPLOAD" => Ok(Action::Upload),
            "DOWNLOAD" => Ok(Action::Download),
            other => Err(Error::Configuration(format!(
                "invalid action '{}', expected UPLOAD or DOWNLOAD",
                other
            ))),
        }
    }
}

/// `UPLOAD <filename>` or `DOWNLOAD <filename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub action: Action,
    pub filename: String,
}

impl TransferRequest {
    pub fn new(action: Action, filename: impl Into<String>) -> Self {
        Self {
            action,
            filename: filename.into(),
        }
    }

    /// Parses a request received by the server. The filename is everything
    /// after the first space, so names may themselves contain spaces.
    pub fn parse(text: &str) -> Result<Self> {
        let (action, filename) = text
            .split_once(' ')
            .ok_or_else(|| Error::Protocol(format!("malformed request '{}'", text)))?;
        let action = action
            .parse()
            .map_err(|_| Error::Protocol(format!("unknown request '{}'", action)))?;
        if filename.is_empty() {
            return Err(Error::Protocol("request carries no filename".into()));
        }
        Ok(Self::new(action, filename))
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.filename)
    }
}

/// Control messages sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ready,
    Sending(u64),
    FileNotFound,
    Error,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ready => f.write_str(READY),
            Reply::Sending(size) => write!(f, "{} {}", SENDING, size),
            Reply::FileNotFound => f.write_str(FILE_NOT_FOUND),
            Reply::Error => f.write_str(ERROR),
        }
    }
}

/// Upload acceptance is a substring match on `READY`.
pub fn accepts_upload(reply: &str) -> bool {
    reply.contains(READY)
}

/// Download acceptance requires the reply to be exactly `READY`.
pub fn accepts_download(reply: &str) -> bool {
    reply == READY
}

/// Byte count announced by a `SENDING <n>` reply, if it parses.
pub fn announced_size(reply: &str) -> Option<u64> {
    reply
        .split_once(' ')
        .and_then(|(_, size)| size.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_format() {
        let request = TransferRequest::new(Action::Upload, "a.txt");
        assert_eq!(request.to_string(), "UPLOAD a.txt");
        let request = TransferRequest::new(Action::Download, "b.txt");
        assert_eq!(request.to_string(), "DOWNLOAD b.txt");
    }

    #[test]
    fn test_request_parse() {
        let request = TransferRequest::parse("DOWNLOAD my notes.txt").unwrap();
        assert_eq!(request.action, Action::Download);
        assert_eq!(request.filename, "my notes.txt");

        assert!(matches!(
            TransferRequest::parse("DELETE a.txt"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            TransferRequest::parse("UPLOAD"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            TransferRequest::parse("UPLOAD "),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!("UPLOAD".parse::<Action>().unwrap(), Action::Upload);
        assert!(matches!(
            "RENAME".parse::<Action>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_reply_format() {
        assert_eq!(Reply::Ready.to_string(), "READY");
        assert_eq!(Reply::Sending(5).to_string(), "SENDING 5");
        assert_eq!(Reply::FileNotFound.to_string(), "FILE_NOT_FOUND");
        assert_eq!(Reply::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_ready_matching() {
        assert!(accepts_upload("READY"));
        assert!(accepts_upload("ALREADY READY"));
        assert!(!accepts_upload("BUSY"));

        assert!(accepts_download("READY"));
        assert!(!accepts_download("READY "));
        assert!(!accepts_download("ALREADY READY"));
    }

    #[test]
    fn test_announced_size() {
        assert_eq!(announced_size("SENDING 5"), Some(5));
        assert_eq!(announced_size("SENDING lots"), None);
        assert_eq!(announced_size("SENDING"), None);
    }
}

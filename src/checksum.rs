use sha2::{Digest, Sha256};
use std::fmt;

/// Byte count and SHA-256 of a payload that went over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub bytes: u64,
    pub sha256: String,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes, sha256 {}", self.bytes, self.sha256)
    }
}

/// Running checksum, fed chunk by chunk while streaming.
#[derive(Default)]
pub struct Checksum {
    hasher: Sha256,
    bytes: u64,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> Summary {
        Summary {
            bytes: self.bytes,
            sha256: format!("{:x}", self.hasher.finalize()),
        }
    }
}

/// Summary of an in-memory payload.
#[cfg(test)]
pub(crate) fn summarize(data: &[u8]) -> Summary {
    let mut checksum = Checksum::new();
    checksum.update(data);
    checksum.finish()
}

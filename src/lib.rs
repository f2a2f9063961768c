pub mod checksum;
pub mod config;
pub mod error;
pub mod proto;
pub mod transport;

pub use error::{Error, Result};

/// Initializes `env_logger`; `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

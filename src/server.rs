use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;

use filexfer::config::ServerConfig;
use filexfer::transport::server::Server;

fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    filexfer::init_logging(config.verbose);

    let server = Server::new(&config.dir)?
        .with_framing(config.framing)
        .with_timeout(config.timeout);
    log::info!("Serving {}", server.root().display());
    server.run(SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)))?;
    Ok(())
}

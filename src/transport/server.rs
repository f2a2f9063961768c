use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::proto::{Action, Reply, TransferRequest};
use crate::transport::{Connection, Endpoint, Framing};

/// Serves uploads into and downloads from a single directory.
pub struct Server {
    root: PathBuf,
    framing: Framing,
    timeout: Option<Duration>,
}

impl Server {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Configuration(format!(
                "target directory {} does not exist",
                root.display()
            )));
        }
        Ok(Server {
            root,
            framing: Framing::default(),
            timeout: None,
        })
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a requested name to a path directly inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) if file == name => Ok(self.root.join(file)),
            _ => Err(Error::Protocol(format!("refusing file name '{}'", name))),
        }
    }

    pub(crate) fn handle_connection<T: Endpoint>(&self, conn: &mut Connection<T>) -> Result<()> {
        let text = conn.receive_text()?;
        let request = match TransferRequest::parse(&text) {
            Ok(request) => request,
            Err(e) => {
                log::error!("Client sent invalid command '{}': {}", text, e);
                return conn.send_text(&Reply::Error.to_string());
            }
        };

        let path = match self.resolve(&request.filename) {
            Ok(path) => path,
            Err(e) => {
                log::error!("{}", e);
                return conn.send_text(&Reply::Error.to_string());
            }
        };

        match request.action {
            Action::Upload => {
                if path.exists() {
                    log::error!("Refusing to overwrite {}", path.display());
                    return conn.send_text(&Reply::Error.to_string());
                }
                conn.send_text(&Reply::Ready.to_string())?;
                log::info!("Receiving file {}", path.display());
                conn.save_last_as(&path)?;
            }
            Action::Download => {
                conn.send_text(&Reply::Ready.to_string())?;
                if path.is_file() {
                    let size = path.metadata()?.len();
                    conn.send_text(&Reply::Sending(size).to_string())?;
                    log::info!("Sending file {}", path.display());
                    conn.send_file(&path)?;
                } else {
                    log::info!("Requested file {} not found", path.display());
                    conn.send_text(&Reply::FileNotFound.to_string())?;
                }
            }
        }
        Ok(())
    }

    fn handle_stream(&self, stream: TcpStream) -> Result<()> {
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        // Legacy clients split messages on read boundaries.
        stream.set_nodelay(self.framing == Framing::Legacy)?;
        let mut conn = Connection::from_stream(stream, self.framing);
        let result = self.handle_connection(&mut conn);
        if let Err(e) = conn.close() {
            log::debug!("Ignoring error on close: {}", e);
        }
        log::info!("Connection closed");
        result
    }

    fn run_listener(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        log::info!("Listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            let server_clone = self.clone();
            match stream {
                Ok(stream) => {
                    match stream.peer_addr() {
                        Ok(peer) => log::info!("New TCP connection: {}", peer),
                        Err(e) => log::info!("New TCP connection (peer unknown: {})", e),
                    }
                    thread::spawn(move || {
                        if let Err(e) = server_clone.handle_stream(stream) {
                            log::error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Error establishing TCP connection: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Accepts connections on `listener` until it fails.
    pub fn serve(self, listener: TcpListener) -> Result<()> {
        Arc::new(self).run_listener(listener)
    }

    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }
}

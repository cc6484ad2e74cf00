//! # Summary
//!
//! This module abstracts over remote invocation of peer operations.
//!
//! The `TcpTransport` opens one connection per call, writes a single
//! bincode-encoded `Request`, and blocks until the bincode-encoded `Reply`
//! arrives. `serve` is the matching server side: it accepts connections on a
//! listener and answers each one on its own thread, so a slow handler (an
//! election wave waiting out its timeout, say) never blocks other callers.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::{Notice, Reply, Request};

/// Anything that can answer peer requests.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> Reply;
}

/// Synchronous request/response delivery to remote peers.
pub trait Transport: Send + Sync + 'static {
    /// Invokes `request` on the peer at `addr`, blocking until it returns.
    fn call(&self, addr: &str, request: Request) -> Result<Reply>;

    /// Delivers a notice to the ledger service at `addr` without waiting.
    fn notify(&self, addr: &str, notice: Notice) -> Result<()>;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TcpTransport {
    /// Read and write timeout on every connection
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new() -> Self {
        TcpTransport::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn connect(&self, addr: &str) -> Result<TcpStream> {
        let stream = TcpStream::connect(addr)
            .map_err(|source| Error::Unreachable { addr: addr.to_string(), source })?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Transport for TcpTransport {
    fn call(&self, addr: &str, request: Request) -> Result<Reply> {
        let mut stream = self.connect(addr)?;
        bincode::serialize_into(&mut stream, &request)?;
        stream.flush()?;
        Ok(bincode::deserialize_from(&mut stream)?)
    }

    fn notify(&self, addr: &str, notice: Notice) -> Result<()> {
        let mut stream = self.connect(addr)?;
        bincode::serialize_into(&mut stream, &notice)?;
        stream.flush()?;
        Ok(())
    }
}

/// Answers requests arriving on `listener` until the listener fails.
pub fn serve(listener: TcpListener, handler: Arc<dyn Handler>) -> Result<thread::JoinHandle<()>> {
    let addr = listener.local_addr()?;
    info!("listening on {}", addr);
    let server = thread::Builder::new()
        .name(format!("serve-{}", addr))
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                | Ok(stream) => {
                    let handler = handler.clone();
                    thread::spawn(move || respond(stream, &*handler));
                }
                | Err(err) => warn!("failed to accept connection: {}", err),
                }
            }
        })?;
    Ok(server)
}

fn respond(mut stream: TcpStream, handler: &dyn Handler) {
    let request: Request = match bincode::deserialize_from(&mut stream) {
    | Ok(request) => request,
    | Err(err) => {
        debug!("dropping malformed request: {}", err);
        return
    }
    };
    let reply = handler.handle(request);
    if let Err(err) = bincode::serialize_into(&mut stream, &reply) {
        debug!("failed to reply: {}", err);
    }
}

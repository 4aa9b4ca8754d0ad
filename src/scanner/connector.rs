use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// Makes a single connect attempt against a socket.
///
/// The scanner only cares whether the attempt succeeded; the error is kept
/// as the reason an endpoint is unreachable.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, socket: SocketAddr) -> impl Future<Output = io::Result<()>> + Send;
}

/// Plain TCP connect with a timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Connector for TcpConnector {
    /// Connects, then shuts the stream down straight away.
    ///
    /// A timeout is reported as an `io::ErrorKind::TimedOut` error.
    async fn connect(&self, socket: SocketAddr) -> io::Result<()> {
        let mut stream = time::timeout(self.timeout, TcpStream::connect(socket)).await??;

        debug!("Connection was successful, shutting down stream {socket}");
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown stream error {e}");
        }
        Ok(())
    }
}

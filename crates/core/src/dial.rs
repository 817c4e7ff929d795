//! Connection factory and transport traits
//!
//! A [`Dial`] is a zero-argument factory producing a fresh byte-stream
//! transport on demand; it is usually pre-configured with an address and a
//! connect timeout. The [`ReusableConn`](crate::conn::ReusableConn) wraps a
//! dialer and owns at most one live transport at a time.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A bidirectional byte stream with per-operation time budgets.
///
/// Read/write timeouts are fallible to set so that callers can persist a
/// timeout only once the transport has actually accepted it; a timeout that
/// fires manifests as `io::ErrorKind::TimedOut` from the read or write.
#[async_trait]
pub trait Transport: Send {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Factory for live transports.
///
/// Implementations carry whatever address/timeout configuration they need;
/// `dial` itself takes no arguments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dial: Send + Sync {
    async fn dial(&self) -> io::Result<Box<dyn Transport>>;
}

/// TCP connection factory with a bounded connect time
#[derive(Debug, Clone)]
pub struct TcpDialer {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Dial for TcpDialer {
    async fn dial(&self) -> io::Result<Box<dyn Transport>> {
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {}:{} timed out", self.host, self.port),
            )
        })??;
        stream.set_nodelay(true)?;
        tracing::debug!(host = %self.host, port = self.port, "dialed new connection");
        Ok(Box::new(TcpTransport {
            stream,
            read_timeout: None,
            write_timeout: None,
        }))
    }
}

/// TCP transport applying stored timeouts to each read/write
struct TcpTransport {
    stream: TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl TcpTransport {
    fn timed_out(op: &str) -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, format!("{op} timed out"))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_timeout {
            Some(t) => tokio::time::timeout(t, self.stream.read(buf))
                .await
                .map_err(|_| Self::timed_out("read"))?,
            None => self.stream.read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.write_timeout {
            Some(t) => tokio::time::timeout(t, self.stream.write(buf))
                .await
                .map_err(|_| Self::timed_out("write"))?,
            None => self.stream.write(buf).await,
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.write_timeout = timeout;
        Ok(())
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

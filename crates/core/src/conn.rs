//! Reusable connection
//!
//! [`ReusableConn`] is a synchronized wrapper around a [`Dial`] / transport
//! pair. The transport is established lazily on first use; any I/O error
//! closes it so the next operation redials transparently. Errors are always
//! bubbled up to the caller, and no operation is ever retried here.
//!
//! Public methods acquire the session mutex exactly once and delegate to
//! private helpers that take the locked state; the guard is dropped on every
//! exit path, including unwinding out of a faulting transport.

use std::io;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::dial::{Dial, Transport};
use crate::error::Result;

/// State guarded by the session mutex
struct ConnState {
    transport: Option<Box<dyn Transport>>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

/// A lazily-(re)dialing connection around a single transport.
///
/// Read/write timeouts set by the caller survive replacement of the
/// underlying transport and are reapplied to every freshly dialed one.
pub struct ReusableConn {
    dialer: Box<dyn Dial>,
    state: Mutex<ConnState>,
}

impl ReusableConn {
    /// Create a reusable connection with a specific dialer.
    ///
    /// No connection is made until the first operation needs one.
    pub fn new(dialer: Box<dyn Dial>) -> Self {
        Self::with_timeouts(dialer, None, None)
    }

    /// Create a reusable connection with timeouts recorded up front.
    ///
    /// Still lazy: the timeouts are applied to the transport once the first
    /// operation establishes it, exactly as if they had survived a redial.
    pub fn with_timeouts(
        dialer: Box<dyn Dial>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            dialer,
            state: Mutex::new(ConnState {
                transport: None,
                read_timeout,
                write_timeout,
            }),
        }
    }

    /// Establish the connection if it is not already live. Idempotent.
    pub async fn dial(&self) -> Result<()> {
        let mut st = self.state.lock().await;
        self.dial_locked(&mut st).await?;
        Ok(())
    }

    /// Close the live transport, if any.
    ///
    /// Unlike close on a plain socket, closing an already-closed connection
    /// is not an error; callers need not track connection state.
    pub async fn close(&self) -> Result<()> {
        let mut st = self.state.lock().await;
        Self::close_locked(&mut st).await?;
        Ok(())
    }

    /// Read from the connection, dialing first if needed.
    ///
    /// A failed read discards the transport (the next call redials) and the
    /// read error is returned as-is.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut st = self.state.lock().await;
        self.read_locked(&mut st, buf).await
    }

    /// Write to the connection, dialing first if needed.
    ///
    /// A failed write discards the transport; the write error is returned.
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut st = self.state.lock().await;
        self.write_locked(&mut st, buf).await
    }

    /// Write an entire buffer, dialing first if needed.
    pub async fn write_all(&self, buf: &[u8]) -> Result<()> {
        let mut st = self.state.lock().await;
        let mut written = 0;
        while written < buf.len() {
            let n = self.write_locked(&mut st, &buf[written..]).await?;
            if n == 0 {
                Self::close_locked(&mut st).await.ok();
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0").into());
            }
            written += n;
        }
        Ok(())
    }

    /// Set the read timeout on the live transport and record it for any
    /// future redial. The recorded value is only updated if the live
    /// transport accepted it.
    pub async fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut st = self.state.lock().await;
        self.dial_locked(&mut st).await?;
        // dial_locked guarantees a live transport on success
        st.transport
            .as_mut()
            .ok_or_else(not_connected)?
            .set_read_timeout(timeout)?;
        st.read_timeout = timeout;
        Ok(())
    }

    /// Set the write timeout on the live transport and record it for any
    /// future redial. See [`ReusableConn::set_read_timeout`].
    pub async fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut st = self.state.lock().await;
        self.dial_locked(&mut st).await?;
        st.transport
            .as_mut()
            .ok_or_else(not_connected)?
            .set_write_timeout(timeout)?;
        st.write_timeout = timeout;
        Ok(())
    }

    /// Convenience for setting both read and write timeouts
    pub async fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_read_timeout(timeout).await?;
        self.set_write_timeout(timeout).await
    }

    /// Dial if no transport is live, reapplying recorded timeouts.
    ///
    /// On a timeout-reapply failure the fresh transport is still stored, so
    /// the caller may retry setting timeouts without redialing.
    async fn dial_locked(&self, st: &mut MutexGuard<'_, ConnState>) -> Result<()> {
        if st.transport.is_some() {
            return Ok(());
        }
        tracing::debug!("establishing connection");
        let mut transport = self.dialer.dial().await?;
        let mut applied = Ok(());
        if let Some(t) = st.read_timeout {
            applied = transport.set_read_timeout(Some(t));
        }
        if applied.is_ok()
            && let Some(t) = st.write_timeout
        {
            applied = transport.set_write_timeout(Some(t));
        }
        st.transport = Some(transport);
        applied?;
        Ok(())
    }

    async fn close_locked(st: &mut MutexGuard<'_, ConnState>) -> Result<()> {
        if let Some(mut transport) = st.transport.take() {
            tracing::debug!("closing connection");
            transport.shutdown().await?;
        }
        Ok(())
    }

    async fn read_locked(&self, st: &mut MutexGuard<'_, ConnState>, buf: &mut [u8]) -> Result<usize> {
        self.dial_locked(st).await?;
        let transport = st.transport.as_mut().ok_or_else(not_connected)?;
        match transport.read(buf).await {
            Ok(n) => Ok(n),
            Err(e) => {
                tracing::debug!(error = %e, "read failed, discarding connection");
                Self::close_locked(st).await.ok();
                Err(e.into())
            }
        }
    }

    async fn write_locked(&self, st: &mut MutexGuard<'_, ConnState>, buf: &[u8]) -> Result<usize> {
        self.dial_locked(st).await?;
        let transport = st.transport.as_mut().ok_or_else(not_connected)?;
        match transport.write(buf).await {
            Ok(n) => Ok(n),
            Err(e) => {
                tracing::debug!(error = %e, "write failed, discarding connection");
                Self::close_locked(st).await.ok();
                Err(e.into())
            }
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "underlying transport is not connected")
}

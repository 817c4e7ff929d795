//! Scripted transports for connection-layer tests.
//!
//! A [`ScriptDialer`] hands out one scripted transport per dial; each
//! transport works through its own queue of [`Step`]s while recording every
//! write and every timeout applied to it.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::dial::{Dial, Transport};

/// One scripted transport behavior
#[derive(Clone)]
pub(crate) enum Step {
    /// Serve these bytes to `read` (split across reads as needed)
    Data(Vec<u8>),
    /// Fail the next read with a connection reset
    FailRead,
    /// Fail the next write with a broken pipe
    FailWrite,
    /// Panic inside the next read or write
    Panic,
}

pub(crate) struct ScriptTransport {
    steps: VecDeque<Step>,
    written: Arc<StdMutex<Vec<u8>>>,
    timeouts: Arc<StdMutex<Vec<Option<Duration>>>>,
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            Some(Step::Data(mut d)) => {
                let n = d.len().min(buf.len());
                buf[..n].copy_from_slice(&d[..n]);
                if n < d.len() {
                    self.steps.push_front(Step::Data(d.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::FailRead) => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Some(Step::Panic) => panic!("transport fault"),
            Some(other) => {
                self.steps.push_front(other);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.steps.front() {
            Some(Step::FailWrite) => {
                self.steps.pop_front();
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"))
            }
            Some(Step::Panic) => {
                self.steps.pop_front();
                panic!("transport fault")
            }
            _ => {
                self.written.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.timeouts.lock().unwrap().push(timeout);
        Ok(())
    }

    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A transport with no script: reads report EOF, writes are dropped
pub(crate) fn null_transport() -> Box<dyn Transport> {
    Box::new(ScriptTransport {
        steps: VecDeque::new(),
        written: Arc::new(StdMutex::new(Vec::new())),
        timeouts: Arc::new(StdMutex::new(Vec::new())),
    })
}

/// Dialer serving one script per connection, in order.
///
/// Dialing past the last script yields a transport whose reads report EOF.
pub(crate) struct ScriptDialer {
    dials: AtomicUsize,
    scripts: StdMutex<VecDeque<Vec<Step>>>,
    written: Arc<StdMutex<Vec<u8>>>,
    timeouts: Arc<StdMutex<Vec<Option<Duration>>>>,
}

impl ScriptDialer {
    pub(crate) fn new(scripts: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            dials: AtomicUsize::new(0),
            scripts: StdMutex::new(scripts.into()),
            written: Arc::new(StdMutex::new(Vec::new())),
            timeouts: Arc::new(StdMutex::new(Vec::new())),
        })
    }

    /// Number of times `dial` has been invoked
    pub(crate) fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Everything written across all handed-out transports
    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    /// Timeouts applied across all handed-out transports, in order
    pub(crate) fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dial for Arc<ScriptDialer> {
    async fn dial(&self) -> io::Result<Box<dyn Transport>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptTransport {
            steps: steps.into(),
            written: self.written.clone(),
            timeouts: self.timeouts.clone(),
        }))
    }
}

//! sdc-core: Connection layer for the sdc attribute-store client
//!
//! This crate provides the transport plumbing the service crates build on:
//! - A lazily-(re)dialing reusable connection around a single transport
//! - An HTTP/1.1 request pipe bound to that connection
//! - Signature-version-2 request signing
//! - Error taxonomy, status mapping and configuration
//!
//! The connection layer reuses one socket across many logical requests and
//! transparently re-establishes it after any I/O failure. Failed operations
//! themselves are never retried here: retry policy belongs to callers.

pub mod config;
pub mod conn;
pub mod dial;
pub mod error;
pub mod pipe;
pub mod request;
pub mod sign;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ClientConfig, Credentials, DEFAULT_ENDPOINT};
pub use conn::ReusableConn;
pub use dial::{Dial, TcpDialer, Transport};
pub use error::{Error, Result, check_status};
pub use pipe::HttpPipe;
pub use request::{Request, Response};
pub use sign::Signer;

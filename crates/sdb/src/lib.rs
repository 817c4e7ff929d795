//! sdc-sdb: SimpleDB-compatible attribute-store operations
//!
//! This crate provides the service-level client over `sdc-core`'s
//! connection layer:
//! - [`Domain`]: a handle owning one persistent connection to the endpoint
//! - Single-item attribute operations (get, put, delete)
//! - [`Domain::select`]: a streaming paginated query feeding a caller-owned
//!   bounded channel

pub mod domain;
pub mod types;
pub mod wire;

pub use domain::{API_VERSION, Domain};
pub use types::{Attribute, AttributeList, Item};
pub use wire::SelectPage;

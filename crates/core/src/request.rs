//! Request and response model
//!
//! A [`Request`] carries, alongside the usual method/URL/headers/body, a set
//! of pending query parameters. Pending parameters are the staging area that
//! signing and service code fill in; they are folded into the URL's query
//! string at send time (appended with `&` if a query is already present) and
//! cleared from the request.

use http::{HeaderMap, Method, StatusCode};
use url::Url;
use url::form_urlencoded;

/// An outgoing service request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    params: Vec<(String, String)>,
}

impl Request {
    /// Create a request with no pending parameters and an empty body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Set a pending query parameter, replacing any previous value
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.params.retain(|(n, _)| *n != name);
        self.params.push((name, value.into()));
    }

    /// Remove a pending query parameter, if present
    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|(n, _)| n != name);
    }

    /// Pending parameters in insertion order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Fold pending parameters into the URL's query string.
    ///
    /// An existing query is kept and extended with `&`, never overwritten.
    /// Pending parameters are cleared afterwards; calling this with none
    /// pending is a no-op.
    pub fn merge_params(&mut self) {
        if self.params.is_empty() {
            return;
        }
        let encoded: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.drain(..))
            .finish();
        let merged = match self.url.query() {
            Some(q) if !q.is_empty() => format!("{q}&{encoded}"),
            _ => encoded,
        };
        self.url.set_query(Some(&merged));
    }
}

/// A decoded service response
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

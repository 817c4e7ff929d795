//! Request signing (signature version 2)
//!
//! The signer annotates a request's pending query parameters with identity
//! and signature fields derived from a canonical form of the request.
//! Signing failures are reported before anything is sent and are distinct
//! from transport errors.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::request::Request;

type HmacSha256 = Hmac<Sha256>;

/// Signs requests with an access-key / secret-key pair
#[derive(Debug, Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(&credentials.access_key, &credentials.secret_key)
    }

    /// Sign a request in place, stamping it with the current time.
    ///
    /// Adds the identity, signature-method, timestamp and API-version
    /// parameters, then computes the signature over the canonical request
    /// and appends it as the `Signature` parameter.
    pub fn sign_v2(&self, req: &mut Request, api_version: &str) -> Result<()> {
        self.sign_v2_at(req, api_version, jiff::Timestamp::now())
    }

    fn sign_v2_at(
        &self,
        req: &mut Request,
        api_version: &str,
        now: jiff::Timestamp,
    ) -> Result<()> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(Error::Sign("access or secret key is empty".into()));
        }
        let host = req
            .url
            .host_str()
            .ok_or_else(|| Error::Sign(format!("request URL has no host: {}", req.url)))?
            .to_ascii_lowercase();

        req.set_param("AWSAccessKeyId", &self.access_key);
        req.set_param("SignatureVersion", "2");
        req.set_param("SignatureMethod", "HmacSHA256");
        req.set_param("Version", api_version);
        req.set_param("Timestamp", now.strftime("%Y-%m-%dT%H:%M:%SZ").to_string());

        let canonical = format!(
            "{}\n{}\n{}\n{}",
            req.method,
            host,
            req.url.path(),
            canonical_query(req.params()),
        );

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| Error::Sign(e.to_string()))?;
        mac.update(canonical.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        req.set_param("Signature", signature);
        Ok(())
    }
}

/// Canonical query string: parameters sorted by byte order and
/// percent-encoded with the RFC 3986 unreserved set.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_unstable();
    let encoded: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    encoded.join("&")
}

//! Request pipe
//!
//! [`HttpPipe`] layers a one-request/one-response HTTP/1.1 exchange on top
//! of a [`ReusableConn`]. The protocol handle (parse buffer plus keep-alive
//! bookkeeping) is bound lazily to the connection and dropped whenever the
//! exchange fails or the server ends the persistent connection, so the next
//! request rebuilds it against a freshly dialed socket.

use bytes::BytesMut;
use http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::sync::Mutex;

use crate::conn::ReusableConn;
use crate::dial::Dial;
use crate::error::{Error, Result};
use crate::request::{Request, Response};

/// Protocol handle bound to the currently live transport
struct Http1 {
    /// Bytes read from the connection but not yet consumed by parsing
    buf: BytesMut,
}

/// A persistent-connection HTTP client for one endpoint
pub struct HttpPipe {
    conn: ReusableConn,
    state: Mutex<Option<Http1>>,
}

impl HttpPipe {
    pub fn new(dialer: Box<dyn Dial>) -> Self {
        Self::from_conn(ReusableConn::new(dialer))
    }

    /// Build a pipe over an existing reusable connection, keeping any
    /// timeouts already recorded on it.
    pub fn from_conn(conn: ReusableConn) -> Self {
        Self {
            conn,
            state: Mutex::new(None),
        }
    }

    /// The underlying reusable connection, for timeout configuration
    pub fn conn(&self) -> &ReusableConn {
        &self.conn
    }

    /// Send one request and read exactly one response.
    ///
    /// Pending query parameters on the request are folded into its URL
    /// before transmission. On any failure the protocol handle is dropped
    /// and the connection closed; the caller sees the original error and
    /// the next request dials afresh. Nothing is retried here.
    pub async fn request(&self, req: &mut Request) -> Result<Response> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            self.conn.dial().await?;
            *state = Some(Http1 { buf: BytesMut::new() });
        }

        req.merge_params();
        let wire = encode_request(req)?;

        let outcome = match state.as_mut() {
            Some(h) => self.round_trip(h, &wire).await,
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no protocol handle",
            ))),
        };

        match outcome {
            Ok((resp, true)) => Ok(resp),
            Ok((resp, false)) => {
                // Server ended the persistent connection; rebind next time
                *state = None;
                self.conn.close().await.ok();
                Ok(resp)
            }
            Err(e) => {
                *state = None;
                self.conn.close().await.ok();
                Err(e)
            }
        }
    }

    /// Drop the protocol handle and close the underlying connection.
    /// Closing twice is not an error.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = None;
        self.conn.close().await
    }

    async fn round_trip(&self, h: &mut Http1, wire: &[u8]) -> Result<(Response, bool)> {
        self.conn.write_all(wire).await?;

        let head = h.read_head(&self.conn).await?;
        let (status, headers, http11) = parse_head(&head)?;

        let chunked = header_contains(&headers, TRANSFER_ENCODING, "chunked");
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<usize>().ok());

        let (body, close_delimited) = if status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            (Vec::new(), false)
        } else if chunked {
            (h.read_chunked(&self.conn).await?, false)
        } else if let Some(len) = content_length {
            (h.read_exact(&self.conn, len).await?, false)
        } else {
            (h.read_to_eof(&self.conn).await?, true)
        };

        let keep_alive = http11 && !close_delimited && !header_contains(&headers, CONNECTION, "close");
        tracing::debug!(status = status.as_u16(), body_len = body.len(), keep_alive, "response received");

        Ok((
            Response {
                status,
                headers,
                body,
            },
            keep_alive,
        ))
    }
}

impl Http1 {
    /// Read more bytes from the connection into the parse buffer
    async fn fill(&mut self, conn: &ReusableConn) -> Result<usize> {
        let mut chunk = [0u8; 4096];
        let n = conn.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Read up to and including the blank line ending the response head
    async fn read_head(&mut self, conn: &ReusableConn) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                return Ok(self.buf.split_to(pos + 4).to_vec());
            }
            if self.fill(conn).await? == 0 {
                return Err(Error::Decode(
                    "connection closed before response head".into(),
                ));
            }
        }
    }

    async fn read_line(&mut self, conn: &ReusableConn) -> Result<String> {
        loop {
            if let Some(pos) = find(&self.buf, b"\r\n") {
                let line = self.buf.split_to(pos + 2);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            if self.fill(conn).await? == 0 {
                return Err(Error::Decode("connection closed mid-line".into()));
            }
        }
    }

    async fn read_exact(&mut self, conn: &ReusableConn, len: usize) -> Result<Vec<u8>> {
        while self.buf.len() < len {
            if self.fill(conn).await? == 0 {
                return Err(Error::Decode("connection closed mid-body".into()));
            }
        }
        Ok(self.buf.split_to(len).to_vec())
    }

    async fn read_to_eof(&mut self, conn: &ReusableConn) -> Result<Vec<u8>> {
        while self.fill(conn).await? > 0 {}
        Ok(std::mem::take(&mut self.buf).to_vec())
    }

    /// Decode a chunked body, consuming any trailers
    async fn read_chunked(&mut self, conn: &ReusableConn) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line(conn).await?;
            let size_str = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_str, 16)
                .map_err(|_| Error::Decode(format!("bad chunk size {size_str:?}")))?;
            if size == 0 {
                break;
            }
            // chunk data plus its trailing CRLF
            let with_crlf = size
                .checked_add(2)
                .ok_or_else(|| Error::Decode(format!("chunk size {size_str:?} out of range")))?;
            let mut chunk = self.read_exact(conn, with_crlf).await?;
            chunk.truncate(size);
            body.append(&mut chunk);
        }
        loop {
            if self.read_line(conn).await?.is_empty() {
                return Ok(body);
            }
        }
    }
}

/// Serialize a request into HTTP/1.1 wire form (origin-form target)
fn encode_request(req: &Request) -> Result<Vec<u8>> {
    let host = req
        .url
        .host_str()
        .ok_or_else(|| Error::Config(format!("request URL has no host: {}", req.url)))?;
    let host = match req.url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut target = req.url.path().to_string();
    if let Some(q) = req.url.query() {
        target.push('?');
        target.push_str(q);
    }

    let mut out = format!("{} {} HTTP/1.1\r\n", req.method, target).into_bytes();
    if !req.headers.contains_key(HOST) {
        out.extend_from_slice(format!("Host: {host}\r\n").as_bytes());
    }
    for (name, value) in &req.headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !req.body.is_empty() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", req.body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&req.body);
    Ok(out)
}

/// Parse the response head into status, headers and an HTTP/1.1 flag
fn parse_head(head: &[u8]) -> Result<(StatusCode, HeaderMap, bool)> {
    let text = std::str::from_utf8(head)
        .map_err(|_| Error::Decode("response head is not valid UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let status_line = lines
        .next()
        .ok_or_else(|| Error::Decode("empty response head".into()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .ok_or_else(|| Error::Decode("missing HTTP version".into()))?;
    let code = parts
        .next()
        .ok_or_else(|| Error::Decode(format!("malformed status line {status_line:?}")))?;
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| Error::Decode(format!("invalid status code {code:?}")))?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Decode(format!("malformed header line {line:?}")))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| Error::Decode(format!("invalid header name {name:?}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| Error::Decode(format!("invalid header value in {line:?}")))?;
        headers.append(name, value);
    }

    Ok((status, headers, version == "HTTP/1.1"))
}

fn header_contains(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains(token))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

//! Domain operations
//!
//! A [`Domain`] owns one persistent connection to the service endpoint for
//! its lifetime and issues signed requests over it. Single-item operations
//! are one request each; [`Domain::select`] pages through a full result set
//! and streams items into a caller-owned bounded channel.

use http::Method;
use tokio::sync::mpsc;
use url::Url;

use sdc_core::{
    check_status, ClientConfig, Dial, Error, HttpPipe, Request, Response, Result, ReusableConn,
    Signer,
};

use crate::types::{Attribute, AttributeList, Item};
use crate::wire;

/// API version stamped into every signed request
pub const API_VERSION: &str = "2009-04-15";

/// A handle to one domain of the attribute store.
///
/// The handle owns its connection; close it explicitly when done. Closing
/// twice is not an error.
pub struct Domain {
    name: String,
    endpoint: Url,
    pipe: HttpPipe,
}

impl Domain {
    /// Create a handle for `name` at `endpoint`, dialing with `dialer`.
    ///
    /// No connection is made until the first request.
    pub fn new(endpoint: Url, name: impl Into<String>, dialer: Box<dyn Dial>) -> Self {
        Self {
            name: name.into(),
            endpoint,
            pipe: HttpPipe::new(dialer),
        }
    }

    /// Create a handle from a client configuration, carrying its endpoint
    /// and read/write timeouts.
    pub fn connect(config: &ClientConfig, name: impl Into<String>) -> Result<Self> {
        let conn = ReusableConn::with_timeouts(
            Box::new(config.dialer()?),
            config.read_timeout(),
            config.write_timeout(),
        );
        Ok(Self {
            name: name.into(),
            endpoint: config.endpoint_url()?,
            pipe: HttpPipe::from_conn(conn),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch attributes of one item. An empty `attrs` list fetches all of
    /// them; `consistent` requests a consistent read.
    pub async fn get_attributes(
        &self,
        signer: &Signer,
        item: &str,
        attrs: &[&str],
        consistent: bool,
    ) -> Result<Vec<Attribute>> {
        let mut req = self.base_request("GetAttributes");
        req.set_param("ItemName", item);
        for (i, name) in attrs.iter().enumerate() {
            req.set_param(format!("AttributeName.{i}"), *name);
        }
        if consistent {
            req.set_param("ConsistentRead", "true");
        }

        let resp = self.send(signer, &mut req).await?;
        wire::decode_get_attributes(&resp.body)
    }

    /// Write attributes to one item; `replace` overwrites existing values
    /// instead of appending.
    pub async fn put_attributes(
        &self,
        signer: &Signer,
        item: &str,
        attrs: &AttributeList,
        replace: bool,
    ) -> Result<()> {
        let mut req = self.base_request("PutAttributes");
        req.set_param("ItemName", item);
        attrs.apply(&mut req, "Attribute");
        if replace {
            for i in 0..attrs.len() {
                req.set_param(format!("Attribute.{i}.Replace"), "true");
            }
        }

        self.send(signer, &mut req).await?;
        Ok(())
    }

    /// Delete attributes from one item, optionally guarded by expected
    /// values. An empty `attrs` list deletes the whole item.
    pub async fn delete_attributes(
        &self,
        signer: &Signer,
        item: &str,
        attrs: &AttributeList,
        expected: &AttributeList,
    ) -> Result<()> {
        let mut req = self.base_request("DeleteAttributes");
        req.set_param("ItemName", item);
        attrs.apply(&mut req, "Attribute");
        expected.apply(&mut req, "Expected");

        self.send(signer, &mut req).await?;
        Ok(())
    }

    /// Run a select query, streaming decoded items into `items`.
    ///
    /// The query is `select {what} from {domain}[ where {predicate}]`. Pages
    /// are fetched sequentially, following the server's continuation token
    /// until it comes back empty; items are pushed in server order, and a
    /// full channel blocks this producer until the consumer drains it. The
    /// consumer must already be running, and must keep reading until this
    /// returns.
    ///
    /// On a mid-stream error the items of the pages decoded so far have
    /// already been delivered; the error is returned and no further requests
    /// are issued. The channel is never closed here; both ends belong to
    /// the caller.
    pub async fn select(
        &self,
        signer: &Signer,
        what: &str,
        where_clause: Option<&str>,
        consistent: bool,
        items: &mpsc::Sender<Item>,
    ) -> Result<()> {
        let mut expression = format!("select {what} from {}", self.name);
        if let Some(predicate) = where_clause {
            expression.push_str(" where ");
            expression.push_str(predicate);
        }

        let mut base = Request::new(Method::GET, self.endpoint.clone());
        base.set_param("Action", "Select");
        base.set_param("SelectExpression", &expression);
        if consistent {
            base.set_param("ConsistentRead", "true");
        }

        let mut next_token = String::new();
        loop {
            let mut req = base.clone();
            req.remove_param("NextToken");
            if !next_token.is_empty() {
                req.set_param("NextToken", &next_token);
            }

            let resp = self.send(signer, &mut req).await?;
            let page = wire::decode_select(&resp.body)?;
            tracing::debug!(
                items = page.items.len(),
                more = !page.next_token.is_empty(),
                "select page decoded"
            );

            for item in page.items {
                items
                    .send(item)
                    .await
                    .map_err(|_| Error::Delivery("item receiver dropped".into()))?;
            }

            next_token = page.next_token;
            if next_token.is_empty() {
                return Ok(());
            }
        }
    }

    /// Close the underlying connection
    pub async fn close(&self) -> Result<()> {
        self.pipe.close().await
    }

    fn base_request(&self, action: &str) -> Request {
        let mut req = Request::new(Method::GET, self.endpoint.clone());
        req.set_param("Action", action);
        req.set_param("DomainName", &self.name);
        req
    }

    /// Sign, send once, and map the response status. No retries.
    async fn send(&self, signer: &Signer, req: &mut Request) -> Result<Response> {
        signer.sign_v2(req, API_VERSION)?;
        let resp = self.pipe.request(req).await?;
        check_status(resp.status)?;
        Ok(resp)
    }
}

//! `ObjectClient` and the single-request operations the orchestrators build on.

use std::sync::Arc;

use base64::Engine;
use url::Url;

use super::options::ObjectKind;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{BodyStream, MemoryBody, Method, Pipeline, Request, Response};
use crate::segmenter::{parse_content_range, range_header_value};

/// Length of a block id before base64 encoding; ids in one blob must be equal length.
const BLOCK_ID_WIDTH: usize = 64;

/// Metadata of a remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectProperties {
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

impl ObjectProperties {
    /// Metadata headers of `resp`; `size` comes from Content-Range's total when
    /// present, otherwise from Content-Length.
    pub fn from_response(resp: &Response) -> Self {
        let h = resp.headers();
        let total = h
            .get("content-range")
            .and_then(parse_content_range)
            .and_then(|cr| cr.total);
        let size = total
            .or_else(|| h.get("content-length").and_then(|v| v.trim().parse().ok()))
            .unwrap_or(resp.body().len() as u64);
        Self {
            size,
            etag: h.get("etag").map(str::to_string),
            last_modified: h.get("last-modified").map(str::to_string),
            content_type: h.get("content-type").map(str::to_string),
        }
    }
}

/// Handle to one remote object. Cheap to clone; every clone shares the pipeline.
#[derive(Clone)]
pub struct ObjectClient {
    url: Url,
    kind: ObjectKind,
    pipeline: Arc<Pipeline>,
}

impl std::fmt::Debug for ObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectClient")
            .field("url", &crate::http::redacted_url(&self.url))
            .field("kind", &self.kind)
            .finish()
    }
}

impl ObjectClient {
    pub fn new(url: Url, kind: ObjectKind, pipeline: Arc<Pipeline>) -> Self {
        Self {
            url,
            kind,
            pipeline,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn url_with(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.url.clone();
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    fn send(&self, ctx: &Context, mut request: Request<'_>) -> Result<Response> {
        let resp = self.pipeline.send(ctx, &mut request)?;
        Ok(resp.error_for_status()?)
    }

    /// `HEAD` the object.
    pub fn get_properties(&self, ctx: &Context) -> Result<ObjectProperties> {
        let resp = self.send(ctx, Request::new(Method::Head, self.url.clone()))?;
        Ok(ObjectProperties::from_response(&resp))
    }

    /// `GET` `[offset, offset + length)`, or from `offset` to the end when
    /// `length` is `None`. The whole object is requested (no Range header) for
    /// offset 0 without a length. `if_match` pins the request to an ETag.
    pub fn download_range(
        &self,
        ctx: &Context,
        offset: u64,
        length: Option<u64>,
        if_match: Option<&str>,
    ) -> Result<Response> {
        let mut req = Request::new(Method::Get, self.url.clone());
        if offset > 0 || length.is_some() {
            req = req.with_header("Range", range_header_value(offset, length));
        }
        if let Some(etag) = if_match {
            req = req.with_header("If-Match", etag);
        }
        self.send(ctx, req)
    }

    /// Establish the object. Block blobs are created empty; files are created
    /// at their full `size`.
    pub fn create(&self, ctx: &Context, size: u64, content_type: Option<&str>) -> Result<Response> {
        let mut req = Request::new(Method::Put, self.url.clone());
        match self.kind {
            ObjectKind::BlockBlob => {
                req = req
                    .with_header("x-ms-blob-type", "BlockBlob")
                    .with_body(MemoryBody::new(&[]));
            }
            ObjectKind::File => {
                req = req
                    .with_header("x-ms-type", "file")
                    .with_header("x-ms-content-length", size.to_string())
                    .with_body(MemoryBody::new(&[]));
            }
        }
        if let Some(ct) = content_type {
            let name = match self.kind {
                ObjectKind::BlockBlob => "x-ms-blob-content-type",
                ObjectKind::File => "x-ms-content-type",
            };
            req = req.with_header(name, ct);
        }
        self.send(ctx, req)
    }

    /// Upload a whole block blob in one `PUT`.
    pub fn put_blob<'b>(
        &self,
        ctx: &Context,
        body: impl BodyStream + 'b,
        content_type: Option<&str>,
    ) -> Result<Response> {
        self.require(ObjectKind::BlockBlob, "put_blob")?;
        let mut req = Request::new(Method::Put, self.url.clone())
            .with_header("x-ms-blob-type", "BlockBlob")
            .with_body(body);
        if let Some(ct) = content_type {
            req = req.with_header("x-ms-blob-content-type", ct);
        }
        self.send(ctx, req)
    }

    /// Stage one uncommitted block.
    pub fn stage_block<'b>(&self, ctx: &Context, block_id: &str, body: impl BodyStream + 'b) -> Result<Response> {
        self.require(ObjectKind::BlockBlob, "stage_block")?;
        let url = self.url_with(&[("comp", "block"), ("blockid", block_id)]);
        self.send(ctx, Request::new(Method::Put, url).with_body(body))
    }

    /// Assemble staged blocks, in order, into the blob's content.
    pub fn commit_block_list(
        &self,
        ctx: &Context,
        block_ids: &[String],
        content_type: Option<&str>,
    ) -> Result<Response> {
        self.require(ObjectKind::BlockBlob, "commit_block_list")?;
        let xml = block_list_xml(block_ids);
        let url = self.url_with(&[("comp", "blocklist")]);
        let mut req = Request::new(Method::Put, url)
            .with_header("Content-Type", "application/xml")
            .with_body(MemoryBody::new(xml.as_bytes()));
        if let Some(ct) = content_type {
            req = req.with_header("x-ms-blob-content-type", ct);
        }
        self.send(ctx, req)
    }

    /// Write `body` into the file at `offset`.
    pub fn put_range<'b>(&self, ctx: &Context, offset: u64, body: impl BodyStream + 'b) -> Result<Response> {
        self.require(ObjectKind::File, "put_range")?;
        let len = body.len();
        if len == 0 {
            return Err(Error::logic("file range writes need at least one byte"));
        }
        let url = self.url_with(&[("comp", "range")]);
        let req = Request::new(Method::Put, url)
            .with_header("x-ms-range", range_header_value(offset, Some(len)))
            .with_header("x-ms-write", "update")
            .with_body(body);
        self.send(ctx, req)
    }

    fn require(&self, kind: ObjectKind, op: &str) -> Result<()> {
        if self.kind != kind {
            return Err(Error::logic(format!("{} is not supported for {} objects", op, self.kind)));
        }
        Ok(())
    }
}

/// Block id for the `index`-th block: base64 of the zero-padded decimal index.
pub fn block_id(index: usize) -> String {
    let raw = format!("{:0width$}", index, width = BLOCK_ID_WIDTH);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        xml.push_str("<Uncommitted>");
        xml.push_str(id);
        xml.push_str("</Uncommitted>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// Zero-padded decimal index recovered from a block id, if it is one of ours.
pub fn block_index(block_id: &str) -> Option<usize> {
    let raw = base64::engine::general_purpose::STANDARD.decode(block_id).ok()?;
    std::str::from_utf8(&raw).ok()?.parse().ok()
}

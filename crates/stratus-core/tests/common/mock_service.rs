//! In-memory object service implementing `Transport`.
//!
//! Understands the subset of the blob/file REST surface the engine speaks:
//! HEAD, ranged GET with If-Match, block blob PUT / stage block / commit block
//! list, file create and range writes. Every request is recorded, and failures
//! can be scripted ahead of time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use stratus_core::error::{Error, Result, TransportError};
use stratus_core::http::{read_to_end, reason_phrase, Method, Request, Response, Transport};
use stratus_core::segmenter::parse_content_range;
use stratus_core::Context;

/// Operation a request was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Head,
    Get,
    PutBlob,
    CreateBlob,
    StageBlock,
    CommitBlockList,
    CreateFile,
    PutRange,
    Other,
}

/// What a scripted failure does to the request it hits.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Status(u16),
    Transport,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub op: Op,
    pub method: Method,
    pub url: String,
    pub range: Option<String>,
    pub if_match: Option<String>,
}

#[derive(Default)]
struct Object {
    data: Vec<u8>,
    version: u64,
    staged: HashMap<String, Vec<u8>>,
}

impl Object {
    fn etag(&self) -> String {
        format!("\"0x{:X}\"", self.version)
    }
}

#[derive(Default)]
struct State {
    objects: HashMap<String, Object>,
    log: Vec<Recorded>,
    faults: VecDeque<(Option<Op>, Fault)>,
}

#[derive(Default)]
pub struct MockService {
    state: Mutex<State>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at `path` (e.g. `/container/blob`).
    pub fn put_object(&self, path: &str, data: Vec<u8>) {
        let mut st = self.state.lock().unwrap();
        let obj = st.objects.entry(path.to_string()).or_default();
        obj.data = data;
        obj.version += 1;
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(path).map(|o| o.data.clone())
    }

    /// Change the object's ETag without changing its bytes.
    pub fn touch(&self, path: &str) {
        if let Some(o) = self.state.lock().unwrap().objects.get_mut(path) {
            o.version += 1;
        }
    }

    /// Fail the next request matching `op` (any request when `None`).
    pub fn fail_next(&self, op: Option<Op>, fault: Fault) {
        self.state.lock().unwrap().faults.push_back((op, fault));
    }

    pub fn log(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state.lock().unwrap().log.iter().filter(|r| r.op == op).count()
    }

    pub fn total_requests(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }
}

fn query_value(req: &Request<'_>, key: &str) -> Option<String> {
    req.url()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn classify(req: &Request<'_>) -> Op {
    let comp = query_value(req, "comp");
    match (req.method(), comp.as_deref()) {
        (Method::Head, _) => Op::Head,
        (Method::Get, _) => Op::Get,
        (Method::Put, Some("block")) => Op::StageBlock,
        (Method::Put, Some("blocklist")) => Op::CommitBlockList,
        (Method::Put, Some("range")) => Op::PutRange,
        (Method::Put, None) if req.headers().contains("x-ms-type") => Op::CreateFile,
        (Method::Put, None) if req.body_len() == 0 => Op::CreateBlob,
        (Method::Put, None) => Op::PutBlob,
        _ => Op::Other,
    }
}

/// `bytes=a-b` or `bytes=a-` into `(a, Some(b))` / `(a, None)`.
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (a, b) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    let a = a.parse().ok()?;
    let b = if b.is_empty() { None } else { Some(b.parse().ok()?) };
    Some((a, b))
}

fn status(code: u16) -> Response {
    Response::new(code, reason_phrase(code))
}

fn parse_block_list(xml: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Uncommitted>") {
        rest = &rest[start + "<Uncommitted>".len()..];
        let Some(end) = rest.find("</Uncommitted>") else {
            break;
        };
        ids.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    ids
}

impl MockService {
    fn handle(&self, op: Op, req: &mut Request<'_>, body: Vec<u8>) -> Response {
        let path = req.url().path().to_string();
        let mut st = self.state.lock().unwrap();
        match op {
            Op::Head => match st.objects.get(&path) {
                Some(o) => status(200)
                    .with_header("Content-Length", o.data.len().to_string())
                    .with_header("ETag", o.etag()),
                None => status(404).with_header("x-ms-error-code", "BlobNotFound"),
            },
            Op::Get => {
                let Some(o) = st.objects.get(&path) else {
                    return status(404).with_header("x-ms-error-code", "BlobNotFound");
                };
                if let Some(tag) = req.headers().get("if-match") {
                    if tag != o.etag() {
                        return status(412).with_header("x-ms-error-code", "ConditionNotMet");
                    }
                }
                let total = o.data.len() as u64;
                match req.headers().get("range").and_then(parse_range) {
                    None => status(200)
                        .with_header("ETag", o.etag())
                        .with_body(o.data.clone()),
                    Some((start, _)) if start >= total => status(416)
                        .with_header("Content-Range", format!("bytes */{}", total))
                        .with_header("x-ms-error-code", "InvalidRange"),
                    Some((start, end)) => {
                        let end = end.map_or(total - 1, |e| e.min(total - 1));
                        status(206)
                            .with_header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
                            .with_header("ETag", o.etag())
                            .with_body(o.data[start as usize..=end as usize].to_vec())
                    }
                }
            }
            Op::PutBlob | Op::CreateBlob => {
                let o = st.objects.entry(path).or_default();
                o.data = body;
                o.staged.clear();
                o.version += 1;
                status(201).with_header("ETag", o.etag())
            }
            Op::StageBlock => {
                let Some(id) = query_value(req, "blockid") else {
                    return status(400);
                };
                let o = st.objects.entry(path).or_default();
                o.staged.insert(id, body);
                status(201)
            }
            Op::CommitBlockList => {
                let ids = parse_block_list(&String::from_utf8_lossy(&body));
                let Some(o) = st.objects.get_mut(&path) else {
                    return status(404);
                };
                let mut data = Vec::new();
                for id in &ids {
                    match o.staged.get(id) {
                        Some(block) => data.extend_from_slice(block),
                        None => return status(400).with_header("x-ms-error-code", "InvalidBlockList"),
                    }
                }
                o.data = data;
                o.staged.clear();
                o.version += 1;
                status(201).with_header("ETag", o.etag())
            }
            Op::CreateFile => {
                let len: usize = req
                    .headers()
                    .get("x-ms-content-length")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let o = st.objects.entry(path).or_default();
                o.data = vec![0; len];
                o.version += 1;
                status(201).with_header("ETag", o.etag())
            }
            Op::PutRange => {
                let Some((start, Some(end))) = req.headers().get("x-ms-range").and_then(parse_range) else {
                    return status(400);
                };
                let Some(o) = st.objects.get_mut(&path) else {
                    return status(404);
                };
                if end as usize >= o.data.len() || (end - start + 1) as usize != body.len() {
                    return status(416);
                }
                o.data[start as usize..=end as usize].copy_from_slice(&body);
                o.version += 1;
                status(201).with_header("ETag", o.etag())
            }
            Op::Other => status(405),
        }
    }
}

impl Transport for MockService {
    fn send(&self, ctx: &Context, request: &mut Request<'_>) -> Result<Response> {
        ctx.check()?;
        let op = classify(request);
        let body = match request.body_mut() {
            Some(b) => read_to_end(b)?,
            None => Vec::new(),
        };
        {
            let mut st = self.state.lock().unwrap();
            st.log.push(Recorded {
                op,
                method: request.method(),
                url: request.url().to_string(),
                range: request.headers().get("range").map(str::to_string),
                if_match: request.headers().get("if-match").map(str::to_string),
            });
            let hit = st
                .faults
                .iter()
                .position(|(want, _)| want.map_or(true, |w| w == op));
            if let Some(i) = hit {
                if let Some((_, fault)) = st.faults.remove(i) {
                    return match fault {
                        Fault::Status(code) => Ok(status(code)),
                        Fault::Transport => Err(Error::Transport(TransportError::connection(
                            "connection reset by peer",
                        ))),
                    };
                }
            }
        }
        Ok(self.handle(op, request, body))
    }
}

/// Total size from a 206 response's Content-Range.
pub fn total_from(resp: &Response) -> Option<u64> {
    resp.headers()
        .get("content-range")
        .and_then(parse_content_range)
        .and_then(|cr| cr.total)
}

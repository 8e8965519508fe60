//! Minimal HTTP/1.1 blob server for exercising `CurlTransport` end to end.
//!
//! Serves one object per path. HEAD returns Content-Length and ETag; GET
//! honors `Range` (206 with Content-Range) and `If-Match`; PUT stores a whole
//! blob, stages a block (`?comp=block&blockid=`) or commits a block list
//! (`?comp=blocklist`). Every response closes the connection.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct State {
    objects: HashMap<String, (Vec<u8>, u64)>,
    staged: HashMap<String, Vec<u8>>,
    /// Statuses returned, in order, before normal handling resumes.
    fail_with: Vec<u16>,
    requests: Vec<String>,
    /// Read delay applied to GET bodies, to keep requests in flight.
    stall: Option<Duration>,
}

#[derive(Clone)]
pub struct BlobServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl BlobServer {
    /// URL of `path` on this server (path without leading slash).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn put_object(&self, path: &str, body: Vec<u8>) {
        let mut st = self.state.lock().unwrap();
        let version = st.objects.get(&format!("/{}", path)).map_or(1, |(_, v)| v + 1);
        st.objects.insert(format!("/{}", path), (body, version));
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&format!("/{}", path))
            .map(|(b, _)| b.clone())
    }

    /// Answer the next `statuses.len()` requests with these statuses.
    pub fn fail_next(&self, statuses: &[u16]) {
        self.state.lock().unwrap().fail_with.extend_from_slice(statuses);
    }

    pub fn stall_gets(&self, d: Duration) {
        self.state.lock().unwrap().stall = Some(d);
    }

    /// Request lines seen so far (`METHOD /path?query`).
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start() -> BlobServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    BlobServer {
        base: format!("http://127.0.0.1:{}/", port),
        state,
    }
}

struct Parsed {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Parsed> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), parse_query(q)),
        None => (target, HashMap::new()),
    };
    let len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(len);
    Some(Parsed {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn parse_query(q: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(q.as_bytes()).into_owned().collect()
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
    for (k, v) in headers {
        head.push_str(&format!("{}: {}\r\n", k, v));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn status_text(code: u16) -> String {
    let reason = match code {
        404 => "Not Found",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    };
    format!("{} {}", code, reason)
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let mut st = state.lock().unwrap();
    let line = match req.query.is_empty() {
        true => format!("{} {}", req.method, req.path),
        false => {
            let mut keys: Vec<_> = req.query.keys().cloned().collect();
            keys.sort();
            format!("{} {}?{}", req.method, req.path, keys.join("&"))
        }
    };
    st.requests.push(line);
    if !st.fail_with.is_empty() {
        let code = st.fail_with.remove(0);
        drop(st);
        respond(&mut stream, &status_text(code), &[], b"");
        return;
    }

    match req.method.as_str() {
        "HEAD" | "GET" => {
            let Some((data, version)) = st.objects.get(&req.path).cloned() else {
                drop(st);
                respond(&mut stream, "404 Not Found", &[], b"");
                return;
            };
            let stall = st.stall;
            drop(st);
            let etag = format!("\"v{}\"", version);
            if let Some(tag) = req.headers.get("if-match") {
                if *tag != etag {
                    respond(&mut stream, "412 Precondition Failed", &[], b"");
                    return;
                }
            }
            if req.method == "HEAD" {
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nETag: {}\r\nConnection: close\r\n\r\n",
                    data.len(),
                    etag
                );
                let _ = stream.write_all(head.as_bytes());
                return;
            }
            if let Some(d) = stall {
                thread::sleep(d);
            }
            let total = data.len() as u64;
            match req.headers.get("range").and_then(|r| parse_range(r)) {
                None => respond(&mut stream, "200 OK", &[("ETag", etag)], &data),
                Some((start, _)) if start >= total => respond(
                    &mut stream,
                    "416 Range Not Satisfiable",
                    &[("Content-Range", format!("bytes */{}", total))],
                    b"",
                ),
                Some((start, end)) => {
                    let end = end.unwrap_or(total - 1).min(total - 1);
                    respond(
                        &mut stream,
                        "206 Partial Content",
                        &[
                            ("Content-Range", format!("bytes {}-{}/{}", start, end, total)),
                            ("ETag", etag),
                        ],
                        &data[start as usize..=end as usize],
                    );
                }
            }
        }
        "PUT" => {
            match req.query.get("comp").map(String::as_str) {
                Some("block") => {
                    let id = req.query.get("blockid").cloned().unwrap_or_default();
                    st.staged.insert(format!("{}#{}", req.path, id), req.body);
                }
                Some("blocklist") => {
                    let xml = String::from_utf8_lossy(&req.body).to_string();
                    let mut data = Vec::new();
                    for part in xml.split("<Uncommitted>").skip(1) {
                        let id = part.split("</Uncommitted>").next().unwrap_or("");
                        match st.staged.remove(&format!("{}#{}", req.path, id)) {
                            Some(block) => data.extend_from_slice(&block),
                            None => {
                                drop(st);
                                respond(&mut stream, "400 Bad Request", &[], b"");
                                return;
                            }
                        }
                    }
                    let version = st.objects.get(&req.path).map_or(1, |(_, v)| v + 1);
                    st.objects.insert(req.path.clone(), (data, version));
                }
                _ => {
                    let version = st.objects.get(&req.path).map_or(1, |(_, v)| v + 1);
                    st.objects.insert(req.path.clone(), (req.body, version));
                }
            }
            drop(st);
            respond(&mut stream, "201 Created", &[], b"");
        }
        _ => {
            drop(st);
            respond(&mut stream, "405 Method Not Allowed", &[], b"");
        }
    }
}

/// `bytes=a-b` / `bytes=a-` into `(a, Some(b))` / `(a, None)`.
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (a, b) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    let a = a.trim().parse().ok()?;
    let b = match b.trim() {
        "" => None,
        b => Some(b.parse().ok()?),
    };
    Some((a, b))
}

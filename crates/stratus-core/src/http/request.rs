//! Outgoing request, mutated as it threads through the policy chain.

use std::fmt;

use url::Url;

use super::body::BodyStream;
use super::headers::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// Read-only methods may be retried against a secondary replica.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Request<'a> {
    method: Method,
    url: Url,
    headers: Headers,
    body: Option<Box<dyn BodyStream + 'a>>,
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .finish()
    }
}

impl<'a> Request<'a> {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl BodyStream + 'a) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body_len(&self) -> u64 {
        self.body.as_ref().map_or(0, |b| b.len())
    }

    pub fn body_mut(&mut self) -> Option<&mut (dyn BodyStream + 'a)> {
        self.body.as_deref_mut()
    }

    /// Rewind the body so the next attempt re-reads it from the start.
    pub fn rewind_body(&mut self) -> std::io::Result<()> {
        match self.body.as_mut() {
            Some(b) => b.rewind(),
            None => Ok(()),
        }
    }
}

/// URL with the query string replaced by `?...`, for logs (pre-signed URLs carry secrets).
pub fn redacted_url(url: &Url) -> String {
    let mut u = url.clone();
    if u.query().is_some() {
        u.set_query(Some("..."));
    }
    u.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_methods() {
        assert!(Method::Get.is_read_only());
        assert!(Method::Head.is_read_only());
        assert!(!Method::Put.is_read_only());
        assert!(!Method::Delete.is_read_only());
    }

    #[test]
    fn redaction_hides_query() {
        let u = Url::parse("https://acct.blob.example.net/c/b?sig=secret&se=x").unwrap();
        assert_eq!(redacted_url(&u), "https://acct.blob.example.net/c/b?...");
        let plain = Url::parse("https://acct.blob.example.net/c/b").unwrap();
        assert_eq!(redacted_url(&plain), "https://acct.blob.example.net/c/b");
    }
}

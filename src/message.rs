//! Request and response model shared by every stage.
//!
//! The types here are deliberately thin wrappers over the `http` crate's
//! vocabulary types plus a [`Body`] that distinguishes replayable payloads
//! (empty, or fully buffered `Bytes`) from one-shot streaming payloads.
//! Replayability is what makes retries safe: [`Request::try_clone`] hands the
//! retry stage a fresh copy of the request per attempt, and refuses
//! (`None`) when the body is a stream that has only one read in it.

use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use tower::BoxError;

/// Payload of a request or response.
pub enum Body {
    Empty,
    /// Fully buffered payload. Cloning shares the underlying allocation.
    Full(Bytes),
    /// One-shot chunk stream. Cannot be replayed.
    Streaming(BoxStream<'static, std::result::Result<Bytes, BoxError>>),
}

impl Body {
    pub fn empty() -> Self {
        Body::Empty
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = std::result::Result<Bytes, BoxError>> + Send + 'static,
    {
        Body::Streaming(stream.boxed())
    }

    /// Whether the body can be produced again for another attempt.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Body::Streaming(_))
    }

    /// A fresh copy of the body, or `None` for one-shot streaming bodies.
    pub fn try_clone(&self) -> Option<Body> {
        match self {
            Body::Empty => Some(Body::Empty),
            Body::Full(bytes) => Some(Body::Full(bytes.clone())),
            Body::Streaming(_) => None,
        }
    }

    /// Read the body to completion and discard it, so an abandoned response
    /// cannot leak a half-consumed stream.
    pub async fn drain(self) {
        if let Body::Streaming(mut stream) = self {
            while stream.next().await.is_some() {}
        }
    }

    /// Collect the whole body into a single buffer.
    pub async fn into_bytes(self) -> std::result::Result<Bytes, BoxError> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Streaming(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Full(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => write!(f, "Body::Full({} bytes)", bytes.len()),
            Body::Streaming(_) => f.write_str("Body::Streaming(..)"),
        }
    }
}

/// An outbound request as the stages see it.
///
/// `send` takes the request by value, so a stage that tags or rewrites
/// headers mutates its own copy and the caller's original is never aliased.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: Uri, body: impl Into<Body>) -> Self {
        let mut req = Self::new(Method::POST, uri);
        req.body = body.into();
        req
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Fresh copy of the request, including a fresh body. `None` when the
    /// body is a one-shot stream; issuing such a request more than once is a
    /// caller bug, and the retry stage turns it into an explicit error.
    pub fn try_clone(&self) -> Option<Request> {
        Some(Request {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
        })
    }
}

/// Wall-clock start and monotonic duration of one pipeline call, attached to
/// the response by the logging stage. Never taken from the wire.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub started_at: SystemTime,
    pub elapsed: Duration,
}

/// An inbound response as it unwinds back up the stack.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    timing: Option<Timing>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
            timing: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn timing(&self) -> Option<Timing> {
        self.timing
    }

    pub(crate) fn set_timing(&mut self, timing: Timing) {
        self.timing = Some(timing);
    }
}

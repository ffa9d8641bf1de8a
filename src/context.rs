//! HTTP Context Module
//!
//! The per-request view the cache works against: request attributes, a
//! mutable response head, body replacement, streaming body observers and
//! free-form tags for telemetry.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_LENGTH, HOST};
use http::{request, response, HeaderMap, HeaderValue, Method, StatusCode};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tracing::debug;

/// Header consulted for the scheme when the request URI carries none.
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

// == Body Observer ==
/// A tap on an outbound response body.
///
/// Invoked once per chunk, in order, with `complete` set on the final chunk.
/// The returned bytes are what actually gets sent.
pub trait BodyObserver: Send {
    fn on_flush(&mut self, chunk: Bytes, complete: bool) -> Bytes;
}

impl<F> BodyObserver for F
where
    F: FnMut(Bytes, bool) -> Bytes + Send,
{
    fn on_flush(&mut self, chunk: Bytes, complete: bool) -> Bytes {
        self(chunk, complete)
    }
}

// == Tags ==
/// Shared list of telemetry tags attached to one request.
///
/// Clones share the same list, so tags added after the handler returned
/// (e.g. at the end of a streamed body) are visible to every holder.
#[derive(Debug, Clone, Default)]
pub struct Tags(Arc<Mutex<Vec<String>>>);

impl Tags {
    pub fn add(&self, tag: impl Into<String>) {
        let tag = tag.into();
        debug!(tag = %tag, "request tagged");
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tag);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.list().iter().any(|t| t == tag)
    }

    pub fn list(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

// == Request View ==
/// The request attributes the cache keys and decides on.
#[derive(Debug, Clone)]
pub struct Request {
    scheme: String,
    host: String,
    path: String,
    method: Method,
    headers: HeaderMap,
}

impl Request {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        method: Method,
        headers: HeaderMap,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            method,
            headers,
        }
    }

    /// Builds the view from server-side request parts.
    ///
    /// Scheme falls back to `X-Forwarded-Proto` then `http`; host falls back
    /// to the `Host` header.
    pub fn from_parts(parts: &request::Parts) -> Self {
        let scheme = parts
            .uri
            .scheme_str()
            .map(str::to_owned)
            .or_else(|| header_str(&parts.headers, X_FORWARDED_PROTO))
            .unwrap_or_else(|| "http".to_string());
        let host = parts
            .uri
            .authority()
            .map(|authority| match authority.port_u16() {
                Some(port) => format!("{}:{}", authority.host(), port),
                None => authority.host().to_owned(),
            })
            .or_else(|| header_str(&parts.headers, HOST.as_str()))
            .unwrap_or_default();

        Self::new(
            scheme,
            host,
            parts.uri.path(),
            parts.method.clone(),
            parts.headers.clone(),
        )
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All values of header `name`, skipping ones that are not visible ASCII.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        header_values(&self.headers, name)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn header_values<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
}

// == Response View ==
/// The outgoing response as seen by the pipeline before its body is sent.
pub struct Response {
    head: response::Parts,
    body: Option<Bytes>,
    observers: Vec<Box<dyn BodyObserver>>,
}

impl Default for Response {
    fn default() -> Self {
        let (head, ()) = http::Response::new(()).into_parts();
        Self::from_parts(head)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("headers", &self.head.headers)
            .field("body", &self.body)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Response {
    pub fn from_parts(head: response::Parts) -> Self {
        Self {
            head,
            body: None,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.head.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// Appends every value of `other` to this response's headers.
    pub fn add_headers_from(&mut self, other: &HeaderMap) {
        for (name, value) in other {
            self.head.headers.append(name.clone(), value.clone());
        }
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        header_values(&self.head.headers, name)
    }

    /// Replaces whatever the pipeline would have sent with fixed content.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Registers an observer invoked for every outbound body chunk.
    pub fn on_flush_body(&mut self, observer: impl BodyObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Runs `chunk` through the registered observers in registration order.
    pub fn flush_body(&mut self, chunk: Bytes, complete: bool) -> Bytes {
        flush_through(&mut self.observers, chunk, complete)
    }

    /// Signals an empty final chunk to observers of a response that carries
    /// no body on the wire, then detaches them.
    pub fn complete_without_body(&mut self) {
        if self.body.is_none() && !self.observers.is_empty() {
            flush_through(&mut self.observers, Bytes::new(), true);
            self.observers.clear();
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.head
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Turns the view into a sendable response around the upstream `body`.
    ///
    /// A replaced body wins over `body`; otherwise registered observers are
    /// attached to the stream.
    pub fn into_response(self, body: Body) -> axum::response::Response {
        let content_length = self.content_length();
        let body = match (self.body, self.observers.is_empty()) {
            (Some(fixed), _) => Body::from(fixed),
            (None, true) => body,
            (None, false) => Body::new(ObservedBody::new(body, content_length, self.observers)),
        };
        axum::response::Response::from_parts(self.head, body)
    }
}

fn flush_through(observers: &mut [Box<dyn BodyObserver>], mut chunk: Bytes, complete: bool) -> Bytes {
    for observer in observers.iter_mut() {
        chunk = observer.on_flush(chunk, complete);
    }
    chunk
}

// == HTTP Context ==
/// Everything the pipeline knows about one in-flight exchange.
#[derive(Debug)]
pub struct HttpContext {
    request: Request,
    response: Response,
    tags: Tags,
}

impl HttpContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::default(),
            tags: Tags::default(),
        }
    }

    pub fn from_request_parts(parts: &request::Parts) -> Self {
        Self::new(Request::from_parts(parts))
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Installs the head produced upstream, keeping registered observers.
    pub fn set_response_head(&mut self, head: response::Parts) {
        self.response.head = head;
    }

    pub fn add_tag(&self, tag: impl Into<String>) {
        self.tags.add(tag);
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// HEAD responses are never polled for a body, so observers see their
    /// final chunk here.
    pub fn into_response(mut self, body: Body) -> axum::response::Response {
        if self.request.method() == Method::HEAD {
            self.response.complete_without_body();
        }
        self.response.into_response(body)
    }
}

// == Observed Body ==
/// Body decorator feeding every outbound data frame to body observers.
///
/// The final chunk is the frame that reaches the expected length, the frame
/// after which the inner body reports end of stream, or an empty chunk when
/// the stream ends without either. Servers stop polling a sized body once
/// its length is written, so the length must be tracked here.
/// On error or drop before the end, observers are discarded uncompleted.
pub struct ObservedBody {
    inner: Body,
    observers: Vec<Box<dyn BodyObserver>>,
    remaining: Option<u64>,
    completed: bool,
}

impl ObservedBody {
    /// `content_length` is the declared length of `inner`, if any; the exact
    /// size hint of `inner` is used when it is absent.
    pub fn new(
        inner: Body,
        content_length: Option<u64>,
        observers: Vec<Box<dyn BodyObserver>>,
    ) -> Self {
        let remaining = content_length.or_else(|| inner.size_hint().exact());
        let mut body = Self {
            inner,
            observers,
            remaining,
            completed: false,
        };
        // Servers never poll a body that is already finished
        if body.inner.is_end_stream() || body.remaining == Some(0) {
            body.flush(Bytes::new(), true);
        }
        body
    }

    fn flush(&mut self, chunk: Bytes, complete: bool) -> Bytes {
        let chunk = flush_through(&mut self.observers, chunk, complete);
        if complete {
            self.completed = true;
            self.observers.clear();
        }
        chunk
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) if !this.completed => {
                    if let Some(remaining) = this.remaining.as_mut() {
                        *remaining = remaining.saturating_sub(data.len() as u64);
                    }
                    let complete = this.remaining == Some(0) || this.inner.is_end_stream();
                    Poll::Ready(Some(Ok(Frame::data(this.flush(data, complete)))))
                }
                Ok(data) => Poll::Ready(Some(Ok(Frame::data(data)))),
                Err(frame) => Poll::Ready(Some(Ok(frame))),
            },
            Some(Err(err)) => {
                this.observers.clear();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                if !this.completed {
                    this.flush(Bytes::new(), true);
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == Some(0) || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Header names that must not be forwarded between hops.
pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Convenience used by tests and callers building header maps by hand.
pub fn header_map<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}

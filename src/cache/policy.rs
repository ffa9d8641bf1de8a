//! Admission Policy Module
//!
//! Pure whitelist and `Cache-Control` checks deciding whether a request may
//! be served from the cache and whether a response may be written to it.
//! Reference: https://tools.ietf.org/html/rfc7234#section-5.2

use http::header::CACHE_CONTROL;
use http::{Method, StatusCode};

use crate::context::{Request, Response};

/// Request directives that refuse a cached reply.
const LOAD_REQUEST_VETOES: &[&str] = &["no-cache"];
/// Request directives that refuse caching of this exchange.
const STORE_REQUEST_VETOES: &[&str] = &["no-store", "no-cache"];
/// Response directives that refuse caching or demand revalidation.
const STORE_RESPONSE_VETOES: &[&str] = &["no-store", "no-cache", "must-revalidate"];

// == Admission Policy ==
/// Method and status whitelists the cache admits.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    methods: Vec<Method>,
    codes: Vec<StatusCode>,
}

impl AdmissionPolicy {
    pub fn new(methods: Vec<Method>, codes: Vec<StatusCode>) -> Self {
        Self { methods, codes }
    }

    #[cfg(test)]
    pub(crate) fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[cfg(test)]
    pub(crate) fn codes(&self) -> &[StatusCode] {
        &self.codes
    }

    // == Load ==
    /// Whether `request` may be answered from the cache.
    ///
    /// Checks run cheapest first: method whitelist, then request directives.
    pub fn admits_load(&self, request: &Request) -> bool {
        self.admits_method(request.method())
            && !has_directive(request.header_values(CACHE_CONTROL.as_str()), LOAD_REQUEST_VETOES)
    }

    // == Store ==
    /// Whether `response` to `request` may be written to the cache.
    pub fn admits_store(&self, request: &Request, response: &Response) -> bool {
        self.admits_method(request.method())
            && self.admits_status(response.status())
            && !has_directive(request.header_values(CACHE_CONTROL.as_str()), STORE_REQUEST_VETOES)
            && !has_directive(response.header_values(CACHE_CONTROL.as_str()), STORE_RESPONSE_VETOES)
    }

    pub fn admits_method(&self, method: &Method) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    pub fn admits_status(&self, status: StatusCode) -> bool {
        self.codes.contains(&status)
    }
}

/// True if any header value contains any of `directives` as a substring.
fn has_directive<'a>(mut values: impl Iterator<Item = &'a str>, directives: &[&str]) -> bool {
    values.any(|value| directives.iter().any(|directive| value.contains(directive)))
}

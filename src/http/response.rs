use std::collections::BTreeMap;

use bytes::Bytes;

/// HTTP status codes emitted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete HTTP response ready to be serialized.
///
/// Headers always serialize before any body byte. Every status-line field
/// and the header block are omitted from serialization when empty/zero,
/// which is what makes [`Response::head_bytes`] usable as a standalone
/// header-block emission before a body is streamed separately.
#[derive(Debug, Clone)]
pub struct Response {
    pub protocol: String,
    pub code: u16,
    pub reason: String,
    /// Header mapping; keys are unique, serialization order is the key
    /// order.
    pub headers: BTreeMap<String, String>,
    /// Body bytes. `Bytes` is reference-counted, so serialization never
    /// copies the body.
    pub body: Bytes,
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Serializes the status line and header block, without the body.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        let mut status_line = String::new();
        if !self.protocol.is_empty() {
            status_line.push_str(&self.protocol);
        }
        if self.code != 0 {
            if !status_line.is_empty() {
                status_line.push(' ');
            }
            status_line.push_str(&self.code.to_string());
        }
        if !self.reason.is_empty() {
            if !status_line.is_empty() {
                status_line.push(' ');
            }
            status_line.push_str(&self.reason);
        }
        if !status_line.is_empty() {
            buf.extend_from_slice(status_line.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        if !self.headers.is_empty() {
            for (key, value) in &self.headers {
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(b": ");
                buf.extend_from_slice(value.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            buf.extend_from_slice(b"\r\n");
        }

        buf
    }

    /// Serializes the full response: head block, then body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.head_bytes();
        buf.extend_from_slice(&self.body);
        buf
    }

    pub fn method_not_allowed() -> Self {
        Self::canned(StatusCode::MethodNotAllowed, "405 method not allowed")
    }

    pub fn not_found() -> Self {
        Self::canned(StatusCode::NotFound, "404 not found")
    }

    pub fn internal_server_error() -> Self {
        Self::canned(StatusCode::InternalServerError, "500 internal server error")
    }

    fn canned(status: StatusCode, body: &'static str) -> Self {
        Response::builder()
            .status(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Connection", "close")
            .body(Bytes::from_static(body.as_bytes()))
            .build()
    }
}

/// Builder for constructing responses in a fluent style.
///
/// # Example
///
/// ```
/// # use granite::http::response::{Response, StatusCode};
/// let response = Response::builder()
///     .status(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body("<h1>Hi</h1>".into())
///     .build();
/// ```
pub struct ResponseBuilder {
    protocol: String,
    code: u16,
    reason: String,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            protocol: "HTTP/1.1".to_string(),
            code: 0,
            reason: String::new(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Sets both status-line fields from a [`StatusCode`].
    pub fn status(mut self, status: StatusCode) -> Self {
        self.code = status.as_u16();
        self.reason = status.reason_phrase().to_string();
        self
    }

    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Builds the response. When a body is present and no Content-Length
    /// was set explicitly, one is derived from the body size.
    pub fn build(mut self) -> Response {
        if !self.body.is_empty() {
            self.headers
                .entry("Content-Length".to_string())
                .or_insert_with(|| self.body.len().to_string());
        }

        Response {
            protocol: self.protocol,
            code: self.code,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

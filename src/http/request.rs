use std::collections::HashMap;

/// HTTP request methods.
///
/// The server serves GET only; the other verbs are parsed so the pipeline
/// can answer them with 405 Method Not Allowed instead of dropping the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
}

impl Method {
    /// Parses an HTTP method from its uppercase wire form.
    ///
    /// # Example
    ///
    /// ```
    /// # use granite::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

/// A parsed HTTP request head.
///
/// One request is parsed per connection and discarded once the response has
/// been sent. Request bodies are never read.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// The raw request target (e.g. "/index.html" or "/search?q=x").
    pub target: String,
    /// HTTP version (typically "HTTP/1.1").
    pub version: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Retrieves a header value by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Whether the client advertised gzip support in Accept-Encoding.
    pub fn accepts_gzip(&self) -> bool {
        self.header("Accept-Encoding")
            .map(|v| v.contains("gzip"))
            .unwrap_or(false)
    }
}

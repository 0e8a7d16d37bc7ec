use std::collections::HashMap;

use crate::http::request::{Method, Request};

/// Upper bound on the request head. A connection whose request line plus
/// headers exceed this is treated as malformed.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    HeadTooLarge,
    Incomplete,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidRequest => write!(f, "malformed request line"),
            ParseError::InvalidMethod => write!(f, "unknown HTTP method"),
            ParseError::InvalidHeader => write!(f, "malformed header line"),
            ParseError::HeadTooLarge => write!(f, "request head exceeds {} bytes", MAX_HEAD_BYTES),
            ParseError::Incomplete => write!(f, "incomplete request head"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses one HTTP request head (request line + headers) from `buf`.
///
/// Returns the request and the number of bytes consumed. `Incomplete` means
/// the caller should read more input and retry; every other error is a
/// protocol violation that aborts the connection.
pub fn parse_request_head(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let head_end = match find_head_end(buf) {
        Some(pos) if pos > MAX_HEAD_BYTES => return Err(ParseError::HeadTooLarge),
        Some(pos) => pos,
        None if buf.len() > MAX_HEAD_BYTES => return Err(ParseError::HeadTooLarge),
        None => return Err(ParseError::Incomplete),
    };

    let head = std::str::from_utf8(&buf[..head_end]).map_err(|_| ParseError::InvalidRequest)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    let request = Request {
        method,
        target: target.to_string(),
        version: version.to_string(),
        headers,
    };

    Ok((request, head_end + 4))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

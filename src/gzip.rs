//! Gzip encoding policy and encoder.
//!
//! Compression is all-or-nothing per response: an eligible file is
//! compressed into an in-memory buffer before any header is written, so
//! Content-Length is known up front. There is no chunked-encoding or
//! streaming-compression fallback; the peak extra memory per request is the
//! compressed size of the served file.

use std::io::Write;

use anyhow::Context;
use flate2::Compression;
use flate2::write::GzEncoder;
use regex::Regex;

use crate::config::Config;

/// Read-only compression policy, shared by reference across all workers.
pub struct GzipPolicy {
    enabled: bool,
    /// None means the encoder's default level.
    level: Option<u32>,
    threshold: u64,
    exclude: Regex,
}

impl GzipPolicy {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let exclude = Regex::new(config.gzip_exclude())
            .context("invalid gzip exclude pattern")?;
        Ok(Self {
            enabled: config.gzip.enabled,
            level: (config.gzip.level > 0).then_some(config.gzip.level),
            threshold: config.gzip.threshold,
            exclude,
        })
    }

    /// Whether a response body should be compressed. Pure function of the
    /// client's Accept-Encoding, the policy, the file size and the file
    /// name.
    pub fn eligible(&self, accepts_gzip: bool, size: u64, file_name: &str) -> bool {
        accepts_gzip && self.enabled && size > self.threshold && !self.exclude.is_match(file_name)
    }

    /// Compresses the whole source buffer into memory.
    pub fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let level = self
            .level
            .map(Compression::new)
            .unwrap_or_else(Compression::default);
        let mut encoder = GzEncoder::new(Vec::new(), level);
        encoder.write_all(data)?;
        encoder.finish()
    }
}

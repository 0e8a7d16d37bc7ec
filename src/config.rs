//! Server configuration.
//!
//! The configuration is read from a YAML file (path taken from the
//! `GRANITE_CONFIG` environment variable, `./granite.yaml` by default).
//! Every field has a default except the web root; [`Config::validate`]
//! enforces the startup rules that must hold before any listener binds.

use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::logging::Level;

pub const DEFAULT_GZIP_EXCLUDE: &str = "(jpeg|jpg|png|pdf)$";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub connections: ConnectionsConfig,
    pub gzip: GzipConfig,
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listeners bind to.
    pub address: String,
    pub port: u16,
    /// Root directory all served paths must resolve under. No default;
    /// leaving it empty is a fatal configuration error.
    pub web_root: String,
    /// Worker pool size. 0 means host parallelism.
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Level,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Per-connection read deadline, in seconds.
    pub read_timeout: u64,
    /// Per-connection write deadline, in seconds.
    pub write_timeout: u64,
    /// Maximum connection dispatch rate per second. 0 disables pacing.
    pub max_connections: u32,
    /// Inbound queue capacity; acceptors wait when it is full.
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GzipConfig {
    pub enabled: bool,
    /// Compression level, 1 (best speed) to 9 (best compression).
    /// 0 means the encoder's default.
    pub level: u32,
    /// Files at or below this size (bytes) are never compressed.
    pub threshold: u64,
    /// Regex matched against the file name; matches are never compressed.
    /// Empty means the stock image/pdf exclusion.
    pub exclude: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub port: u16,
    pub cert: String,
    pub key: String,
    /// Optional extra root CA bundle appended to the trust store.
    pub root_ca: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            web_root: String::new(),
            workers: 0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::Info }
    }
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            write_timeout: 30,
            max_connections: 0,
            queue_depth: 1024,
        }
    }
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 0,
            threshold: 1500,
            exclude: String::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from the path in `GRANITE_CONFIG`, falling
    /// back to `./granite.yaml`. A missing file yields the defaults; whether
    /// those defaults are usable is decided by [`Config::validate`].
    pub fn load() -> anyhow::Result<Self> {
        let path =
            std::env::var("GRANITE_CONFIG").unwrap_or_else(|_| "./granite.yaml".to_string());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("invalid configuration file")
    }

    /// Applies the fatal startup rules. Called once before any listener
    /// binds; an error here terminates the process.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.web_root.is_empty() {
            bail!("no web root specified in the configuration");
        }
        if !Path::new(&self.server.web_root).is_dir() {
            bail!("web root {} is not a directory", self.server.web_root);
        }
        if self.gzip.enabled && self.gzip.level > 9 {
            bail!(
                "gzip level {} is invalid, expected 1 (best speed) to 9 (best compression)",
                self.gzip.level
            );
        }
        if self.tls.enabled {
            if self.tls.cert.is_empty() {
                bail!("TLS is enabled but no certificate path was specified");
            }
            if self.tls.key.is_empty() {
                bail!("TLS is enabled but no key path was specified");
            }
        }
        Ok(())
    }

    /// Worker pool size, resolving 0 to the host parallelism.
    pub fn worker_count(&self) -> usize {
        if self.server.workers > 0 {
            self.server.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Gzip exclude pattern, resolving the empty string to the stock one.
    pub fn gzip_exclude(&self) -> &str {
        if self.gzip.exclude.is_empty() {
            DEFAULT_GZIP_EXCLUDE
        } else {
            &self.gzip.exclude
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    pub fn tls_bind_addr(&self) -> String {
        let port = if self.tls.port > 0 { self.tls.port } else { 8000 };
        format!("{}:{}", self.server.address, port)
    }
}

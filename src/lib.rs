//! Granite - Concurrent Static File Server
//!
//! Core library: configuration, the HTTP pipeline, file resolution, the
//! gzip policy, the asynchronous log channel and server orchestration.

pub mod config;
pub mod files;
pub mod gzip;
pub mod http;
pub mod logging;
pub mod server;

//! HTTP protocol implementation.
//!
//! This layer implements the one-request-per-connection serving model:
//! every accepted connection carries exactly one HTTP/1.1 request, gets
//! exactly one response (or a silent close when nothing can be safely
//! sent), and is then closed — `Connection: close` is always set and
//! keep-alive is never offered.
//!
//! # Submodules
//!
//! - **`connection`**: the per-connection pipeline
//! - **`parser`**: parses a request head from a byte buffer
//! - **`request`**: parsed request representation
//! - **`response`**: response model with builder and serialization
//!
//! # Pipeline states
//!
//! Each connection advances through a fixed sequence:
//!
//! ```text
//! Accepted → DeadlineSet → RequestParsed ─┬→ MethodRejected (405)
//!                                         └→ PathResolved ─┬→ NotFound  (404)
//!                                                          ├→ StatError (500)
//!                                                          └→ Served    (200)
//! all of the above → Closed
//! ```
//!
//! Deadlines are fixed before any byte is read; parse failures and deadline
//! expiry abort the connection without a response; the connection is closed
//! and summarized to the log channel on every exit path.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;

//! Transparent accounting proxy for raw print jobs.
//!
//! Sits between print clients and networked printers: buffers each raw job,
//! correlates it with per-job credentials pushed out-of-band over a local
//! HTTP endpoint, injects vendor-specific accounting directives into the
//! byte stream, and forwards the result to the real device.

pub mod codec;
pub mod config;
pub mod gateway;
pub mod inject;
pub mod model;
pub mod notify;
pub mod relay;
pub mod runtime;

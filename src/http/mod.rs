//! HTTP server module.
//!
//! The liveness server is plain HTTP: the hosting platform terminates TLS in
//! front of it. The server includes:
//! - Binding from configuration (with the platform `PORT` override already applied)
//! - Graceful shutdown on SIGTERM/SIGINT, shared with the supervisor's idle loop

mod server;
mod shutdown;

pub use server::{serve, start_server, ServerError};
pub use shutdown::shutdown_signal;

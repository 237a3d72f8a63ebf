//! Vigil: keeps a background bot worker alive on single-process hosting platforms.
//!
//! Two independent components share this crate:
//! - the liveness server ([`routes`], [`http`]), run by the platform as the
//!   foreground process and answering `/` and `/health` probes;
//! - the [`supervisor`], run once by an operator, which launches the worker as a
//!   detached process and then idles forever to hold the session open.
//!
//! They communicate only through the filesystem: the worker log file and the
//! optional [`heartbeat`] file.

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod supervisor;

pub use error::AppError;

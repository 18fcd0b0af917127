//! Operator-facing surfaces of the fingerprint terminal.
//!
//! - [`http`]: axum router with the `/fp` command endpoint, the SSE event
//!   stream and the `/api` template administration routes
//! - [`sse`]: [`EventHub`], the notification queue's delivery transport
//! - [`console`]: line-based command interpreter for stdin
//!
//! Both the HTTP routes and the console act on the same [`AppState`].

pub mod console;
pub mod http;
pub mod sse;
pub mod state;

pub use console::{Command, CommandError, Console, USAGE};
pub use http::{CommandParams, HttpError, LANDING_TEXT, router, serve};
pub use sse::{EventHub, event_stream};
pub use state::AppState;

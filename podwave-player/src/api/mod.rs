//! HTTP/SSE control surface
//!
//! Playback control, narration browsing and the live event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};

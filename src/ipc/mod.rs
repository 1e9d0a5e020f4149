//! Line-delimited JSON protocol: one `Request` in, one envelope out.

mod handlers;
mod helpers;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, FilterSession, Request, SessionStore};

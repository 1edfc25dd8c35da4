//! Visitor Sessions
//!
//! Anonymous visitors are identified by an opaque cookie token. Everything a
//! visitor owns (tasks, uploads, outputs) hangs off that token:
//! - `store`: in-memory session map with inactivity expiry
//! - `token`: unguessable token generation
//! - `workspace`: per-session working directories on disk

pub mod store;
pub mod token;
pub mod workspace;

pub use store::{ResolvedSession, Session, SessionStore};
pub use token::{generate_token, GeneratedToken, TOKEN_BYTES};
pub use workspace::SessionWorkspace;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "bitext_session";

//! Bitext Server Library
//!
//! Document translation pipeline behind the `bitext-server` binary.
//!
//! # Modules
//!
//! - `document`: Unified document abstraction (format-agnostic)
//! - `formats`: EPUB and PDF parsing and rebuilding
//! - `provider`: AI completion backends
//! - `translate`: Prompting, retries and cache lookups per block
//! - `cache`: Persistent, content-addressed translation cache
//! - `tasks`: Background translation tasks
//! - `session`: Anonymous visitor sessions
//! - `routes`: HTTP API

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod formats;
pub mod provider;
pub mod routes;
pub mod session;
pub mod state;
pub mod tasks;
pub mod translate;

//! Translation Client
//!
//! Combines the translation cache with a completion provider:
//! cache lookup, provider call with retries on miss, write-through on success.

mod client;
mod prompt;

pub use client::{Origin, RetryPolicy, Translation, Translator};
pub use prompt::{language_name, needs_translation, system_prompt};

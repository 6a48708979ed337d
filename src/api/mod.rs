//! Read-only HTTP API.
//!
//! Handlers project stored school documents into JSON payloads for external clients.

mod schools;

pub use schools::*;

//! Common utilities and types shared across Stream Gateway components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the timestamp format used in streamed items
pub mod time;

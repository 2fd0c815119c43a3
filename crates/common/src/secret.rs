//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the gateway. The event bus
//! URL is the main secret we carry: Redis URLs routinely embed credentials
//! (`redis://:password@host:6379`), so they are held as [`SecretString`] from
//! the moment they are read out of the environment.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to log with `{:?}` or through `tracing`.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BusSettings {
//!     channel: String,
//!     url: SecretString,
//! }
//!
//! let settings = BusSettings {
//!     channel: "from-akka-apps-redis-channel".to_string(),
//!     url: SecretString::from("redis://:hunter2@redis:6379"),
//! };
//!
//! assert!(!format!("{settings:?}").contains("hunter2"));
//! assert_eq!(settings.url.expose_secret(), "redis://:hunter2@redis:6379");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

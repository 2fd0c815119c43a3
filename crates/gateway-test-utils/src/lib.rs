//! # Gateway Test Utilities
//!
//! Shared fixtures for Stream Gateway tests, so scenarios can be written
//! without a Redis server or a client transport.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! let directory = ConnectionDirectory::new();
//! let (_conn, mut rx) = TestConnection::new("meeting-1", "alice")
//!     .subscribed(ManagedOperation::NotificationStream, "sub-1")
//!     .attach(&directory);
//!
//! router.route_raw(&BusEventBuilder::notify_all("meeting-1", "app.toast").build());
//! let frames = drain_frames(&mut rx);
//! ```

pub mod fixtures;

pub use fixtures::*;

//! Stream Gateway Library
//!
//! Real-time fan-out layer sitting between the meeting backend's event bus
//! and clients speaking a GraphQL-over-WebSocket style subscription
//! protocol. A handful of high-volume streams (chat, notifications and
//! voice activity) are served directly from bus events instead of being
//! forwarded to the GraphQL engine:
//!
//! - Bus events are decoded once and routed to every eligible connection
//! - Each payload is serialized once and personalized per subscriber id
//! - Voice streams keep a last-value cache replayed to late subscribers
//! - A slow client loses frames; it never stalls routing for others
//!
//! # Architecture
//!
//! ```text
//! BusSubscriber (one task, Redis pub/sub)
//! └── EventRouter::route_raw (inline, per-meeting order preserved)
//!     ├── ConnectionDirectory  -> eligible connections
//!     ├── SubscriptionRegistry -> subscriber ids per connection
//!     ├── framer               -> one frame, personalized per id
//!     ├── DeliveryChannel      -> bounded queue per connection
//!     │   └── OutboundWriter   -> client transport
//!     └── VoiceStateCaches     -> mute / talk / voice snapshots
//! ```
//!
//! Subscribe and complete frames from clients enter through
//! [`subscriptions::StreamingSubscriptions`].
//!
//! # Modules
//!
//! - [`bus`] - Event bus subscriber
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-safe messages
//! - [`router`] - Per-event handlers

pub mod bus;
pub mod cache;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod directory;
pub mod errors;
pub mod events;
pub mod framer;
pub mod items;
pub mod observability;
pub mod operations;
pub mod registry;
pub mod router;
pub mod subscriptions;

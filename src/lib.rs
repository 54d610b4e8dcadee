//! # telebuf
//!
//! Core library for telebuf - a lightweight client-side telemetry
//! collector.
//!
//! This library provides:
//! - A topic bus for in-process publish/subscribe fan-out
//! - A tracking buffer with capture policy, batching, and best-effort flush
//! - Cross-context mirroring over a named broadcast channel
//! - Injected delivery capabilities (beacon-style and keep-alive HTTP)
//!
//! ## Architecture
//!
//! Events flow publisher → buffer → transport:
//!
//! ```text
//! CaptureSource ──► Tracker ──┬─► Bus topic "tracking" (local subscribers)
//!   (notifications)           ├─► ContextChannel (sibling contexts)
//!                             └─► buffer ──flush──► Beacon / Transport
//! ```
//!
//! The core is single-threaded and event-driven; the only asynchronous
//! boundary is the transport send, which `flush()` initiates but never
//! awaits. Delivery is at-most-once: a failed batch is lost by design.
//!
//! ## Example
//!
//! ```rust,no_run
//! use telebuf::{Tracker, TrackerConfig, EventKind, Notification};
//!
//! let config = TrackerConfig::new("https://telemetry.example.com/t");
//! let mut tracker = Tracker::new(config).expect("invalid tracker config");
//! tracker.connect_http_transport().expect("failed to build transport");
//! tracker.start();
//!
//! // Host wiring feeds raw notifications into the capture policy
//! tracker.observe(Notification::interaction(EventKind::Click, Some("signup-button")));
//! ```

// Re-export commonly used items at the crate root
pub use bus::{Bus, Handler};
pub use channel::{ContextChannel, LocalChannel, LocalChannelHub};
pub use config::{Config, LoggingConfig, TrackerConfig};
pub use error::{Error, Result};
pub use tracking::{
    CaptureSource, EventKind, Notification, NotificationSink, TrackedEvent, Tracker,
    GLOBAL_ERROR_ID, REJECTION_ID, TRACKING_TOPIC,
};
pub use transport::{Beacon, HttpTransport, Transport};

// Public modules
pub mod bus;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod tracking;
pub mod transport;

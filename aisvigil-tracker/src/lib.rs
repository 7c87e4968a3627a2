//! # Aisvigil Tracker
//!
//! Live AIS target tracking runtime: sentence ingestion, a concurrent
//! target database, CPA/TCPA collision surveillance, safety broadcast
//! generation and timing-faithful log replay.
//!
//! Built on [`aisvigil_core`] for the platform-independent logic; this
//! crate owns the threads and the file I/O.
//!
//! ```text
//! [LogReplaySource | live transport]
//!          |
//!          v  NmeaSentence
//!   AisManager::send_sentence ---> SentenceCache (own-ship fix)
//!          |                          ^
//!          v  AisCodec seam           | PositionProvider
//!     TargetStore <------------- surveillance thread
//!          |                          |
//!          v                          v
//!    target queries          WarningLedger -> outbound sentences
//!                                             + message callbacks
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aisvigil_core::{Mmsi, SystemClock};
//! use aisvigil_tracker::{AisManager, AisManagerConfig};
//!
//! # fn codec() -> Arc<dyn aisvigil_core::AisCodec> { unimplemented!() }
//! let manager = AisManager::new(
//!     AisManagerConfig::new(Mmsi(244123456), "MY VESSEL"),
//!     codec(),
//!     Arc::new(SystemClock),
//! );
//! manager.on_message(|event| {
//!     println!("AIS message from {}: {}", event.source_mmsi, event.text);
//! });
//! manager.enable_ais_alarms(true, None);
//! ```
//!
//! The collision geometry computed here is an estimate over straight-line
//! tracks. It is advisory only and is no substitute for a proper lookout
//! or radar-grade collision prediction.

pub mod cache;
pub mod manager;
pub mod replay;

pub use cache::SentenceCache;
pub use manager::{
    AisError, AisManager, AisManagerConfig, MessageEvent, CLEANUP_LATENCY, MIN_SAFETY_CHECK_SLEEP,
};
pub use replay::{LogReplaySource, ReplayInput};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Yambol - In-Memory Message Broker
//!
//! An in-memory, multi-queue message broker providing:
//! - Bounded FIFO queues with per-item TTL and drop-on-expiry accounting
//! - Publish fan-out, broadcast and consume routing over named queues
//! - A process-wide running configuration with auto-persist to a startup file
//! - A REST control/data plane, an HTML frontend and a gRPC surface
//!
//! ## Architecture
//!
//! The broker owns all queue state; every network surface holds a shared
//! handle to it and to the configuration state:
//! ```text
//!   REST / HTML / gRPC  →  ┌─────────────────────────────────┐
//!                          │            Broker               │
//!                          │  ┌────────┐ ┌────────┐          │
//!                          │  │ Queues │ │ Stats  │          │
//!                          │  │ (FIFO) │ │Collect.│          │
//!                          │  └────────┘ └────────┘          │
//!                          └───────────────┬─────────────────┘
//!                                          │ mirrors topology
//!                          ┌───────────────▼─────────────────┐
//!                          │  ConfigState (auto-save → file) │
//!                          └─────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod broker;
pub mod client;
pub mod config;
pub mod frontend;
pub mod grpc;
pub mod proto;
pub mod queue;
pub mod rest;
pub mod telemetry;
pub mod types;

// Internal utilities
pub mod observability;

pub use config::Configuration;
pub use types::{Error, Result};

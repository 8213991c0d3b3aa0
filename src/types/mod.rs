//! Core types for the Yambol broker.
//!
//! This module provides the application error taxonomy shared by the queue
//! engine, the broker, the configuration state and every network surface.

mod errors;

pub use errors::{Error, Result};

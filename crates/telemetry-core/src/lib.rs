//! Shared building blocks for the journey telemetry workspace.
//!
//! Holds the recorded data model, the fixed chokepoint catalog, the error
//! type, the clock seam, the observable-state primitive, CLI settings, and
//! time and number formatting helpers.

pub mod catalog;
pub mod clock;
pub mod error;
pub mod formatting;
pub mod models;
pub mod observable;
pub mod settings;
pub mod time_utils;

pub use error::{Result, TelemetryError};

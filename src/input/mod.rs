//! Input sources for the ambient controller.
//!
//! Current input sources:
//! - `mqtt`: contact sensor events published by the sensor board

pub mod mqtt;

//! Glovelight - drive Hue light colors from MIDI CC sliders
//!
//! Two CC numbers on a MIDI channel become the X/Y chromaticity of a set of
//! lights. Controllers decode and rate-gate the CC stream; one dispatcher
//! serializes and rate-gates the resulting writes to the bridge.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod glovelight;
pub mod midi;
pub mod paths;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GlovelightConfig;
pub use glovelight::{Glovelight, GlovelightError, RunningGlovelight};

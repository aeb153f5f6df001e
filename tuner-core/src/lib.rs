// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate turns a noisy stream of pitch tracker samples into a stable
//! tuning reading: the closest pitch and how far off it is in cents.
//! It is completely headless and contains no GUI code.

pub mod audio;
pub mod conditioner;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod pitch;
pub mod session;
pub mod sustain;
pub mod tuning;

pub use config::TunerConfig;
pub use engine::TunerEngine;
pub use pitch::{Pitch, PitchClass};
pub use session::{SubscriptionId, TuningMode, TuningReading, TuningSession};
pub use tuning::{Instrument, TuningPreset};

/// A single pitch tracker measurement, delivered once per analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Estimated fundamental frequency in Hz, or 0.0 when no pitch was found.
    pub frequency: f32,
    /// Signal amplitude of the analysed frame.
    pub amplitude: f32,
}

impl Sample {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self { frequency, amplitude }
    }
}

//! # Signal Conditioning Module
//!
//! Suppresses noise and jitter from the raw pitch tracker before note matching.
//!
//! ## Stages
//! - Noise gate: quiet samples are treated as silence and flush the history
//! - Smoothing: a fixed-size moving average over the most recent accepted samples

use std::collections::VecDeque;

/// Noise gate plus moving average over the raw tracker frequencies.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    minimum_amplitude: f32,
    window: usize,
    frequencies: VecDeque<f32>,
}

impl SignalConditioner {
    /// Creates a conditioner. A window of zero is treated as one.
    pub fn new(minimum_amplitude: f32, window: usize) -> Self {
        let window = window.max(1);
        Self {
            minimum_amplitude,
            window,
            frequencies: VecDeque::with_capacity(window),
        }
    }

    /// Processes one tracker sample.
    ///
    /// A sample at or below the amplitude gate, or one without a usable
    /// frequency, clears the history so that the next note attack is not
    /// averaged with data from before the silence.
    ///
    /// # Arguments
    /// * `frequency` - Raw tracker frequency in Hz
    /// * `amplitude` - Raw tracker amplitude
    ///
    /// # Returns
    /// * `Some(frequency)` - Mean of the buffered frequencies
    /// * `None` - Treat this callback as silence
    pub fn process(&mut self, frequency: f32, amplitude: f32) -> Option<f32> {
        let gated = amplitude.is_nan() || amplitude <= self.minimum_amplitude;
        if gated || !frequency.is_finite() || frequency <= 0.0 {
            self.frequencies.clear();
            return None;
        }

        if self.frequencies.len() == self.window {
            self.frequencies.pop_front();
        }
        self.frequencies.push_back(frequency);

        let sum: f32 = self.frequencies.iter().sum();
        Some(sum / self.frequencies.len() as f32)
    }

    pub fn reset(&mut self) {
        self.frequencies.clear();
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

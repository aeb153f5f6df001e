//! # Note Matching Module
//!
//! Maps a conditioned frequency to the closest musical pitch and its deviation in
//! cents. Three mutually exclusive matching strategies are provided:
//!
//! - **Chromatic**: free search over all twelve pitch classes, any octave
//! - **Fixed target**: deviation from one explicitly chosen pitch
//! - **Preset**: search restricted to the strings of a tuning preset
//!
//! All three apply the same dead-zone, clamping tiny deviations to exactly zero
//! so a tuner needle does not jitter around perfect pitch.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::pitch::{CONCERT_A4, Pitch, PitchClass, cents_between};

/// Default dead-zone half width in cents.
pub const DEFAULT_DEAD_ZONE_CENTS: f32 = 5.0;

/// Result of matching one frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// The matched (or given) target pitch.
    pub pitch: Pitch,
    /// The frequency that was matched, in Hz.
    pub frequency: f32,
    /// Signed deviation from the target: positive is sharp, negative is flat.
    pub deviation_cents: f32,
}

/// Frequency to pitch matcher for a fixed concert pitch and dead-zone.
#[derive(Debug, Clone)]
pub struct NoteMatcher {
    reference_a4: f32,
    dead_zone_cents: f32,
    /// Frequencies of C0..B0 in chromatic order.
    reference_octave: [f32; 12],
    window_low: f32,
    window_high: f32,
}

impl Default for NoteMatcher {
    fn default() -> Self {
        Self::with_valid_reference(CONCERT_A4, DEFAULT_DEAD_ZONE_CENTS)
    }
}

impl NoteMatcher {
    /// Creates a matcher.
    ///
    /// The folding window spans one octave starting a quarter tone below C0,
    /// so every frequency lands next to the pitch class it is closest to.
    ///
    /// # Arguments
    /// * `reference_a4` - Concert pitch for A4 in Hz
    /// * `dead_zone_cents` - Deviations with a smaller magnitude are reported as 0
    ///
    /// # Returns
    /// * `Ok(matcher)` - The reference is a positive, finite frequency
    /// * `Err(e)` - Folding against this reference would never terminate
    pub fn new(reference_a4: f32, dead_zone_cents: f32) -> Result<Self> {
        if !reference_a4.is_finite() || reference_a4 <= 0.0 {
            return Err(anyhow!("reference_a4 must be positive, got {}", reference_a4));
        }
        if !dead_zone_cents.is_finite() || dead_zone_cents < 0.0 {
            return Err(anyhow!(
                "dead_zone_cents must be a non-negative number, got {}",
                dead_zone_cents
            ));
        }
        let matcher = Self::with_valid_reference(reference_a4, dead_zone_cents);
        if !(matcher.window_low > 0.0 && matcher.window_high.is_finite()) {
            return Err(anyhow!("reference_a4 {} is out of range", reference_a4));
        }
        Ok(matcher)
    }

    fn with_valid_reference(reference_a4: f32, dead_zone_cents: f32) -> Self {
        let reference_octave = PitchClass::ALL.map(|pitch_class| {
            Pitch::new(pitch_class, 0).frequency_with_reference(reference_a4)
        });
        let window_low = reference_octave[0] * 2.0_f32.powf(-1.0 / 24.0);
        Self {
            reference_a4,
            dead_zone_cents,
            reference_octave,
            window_low,
            window_high: window_low * 2.0,
        }
    }

    pub fn reference_a4(&self) -> f32 {
        self.reference_a4
    }

    pub fn dead_zone_cents(&self) -> f32 {
        self.dead_zone_cents
    }

    /// Brings a frequency into the reference octave by halving or doubling it.
    ///
    /// Octave steps do not change the pitch class, and tracker output is already
    /// in the audible range, so plain stepping only takes a handful of iterations.
    ///
    /// # Returns
    /// * `Some(folded)` - Frequency inside the reference octave
    /// * `None` - The input was not a positive, finite frequency
    pub fn fold_into_reference_octave(&self, frequency: f32) -> Option<f32> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        let mut folded = frequency;
        while folded >= self.window_high {
            folded /= 2.0;
        }
        while folded < self.window_low {
            folded *= 2.0;
        }
        Some(folded)
    }

    /// Finds the closest chromatic pitch in any octave.
    ///
    /// This function:
    /// 1. Folds the frequency into the reference octave
    /// 2. Picks the reference pitch class with the smallest distance in Hz
    /// 3. Recovers the octave from the number of folding steps
    /// 4. Computes the deviation against the reference and applies the dead-zone
    ///
    /// # Arguments
    /// * `frequency` - Conditioned frequency in Hz
    ///
    /// # Returns
    /// * `Some(detection)` - Closest pitch and deviation
    /// * `None` - The frequency was not positive and finite
    pub fn detect_chromatic(&self, frequency: f32) -> Option<Detection> {
        let folded = self.fold_into_reference_octave(frequency)?;

        let (pitch_class, reference) = PitchClass::ALL
            .iter()
            .zip(self.reference_octave.iter())
            .min_by(|a, b| compare_distance(*a.1, *b.1, folded))?;

        let octave = (frequency / folded).log2().round() as i32;

        Some(Detection {
            pitch: Pitch::new(*pitch_class, octave),
            frequency,
            deviation_cents: self.apply_dead_zone(cents_between(folded, *reference)),
        })
    }

    /// Measures the deviation from a fixed target pitch. No search is done, so
    /// a detection is always produced.
    pub fn detect_against(&self, frequency: f32, target: Pitch) -> Detection {
        let target_frequency = target.frequency_with_reference(self.reference_a4);
        Detection {
            pitch: target,
            frequency,
            deviation_cents: self.apply_dead_zone(cents_between(frequency, target_frequency)),
        }
    }

    /// Finds the closest pitch among a preset's strings.
    ///
    /// Preset pitches are concrete and octave specific, so no folding is done.
    /// Ties go to the pitch listed first.
    ///
    /// # Arguments
    /// * `frequency` - Conditioned frequency in Hz
    /// * `pitches` - Candidate pitches, in string order
    ///
    /// # Returns
    /// * `Some(detection)` - Closest candidate and deviation
    /// * `None` - No candidates, or the frequency was not positive and finite
    pub fn detect_in_preset(&self, frequency: f32, pitches: &[Pitch]) -> Option<Detection> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        let (pitch, target_frequency) = pitches
            .iter()
            .map(|pitch| (*pitch, pitch.frequency_with_reference(self.reference_a4)))
            .min_by(|a, b| compare_distance(a.1, b.1, frequency))?;

        Some(Detection {
            pitch,
            frequency,
            deviation_cents: self.apply_dead_zone(cents_between(frequency, target_frequency)),
        })
    }

    fn apply_dead_zone(&self, deviation: f32) -> f32 {
        if deviation.abs() < self.dead_zone_cents {
            0.0
        } else {
            deviation
        }
    }
}

fn compare_distance(a: f32, b: f32, frequency: f32) -> Ordering {
    (a - frequency)
        .abs()
        .partial_cmp(&(b - frequency).abs())
        .unwrap_or(Ordering::Equal)
}

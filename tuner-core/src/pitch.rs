//! # Pitch Model Module
//!
//! This module defines the musical value types the rest of the engine works with:
//! the twelve chromatic pitch classes and concrete pitches (pitch class plus octave).
//!
//! ## Features
//! - Equal temperament frequency calculation referenced to A4
//! - Sharp or flat display names for accidentals
//! - Cent deviation arithmetic between two frequencies

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard concert pitch for A4 in Hz.
pub const CONCERT_A4: f32 = 440.0;

/// One of the twelve chromatic note names, independent of octave.
///
/// Variants are declared in chromatic order starting at C, so the
/// declaration order doubles as the semitone index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting at C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone index within the octave (C = 0, A = 9, B = 11).
    pub const fn semitone_index(self) -> i32 {
        self as i32
    }

    /// Returns the display name of this pitch class.
    ///
    /// Natural notes are identical in both spellings. Accidentals are
    /// spelled with `♭` when `use_flats` is set, with `♯` otherwise.
    ///
    /// # Arguments
    /// * `use_flats` - Spell accidentals as flats (e.g. "D♭") instead of sharps ("C♯")
    pub fn name(self, use_flats: bool) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => if use_flats { "D♭" } else { "C♯" },
            PitchClass::D => "D",
            PitchClass::DSharp => if use_flats { "E♭" } else { "D♯" },
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => if use_flats { "G♭" } else { "F♯" },
            PitchClass::G => "G",
            PitchClass::GSharp => if use_flats { "A♭" } else { "G♯" },
            PitchClass::A => "A",
            PitchClass::ASharp => if use_flats { "B♭" } else { "A♯" },
            PitchClass::B => "B",
        }
    }

    /// The pitch class one semitone below, wrapping from C to B.
    pub fn previous(self) -> PitchClass {
        Self::ALL[(self.semitone_index() + 11) as usize % 12]
    }

    /// The pitch class one semitone above, wrapping from B to C.
    pub fn next(self) -> PitchClass {
        Self::ALL[(self.semitone_index() + 1) as usize % 12]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name(false))
    }
}

/// A concrete pitch: a pitch class in a specific octave (scientific pitch notation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pitch {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Pitch {
    pub const fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Number of semitones between this pitch and A4 (negative below A4).
    pub fn semitones_from_a4(&self) -> i32 {
        let from_a = self.pitch_class.semitone_index() - PitchClass::A.semitone_index();
        (self.octave - 4) * 12 + from_a
    }

    /// Equal temperament frequency of this pitch with A4 = 440 Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency_with_reference(CONCERT_A4)
    }

    /// Equal temperament frequency of this pitch for a given concert pitch.
    ///
    /// The formula is `f = a4 * 2^(n/12)` where `n` is the number of
    /// semitones away from A4.
    ///
    /// # Arguments
    /// * `reference_a4` - Frequency of A4 in Hz
    ///
    /// # Returns
    /// * Frequency in Hz
    pub fn frequency_with_reference(&self, reference_a4: f32) -> f32 {
        reference_a4 * 2.0_f32.powf(self.semitones_from_a4() as f32 / 12.0)
    }

    /// Display name including the octave number, e.g. "E♭2" or "D♯2".
    pub fn name(&self, use_flats: bool) -> String {
        format!("{}{}", self.pitch_class.name(use_flats), self.octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(false), self.octave)
    }
}

/// Calculates the interval from `target` to `frequency` in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// # Arguments
/// * `frequency` - Measured frequency in Hz
/// * `target` - Target frequency in Hz
///
/// # Returns
/// * Cent deviation (positive = sharp, negative = flat)
pub fn cents_between(frequency: f32, target: f32) -> f32 {
    1200.0 * (frequency / target).log2()
}

//! # Tuning Catalogue Module
//!
//! This module holds the closed catalogue of instrument tuning presets. Each preset
//! is an ordered list of target pitches, one per string, from the lowest string
//! to the highest as the player sees them on the headstock.
//!
//! ## Features
//! - Guitar standard and alternate tunings (drop, open, DADGAD, half step down)
//! - Bass and ukulele standard tunings
//! - Instrument grouping, where the chromatic instrument has no presets
//! - Stable string identifiers for preset lookup

use crate::pitch::{Pitch, PitchClass};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use PitchClass::*;

const GUITAR_STANDARD: [Pitch; 6] = [
    Pitch::new(E, 2),
    Pitch::new(A, 2),
    Pitch::new(D, 3),
    Pitch::new(G, 3),
    Pitch::new(B, 3),
    Pitch::new(E, 4),
];

const GUITAR_DROP_D: [Pitch; 6] = [
    Pitch::new(D, 2),
    Pitch::new(A, 2),
    Pitch::new(D, 3),
    Pitch::new(G, 3),
    Pitch::new(B, 3),
    Pitch::new(E, 4),
];

const GUITAR_OPEN_G: [Pitch; 6] = [
    Pitch::new(D, 2),
    Pitch::new(G, 2),
    Pitch::new(D, 3),
    Pitch::new(G, 3),
    Pitch::new(B, 3),
    Pitch::new(D, 4),
];

const GUITAR_HALF_STEP_DOWN: [Pitch; 6] = [
    Pitch::new(DSharp, 2),
    Pitch::new(GSharp, 2),
    Pitch::new(CSharp, 3),
    Pitch::new(FSharp, 3),
    Pitch::new(ASharp, 3),
    Pitch::new(DSharp, 4),
];

const GUITAR_DROP_C: [Pitch; 6] = [
    Pitch::new(C, 2),
    Pitch::new(G, 2),
    Pitch::new(C, 3),
    Pitch::new(F, 3),
    Pitch::new(A, 3),
    Pitch::new(D, 4),
];

const GUITAR_DADGAD: [Pitch; 6] = [
    Pitch::new(D, 2),
    Pitch::new(A, 2),
    Pitch::new(D, 3),
    Pitch::new(G, 3),
    Pitch::new(A, 3),
    Pitch::new(D, 4),
];

const GUITAR_OPEN_D: [Pitch; 6] = [
    Pitch::new(D, 2),
    Pitch::new(A, 2),
    Pitch::new(D, 3),
    Pitch::new(FSharp, 3),
    Pitch::new(A, 3),
    Pitch::new(D, 4),
];

const GUITAR_OPEN_E: [Pitch; 6] = [
    Pitch::new(E, 2),
    Pitch::new(B, 2),
    Pitch::new(E, 3),
    Pitch::new(GSharp, 3),
    Pitch::new(B, 3),
    Pitch::new(E, 4),
];

const BASS_STANDARD: [Pitch; 4] = [
    Pitch::new(E, 1),
    Pitch::new(A, 1),
    Pitch::new(D, 2),
    Pitch::new(G, 2),
];

// Re-entrant: the G string sits above the C string.
const UKULELE_STANDARD: [Pitch; 4] = [
    Pitch::new(G, 4),
    Pitch::new(C, 4),
    Pitch::new(E, 4),
    Pitch::new(A, 4),
];

/// A named tuning preset from the closed catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuningPreset {
    Standard,
    DropD,
    OpenG,
    HalfStepDown,
    DropC,
    Dadgad,
    OpenD,
    OpenE,
    BassStandard,
    UkuleleStandard,
}

/// Every preset in catalogue order.
pub const ALL_PRESETS: [TuningPreset; 10] = [
    TuningPreset::Standard,
    TuningPreset::DropD,
    TuningPreset::OpenG,
    TuningPreset::HalfStepDown,
    TuningPreset::DropC,
    TuningPreset::Dadgad,
    TuningPreset::OpenD,
    TuningPreset::OpenE,
    TuningPreset::BassStandard,
    TuningPreset::UkuleleStandard,
];

const GUITAR_PRESETS: [TuningPreset; 8] = [
    TuningPreset::Standard,
    TuningPreset::DropD,
    TuningPreset::OpenG,
    TuningPreset::HalfStepDown,
    TuningPreset::DropC,
    TuningPreset::Dadgad,
    TuningPreset::OpenD,
    TuningPreset::OpenE,
];

/// Static map for preset id lookups.
///
/// This provides O(log n) lookup time for converting stable identifiers
/// (like "drop-d") back to their presets.
static PRESET_MAP: Lazy<BTreeMap<&'static str, TuningPreset>> =
    Lazy::new(|| ALL_PRESETS.iter().map(|preset| (preset.id(), *preset)).collect());

impl TuningPreset {
    /// Stable identifier, suitable for persisting a user's choice.
    pub fn id(&self) -> &'static str {
        match self {
            TuningPreset::Standard => "standard",
            TuningPreset::DropD => "drop-d",
            TuningPreset::OpenG => "open-g",
            TuningPreset::HalfStepDown => "half-step-down",
            TuningPreset::DropC => "drop-c",
            TuningPreset::Dadgad => "dadgad",
            TuningPreset::OpenD => "open-d",
            TuningPreset::OpenE => "open-e",
            TuningPreset::BassStandard => "bass-standard",
            TuningPreset::UkuleleStandard => "ukulele-standard",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TuningPreset::Standard => "Standard",
            TuningPreset::DropD => "Drop D",
            TuningPreset::OpenG => "Open G",
            TuningPreset::HalfStepDown => "Half Step Down",
            TuningPreset::DropC => "Drop C",
            TuningPreset::Dadgad => "DADGAD",
            TuningPreset::OpenD => "Open D",
            TuningPreset::OpenE => "Open E",
            TuningPreset::BassStandard => "Bass Standard",
            TuningPreset::UkuleleStandard => "Ukulele Standard",
        }
    }

    /// Target pitches of the preset in string order.
    pub fn pitches(&self) -> &'static [Pitch] {
        match self {
            TuningPreset::Standard => &GUITAR_STANDARD,
            TuningPreset::DropD => &GUITAR_DROP_D,
            TuningPreset::OpenG => &GUITAR_OPEN_G,
            TuningPreset::HalfStepDown => &GUITAR_HALF_STEP_DOWN,
            TuningPreset::DropC => &GUITAR_DROP_C,
            TuningPreset::Dadgad => &GUITAR_DADGAD,
            TuningPreset::OpenD => &GUITAR_OPEN_D,
            TuningPreset::OpenE => &GUITAR_OPEN_E,
            TuningPreset::BassStandard => &BASS_STANDARD,
            TuningPreset::UkuleleStandard => &UKULELE_STANDARD,
        }
    }

    /// Whether `pitch` is one of this preset's string targets.
    pub fn contains(&self, pitch: &Pitch) -> bool {
        self.pitches().contains(pitch)
    }

    /// Looks up a preset by its stable identifier.
    ///
    /// # Returns
    /// * `Some(preset)` - The preset with this id
    /// * `None` - No preset in the catalogue uses this id
    pub fn from_id(id: &str) -> Option<TuningPreset> {
        PRESET_MAP.get(id).copied()
    }
}

/// An instrument groups the presets that make sense for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    /// Free pitch detection; no presets.
    Chromatic,
    AcousticGuitar,
    ElectricGuitar,
    BassGuitar,
    Ukulele,
}

impl Instrument {
    pub const ALL: [Instrument; 5] = [
        Instrument::Chromatic,
        Instrument::AcousticGuitar,
        Instrument::ElectricGuitar,
        Instrument::BassGuitar,
        Instrument::Ukulele,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Instrument::Chromatic => "Chromatic",
            Instrument::AcousticGuitar => "Acoustic Guitar",
            Instrument::ElectricGuitar => "Electric Guitar",
            Instrument::BassGuitar => "Bass Guitar",
            Instrument::Ukulele => "Ukulele",
        }
    }

    /// Presets available for this instrument; empty for chromatic.
    pub fn tuning_presets(&self) -> &'static [TuningPreset] {
        match self {
            Instrument::Chromatic => &[],
            Instrument::AcousticGuitar | Instrument::ElectricGuitar => &GUITAR_PRESETS,
            Instrument::BassGuitar => &[TuningPreset::BassStandard],
            Instrument::Ukulele => &[TuningPreset::UkuleleStandard],
        }
    }

    pub fn default_preset(&self) -> Option<TuningPreset> {
        self.tuning_presets().first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tuning_strings() {
        let names: Vec<String> = TuningPreset::Standard
            .pitches()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, ["E2", "A2", "D3", "G3", "B3", "E4"]);
    }

    #[test]
    fn no_preset_is_empty() {
        for preset in ALL_PRESETS {
            assert!(!preset.pitches().is_empty(), "{} has no pitches", preset.display_name());
        }
    }

    #[test]
    fn ids_are_unique_and_round_trip() {
        assert_eq!(PRESET_MAP.len(), ALL_PRESETS.len());
        for preset in ALL_PRESETS {
            assert_eq!(TuningPreset::from_id(preset.id()), Some(preset));
        }
        assert_eq!(TuningPreset::from_id("nashville"), None);
    }

    #[test]
    fn chromatic_has_no_presets() {
        assert!(Instrument::Chromatic.tuning_presets().is_empty());
        assert_eq!(Instrument::Chromatic.default_preset(), None);
    }

    #[test]
    fn guitars_default_to_standard() {
        assert_eq!(Instrument::AcousticGuitar.default_preset(), Some(TuningPreset::Standard));
        assert_eq!(Instrument::ElectricGuitar.default_preset(), Some(TuningPreset::Standard));
        assert!(Instrument::ElectricGuitar.tuning_presets().contains(&TuningPreset::OpenG));
    }

    #[test]
    fn contains_checks_octave() {
        assert!(TuningPreset::Standard.contains(&Pitch::new(D, 3)));
        assert!(!TuningPreset::Standard.contains(&Pitch::new(D, 2)));
        assert!(TuningPreset::DropD.contains(&Pitch::new(D, 2)));
    }
}

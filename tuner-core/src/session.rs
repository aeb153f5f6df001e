//! # Tuning Session Module
//!
//! The stateful orchestrator that turns the raw tracker sample stream into a
//! debounced, UI-ready reading.
//!
//! ## Pipeline
//! `on_sample` → [`SignalConditioner`] → [`NoteMatcher`] (strategy chosen by the
//! current [`TuningMode`]) → published [`TuningReading`].
//!
//! When the conditioner reports silence the last reading is not cleared right
//! away. A [`SustainTimer`] republishes it on every tick and clears it once the
//! tick budget is spent, which hides pick noise and string damping from the UI.
//!
//! ## Threading
//! A session is owned by a single consumer thread. Samples from the audio
//! thread must be marshaled onto that thread (see [`crate::engine`]); nothing
//! in here locks.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::Sample;
use crate::conditioner::SignalConditioner;
use crate::config::TunerConfig;
use crate::matcher::{Detection, NoteMatcher};
use crate::pitch::Pitch;
use crate::sustain::{SustainEvent, SustainTimer};
use crate::tuning::{Instrument, TuningPreset};

/// The matching mode of a session.
///
/// A pinned pitch or the auto-detection flag only exist together with an
/// active preset, so chromatic and preset modes can never be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningMode {
    /// Free pitch detection over all pitch classes.
    Chromatic,
    /// Match against the preset's strings; `indicated` follows the last match.
    PresetAuto { preset: TuningPreset, indicated: Pitch },
    /// Measure every sample against one pinned string of the preset.
    PresetManual { preset: TuningPreset, pinned: Pitch },
}

/// The published, UI-ready result of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningReading {
    pub pitch: Pitch,
    /// Conditioned frequency in Hz.
    pub frequency: f32,
    /// Instantaneous tracker amplitude of the sample that produced this reading.
    pub amplitude: f32,
    /// Positive is sharp, negative is flat.
    pub deviation_cents: f32,
}

impl TuningReading {
    fn from_detection(detection: Detection, amplitude: f32) -> Self {
        Self {
            pitch: detection.pitch,
            frequency: detection.frequency,
            amplitude,
            deviation_cents: detection.deviation_cents,
        }
    }
}

/// Handle returned by [`TuningSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(Option<&TuningReading>)>;

pub struct TuningSession {
    mode: TuningMode,
    conditioner: SignalConditioner,
    matcher: NoteMatcher,
    sustain: SustainTimer,
    reading: Option<TuningReading>,
    publications: u64,
    running: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for TuningSession {
    fn default() -> Self {
        Self::from_valid_config(&TunerConfig::default(), NoteMatcher::default())
    }
}

impl fmt::Debug for TuningSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TuningSession")
            .field("mode", &self.mode)
            .field("reading", &self.reading)
            .field("publications", &self.publications)
            .field("running", &self.running)
            .field("sustaining", &self.sustain.is_armed())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TuningSession {
    /// Creates a running session in chromatic mode with no reading.
    ///
    /// # Returns
    /// * `Ok(session)` - The configuration passed validation
    /// * `Err(e)` - An out-of-range configuration value
    pub fn new(config: &TunerConfig) -> Result<Self> {
        config.validate()?;
        let matcher = NoteMatcher::new(config.reference_a4, config.dead_zone_cents)?;
        Ok(Self::from_valid_config(config, matcher))
    }

    fn from_valid_config(config: &TunerConfig, matcher: NoteMatcher) -> Self {
        Self {
            mode: TuningMode::Chromatic,
            conditioner: SignalConditioner::new(config.minimum_amplitude, config.smoothing_window),
            matcher,
            sustain: SustainTimer::new(config.sustain_interval(), config.sustain_ticks),
            reading: None,
            publications: 0,
            running: true,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    // --- Mode transitions ---

    /// Switches to free chromatic detection, dropping any preset and pinned pitch.
    pub fn enable_chromatic(&mut self) {
        if self.mode != TuningMode::Chromatic {
            log::info!("[SESSION] Chromatic mode enabled");
        }
        self.mode = TuningMode::Chromatic;
    }

    /// Selects an instrument: chromatic enables chromatic mode, anything else
    /// activates the instrument's first preset.
    pub fn select_instrument(&mut self, instrument: Instrument) {
        match instrument.default_preset() {
            Some(preset) => self.select_instrument_preset(preset),
            None => self.enable_chromatic(),
        }
    }

    /// Activates a preset with auto-detection enabled.
    ///
    /// Until the first successful match the indicated pitch is the preset's
    /// first string.
    pub fn select_instrument_preset(&mut self, preset: TuningPreset) {
        let Some(&first) = preset.pitches().first() else {
            debug_assert!(false, "preset {} has no pitches", preset.id());
            log::error!("[SESSION] Ignoring empty preset {}", preset.id());
            return;
        };

        log::info!("[SESSION] Preset {} selected, auto-detection on", preset.display_name());
        self.mode = TuningMode::PresetAuto {
            preset,
            indicated: first,
        };
    }

    /// Pins a string of the active preset and disables auto-detection.
    ///
    /// # Returns
    /// * `true` - The session is now measuring against `pitch`
    /// * `false` - Rejected: chromatic mode, or `pitch` is not in the active preset
    pub fn pin_pitch(&mut self, pitch: Pitch) -> bool {
        let preset = match self.mode {
            TuningMode::Chromatic => {
                log::warn!("[SESSION] Cannot pin {} without an active preset", pitch);
                return false;
            }
            TuningMode::PresetAuto { preset, .. } | TuningMode::PresetManual { preset, .. } => {
                preset
            }
        };

        if !preset.contains(&pitch) {
            log::warn!("[SESSION] {} is not a string of {}", pitch, preset.display_name());
            return false;
        }

        log::info!("[SESSION] Pinned {}", pitch);
        self.mode = TuningMode::PresetManual {
            preset,
            pinned: pitch,
        };
        true
    }

    /// Toggles auto-detection within the active preset.
    ///
    /// Disabling it pins the currently indicated string; enabling it starts
    /// from the pinned string.
    ///
    /// # Returns
    /// * `false` - Rejected because no preset is active
    pub fn set_auto_detection_enabled(&mut self, enabled: bool) -> bool {
        self.mode = match (self.mode, enabled) {
            (TuningMode::Chromatic, _) => {
                log::warn!("[SESSION] Auto-detection needs an active preset");
                return false;
            }
            (TuningMode::PresetManual { preset, pinned }, true) => TuningMode::PresetAuto {
                preset,
                indicated: pinned,
            },
            (TuningMode::PresetAuto { preset, indicated }, false) => TuningMode::PresetManual {
                preset,
                pinned: indicated,
            },
            (mode, _) => mode,
        };
        true
    }

    pub fn mode(&self) -> TuningMode {
        self.mode
    }

    pub fn preset(&self) -> Option<TuningPreset> {
        match self.mode {
            TuningMode::Chromatic => None,
            TuningMode::PresetAuto { preset, .. } | TuningMode::PresetManual { preset, .. } => {
                Some(preset)
            }
        }
    }

    /// The string a preset tuner should highlight: the last auto match or the
    /// pinned pitch. `None` in chromatic mode.
    pub fn indicated_pitch(&self) -> Option<Pitch> {
        match self.mode {
            TuningMode::Chromatic => None,
            TuningMode::PresetAuto { indicated, .. } => Some(indicated),
            TuningMode::PresetManual { pinned, .. } => Some(pinned),
        }
    }

    pub fn is_auto_detection_enabled(&self) -> bool {
        matches!(self.mode, TuningMode::PresetAuto { .. })
    }

    // --- Sample ingestion ---

    /// Feeds one tracker sample.
    ///
    /// This function:
    /// 1. Runs the sample through the signal conditioner
    /// 2. On silence, arms the sustain timer if there is a reading to hold
    /// 3. Otherwise cancels the sustain timer, matches the conditioned
    ///    frequency with the mode's strategy and publishes the result
    ///
    /// Samples are ignored while the session is paused.
    pub fn on_sample(&mut self, sample: Sample, now: Instant) {
        if !self.running {
            log::trace!("[SESSION] Dropping sample while paused");
            return;
        }

        let Some(frequency) = self.conditioner.process(sample.frequency, sample.amplitude) else {
            if self.reading.is_some() && !self.sustain.is_armed() {
                log::debug!("[SESSION] Signal lost, holding last reading");
                self.sustain.arm(now);
            }
            return;
        };

        self.sustain.cancel();
        match self.detect(frequency) {
            Some(detection) => {
                log::trace!(
                    "[SESSION] {} {:+.1} cents at {:.2} Hz",
                    detection.pitch,
                    detection.deviation_cents,
                    frequency
                );
                self.publish(Some(TuningReading::from_detection(detection, sample.amplitude)));
            }
            None => {
                log::warn!("[SESSION] No candidate matched {:.2} Hz", frequency);
                self.publish(None);
            }
        }
    }

    fn detect(&mut self, frequency: f32) -> Option<Detection> {
        match &mut self.mode {
            TuningMode::Chromatic => self.matcher.detect_chromatic(frequency),
            TuningMode::PresetAuto { preset, indicated } => {
                debug_assert!(!preset.pitches().is_empty());
                let detection = self.matcher.detect_in_preset(frequency, preset.pitches())?;
                *indicated = detection.pitch;
                Some(detection)
            }
            TuningMode::PresetManual { pinned, .. } => {
                Some(self.matcher.detect_against(frequency, *pinned))
            }
        }
    }

    /// Fires every sustain tick due at `now`.
    ///
    /// # Returns
    /// * Number of ticks fired (each one is a publication)
    pub fn poll_sustain(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(event) = self.sustain.poll(now) {
            fired += 1;
            match event {
                SustainEvent::Tick => self.publish(self.reading),
                SustainEvent::Expired => {
                    log::debug!("[SESSION] Sustain expired, clearing reading");
                    self.publish(None);
                }
            }
        }
        fired
    }

    /// When the next sustain tick is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sustain.next_deadline()
    }

    pub fn is_sustaining(&self) -> bool {
        self.sustain.is_armed()
    }

    // --- Lifecycle ---

    /// Stops ingestion. The sustain timer is cancelled and the smoothing
    /// history dropped; the last reading stays published. Idempotent.
    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        log::info!("[SESSION] Paused");
        self.running = false;
        self.sustain.cancel();
        self.conditioner.reset();
    }

    /// Re-enables ingestion. Idempotent.
    pub fn resume(&mut self) {
        if self.running {
            return;
        }
        log::info!("[SESSION] Resumed");
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // --- Publication ---

    pub fn reading(&self) -> Option<&TuningReading> {
        self.reading.as_ref()
    }

    /// Number of publications so far, including sustain republications.
    /// Pollers can compare it between frames to detect a new tick.
    pub fn publication_count(&self) -> u64 {
        self.publications
    }

    /// Registers a listener called on every publication, including sustain
    /// ticks that republish an unchanged reading.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(Option<&TuningReading>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn publish(&mut self, reading: Option<TuningReading>) {
        self.reading = reading;
        self.publications += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(self.reading.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchClass;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(50);

    fn loud(frequency: f32) -> Sample {
        Sample::new(frequency, 0.5)
    }

    fn quiet() -> Sample {
        Sample::new(0.0, 0.01)
    }

    fn recorder(session: &mut TuningSession) -> Rc<RefCell<Vec<Option<TuningReading>>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        session.subscribe(move |reading| sink.borrow_mut().push(reading.copied()));
        log
    }

    #[test]
    fn new_rejects_invalid_config() {
        let zero_reference = TunerConfig {
            reference_a4: 0.0,
            ..TunerConfig::default()
        };
        assert!(TuningSession::new(&zero_reference).is_err());

        let nan_reference = TunerConfig {
            reference_a4: f32::NAN,
            ..TunerConfig::default()
        };
        assert!(TuningSession::new(&nan_reference).is_err());

        let empty_window = TunerConfig {
            smoothing_window: 0,
            ..TunerConfig::default()
        };
        assert!(TuningSession::new(&empty_window).is_err());
    }

    #[test]
    fn new_uses_configured_reference() {
        let config = TunerConfig {
            reference_a4: 442.0,
            ..TunerConfig::default()
        };
        let mut session = TuningSession::new(&config).unwrap();
        session.on_sample(loud(442.0), Instant::now());
        let reading = session.reading().copied().unwrap();
        assert_eq!(reading.pitch, Pitch::new(PitchClass::A, 4));
        assert_eq!(reading.deviation_cents, 0.0);
    }

    #[test]
    fn chromatic_reading_carries_amplitude() {
        let mut session = TuningSession::default();
        session.on_sample(Sample::new(220.5, 0.5), Instant::now());

        let reading = session.reading().copied().unwrap();
        assert_eq!(reading.pitch, Pitch::new(PitchClass::A, 3));
        assert_eq!(reading.frequency, 220.5);
        assert_eq!(reading.amplitude, 0.5);
        assert_eq!(reading.deviation_cents, 0.0);
    }

    #[test]
    fn readings_are_smoothed() {
        let mut session = TuningSession::default();
        let now = Instant::now();
        session.on_sample(loud(440.0), now);
        session.on_sample(loud(460.0), now);
        assert_eq!(session.reading().unwrap().frequency, 450.0);
    }

    #[test]
    fn sustain_holds_then_clears_exactly_once() {
        let mut session = TuningSession::default();
        let published = recorder(&mut session);
        let start = Instant::now();

        session.on_sample(loud(440.0), start);
        let held = session.reading().copied().unwrap();

        let silent_at = start + Duration::from_millis(10);
        session.on_sample(quiet(), silent_at);
        assert!(session.is_sustaining());
        assert_eq!(session.reading(), Some(&held), "silence must not clear right away");

        // Nineteen ticks fit inside the one second budget.
        assert_eq!(session.poll_sustain(silent_at + TICK * 19), 19);
        assert_eq!(session.reading(), Some(&held));

        assert_eq!(session.poll_sustain(silent_at + TICK * 20), 1);
        assert_eq!(session.reading(), None);
        assert!(!session.is_sustaining());

        assert_eq!(session.poll_sustain(silent_at + TICK * 100), 0);

        let published = published.borrow();
        assert_eq!(published.len(), 1 + 19 + 1);
        assert!(published[1..20].iter().all(|r| *r == Some(held)));
        assert_eq!(published.iter().filter(|r| r.is_none()).count(), 1);
    }

    #[test]
    fn repeated_silence_does_not_extend_the_hold() {
        let mut session = TuningSession::default();
        let start = Instant::now();
        session.on_sample(loud(82.41), start);
        session.on_sample(quiet(), start);
        let deadline = session.next_deadline();

        session.on_sample(quiet(), start + Duration::from_millis(30));
        assert_eq!(session.next_deadline(), deadline);
    }

    #[test]
    fn new_signal_cancels_the_hold() {
        let mut session = TuningSession::default();
        let start = Instant::now();
        session.on_sample(loud(440.0), start);
        session.on_sample(quiet(), start);
        session.poll_sustain(start + TICK * 5);

        session.on_sample(loud(330.0), start + TICK * 5);
        assert!(!session.is_sustaining());
        assert_eq!(session.poll_sustain(start + TICK * 40), 0);

        let reading = session.reading().unwrap();
        assert_eq!(reading.pitch.pitch_class, PitchClass::E);
        assert_eq!(reading.frequency, 330.0, "smoothing restarts after silence");
    }

    #[test]
    fn silence_without_a_reading_does_not_arm() {
        let mut session = TuningSession::default();
        session.on_sample(quiet(), Instant::now());
        assert!(!session.is_sustaining());
        assert_eq!(session.publication_count(), 0);
    }

    #[test]
    fn preset_auto_follows_the_plucked_string() {
        let mut session = TuningSession::default();
        session.select_instrument_preset(TuningPreset::Standard);
        assert_eq!(session.indicated_pitch(), Some(Pitch::new(PitchClass::E, 2)));
        assert!(session.is_auto_detection_enabled());

        let d3 = Pitch::new(PitchClass::D, 3);
        session.on_sample(loud(d3.frequency()), Instant::now());
        assert_eq!(session.indicated_pitch(), Some(d3));

        let reading = session.reading().unwrap();
        assert_eq!(reading.pitch, d3);
        assert_eq!(reading.deviation_cents, 0.0);
    }

    #[test]
    fn preset_manual_measures_against_pinned_string() {
        let mut session = TuningSession::default();
        session.select_instrument(Instrument::AcousticGuitar);
        let e2 = Pitch::new(PitchClass::E, 2);
        assert!(session.pin_pitch(e2));
        assert!(!session.is_auto_detection_enabled());

        session.on_sample(loud(110.0), Instant::now());
        let reading = session.reading().unwrap();
        assert_eq!(reading.pitch, e2);
        assert!((reading.deviation_cents - 500.0).abs() < 0.1);
        assert_eq!(session.indicated_pitch(), Some(e2));
    }

    #[test]
    fn pinning_requires_a_preset() {
        let mut session = TuningSession::default();
        session.select_instrument_preset(TuningPreset::DropD);
        session.enable_chromatic();

        assert!(!session.pin_pitch(Pitch::new(PitchClass::D, 2)));
        assert_eq!(session.mode(), TuningMode::Chromatic);
        assert!(!session.set_auto_detection_enabled(true));
        assert_eq!(session.preset(), None);
        assert_eq!(session.indicated_pitch(), None);
    }

    #[test]
    fn pinning_rejects_foreign_pitches() {
        let mut session = TuningSession::default();
        session.select_instrument_preset(TuningPreset::Standard);
        assert!(!session.pin_pitch(Pitch::new(PitchClass::D, 2)));
        assert!(session.is_auto_detection_enabled());
    }

    #[test]
    fn auto_detection_toggle() {
        let mut session = TuningSession::default();
        session.select_instrument_preset(TuningPreset::OpenG);
        let g3 = Pitch::new(PitchClass::G, 3);
        session.on_sample(loud(g3.frequency()), Instant::now());

        assert!(session.set_auto_detection_enabled(false));
        assert_eq!(
            session.mode(),
            TuningMode::PresetManual {
                preset: TuningPreset::OpenG,
                pinned: g3
            }
        );

        let b3 = Pitch::new(PitchClass::B, 3);
        assert!(session.pin_pitch(b3));
        assert!(session.set_auto_detection_enabled(true));
        assert_eq!(
            session.mode(),
            TuningMode::PresetAuto {
                preset: TuningPreset::OpenG,
                indicated: b3
            }
        );
    }

    #[test]
    fn selecting_a_preset_clears_the_pin() {
        let mut session = TuningSession::default();
        session.select_instrument_preset(TuningPreset::Standard);
        session.pin_pitch(Pitch::new(PitchClass::B, 3));
        session.select_instrument_preset(TuningPreset::Standard);
        assert!(session.is_auto_detection_enabled());
        assert_eq!(session.indicated_pitch(), Some(Pitch::new(PitchClass::E, 2)));
    }

    #[test]
    fn chromatic_instrument_selects_chromatic_mode() {
        let mut session = TuningSession::default();
        session.select_instrument(Instrument::BassGuitar);
        assert_eq!(session.preset(), Some(TuningPreset::BassStandard));
        session.select_instrument(Instrument::Chromatic);
        assert_eq!(session.mode(), TuningMode::Chromatic);
    }

    #[test]
    fn paused_session_ignores_samples_and_timers() {
        let mut session = TuningSession::default();
        let start = Instant::now();
        session.on_sample(loud(440.0), start);
        session.on_sample(quiet(), start);
        assert!(session.is_sustaining());

        session.pause();
        session.pause();
        assert!(!session.is_running());
        assert!(!session.is_sustaining());
        assert_eq!(session.poll_sustain(start + TICK * 40), 0);

        let count = session.publication_count();
        session.on_sample(loud(330.0), start);
        assert_eq!(session.publication_count(), count);

        session.resume();
        session.resume();
        session.on_sample(loud(330.0), start);
        assert_eq!(session.publication_count(), count + 1);
        assert_eq!(session.reading().unwrap().frequency, 330.0);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let mut session = TuningSession::default();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = session.subscribe(move |_| *counter.borrow_mut() += 1);

        session.on_sample(loud(440.0), Instant::now());
        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session.on_sample(loud(440.0), Instant::now());

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(session.publication_count(), 2);
    }
}

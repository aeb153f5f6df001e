//! # Audio Capture Module
//!
//! This module is the upstream side of the engine: it turns microphone audio into
//! `(frequency, amplitude)` samples. It uses CPAL (Cross-Platform Audio Library)
//! for capture and delegates fundamental frequency estimation to the McLeod
//! detector from the `pitch-detection` crate.
//!
//! ## Features
//! - Default input device selection with a graceful error when none exists
//! - Mono downmix of multi-channel input
//! - Overlapping analysis windows, one sample per hop
//! - Non-blocking hand-off to the consumer thread through a crossbeam channel

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;
use pitch_detection::detector::PitchDetector;
use pitch_detection::detector::mcleod::McLeodDetector;

use crate::Sample;

/// Number of mono samples per analysis frame.
///
/// 2048 samples is ~46ms at 44.1kHz, long enough to resolve the low E of a
/// bass guitar while still delivering many samples per sustain tick.
pub const FRAME_SIZE: usize = 2048;

/// Number of new mono samples between two analyses of the window.
///
/// A quarter of the window gives ~86 samples per second at 44.1kHz.
pub const HOP_SIZE: usize = FRAME_SIZE / 4;

const TARGET_SAMPLE_RATE: u32 = 44100;
const POWER_THRESHOLD: f32 = 5.0;
const CLARITY_THRESHOLD: f32 = 0.6;

/// A source of pitch tracker samples that can be started and stopped.
pub trait PitchTap {
    /// Starts delivering samples. Starting a running tap is a no-op.
    fn start(&mut self) -> Result<()>;
    /// Stops delivering samples and releases the device stream.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Slides a window over a mono stream and measures pitch and RMS amplitude.
pub struct FrameAnalyser {
    sample_rate: usize,
    frame: Vec<f32>,
    detector: McLeodDetector<f32>,
}

impl FrameAnalyser {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as usize,
            frame: Vec::with_capacity(FRAME_SIZE),
            detector: McLeodDetector::new(FRAME_SIZE, FRAME_SIZE / 2),
        }
    }

    /// Appends one mono sample.
    ///
    /// The first analysis happens once `FRAME_SIZE` samples have arrived,
    /// then again after every `HOP_SIZE` further samples.
    ///
    /// # Returns
    /// * `Some(sample)` - The window was full and has been analysed
    /// * `None` - Fewer than `HOP_SIZE` samples since the last analysis
    pub fn push(&mut self, value: f32) -> Option<Sample> {
        self.frame.push(value);
        if self.frame.len() < FRAME_SIZE {
            return None;
        }
        let sample = self.analyse();
        self.frame.drain(..HOP_SIZE);
        Some(sample)
    }

    fn analyse(&mut self) -> Sample {
        let amplitude =
            (self.frame.iter().map(|&s| s * s).sum::<f32>() / self.frame.len() as f32).sqrt();

        // A frame without a clear pitch is reported as 0 Hz; the conditioner
        // treats it as silence.
        let frequency = self
            .detector
            .get_pitch(&self.frame, self.sample_rate, POWER_THRESHOLD, CLARITY_THRESHOLD)
            .map(|pitch| pitch.frequency)
            .unwrap_or(0.0);

        Sample::new(frequency, amplitude)
    }
}

/// Pitch tap backed by the default microphone.
pub struct MicrophoneTap {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sender: Sender<Sample>,
    stream: Option<cpal::Stream>,
}

impl MicrophoneTap {
    /// Opens the default input device.
    ///
    /// No stream is built until [`PitchTap::start`] is called.
    ///
    /// # Arguments
    /// * `sender` - Channel the audio thread pushes samples into
    ///
    /// # Returns
    /// * `Ok(tap)` - Device and configuration were found
    /// * `Err(e)` - No input device, or no 32-bit float input format
    pub fn new(sender: Sender<Sample>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("[AUDIO] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let sample_rate = TARGET_SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .config();

        log::info!(
            "[AUDIO] Selected {} Hz, {} channel(s)",
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device,
            config,
            sender,
            stream: None,
        })
    }
}

impl PitchTap for MicrophoneTap {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels.max(1));
        let mut analyser = FrameAnalyser::new(self.config.sample_rate.0);
        let sender = self.sender.clone();
        let err_fn = |err| log::error!("[AUDIO] An error occurred on the audio stream: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                        if let Some(sample) = analyser.push(mono) {
                            // Drop the sample if the consumer is behind.
                            let _ = sender.try_send(sample);
                        }
                    }
                },
                err_fn,
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;
        self.stream = Some(stream);
        log::info!("[AUDIO] Capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("[AUDIO] Error pausing stream: {}", e);
            }
            drop(stream);
            log::info!("[AUDIO] Capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats are considered. Among those, mono is preferred,
/// then the range closest to the target rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let in_range =
                c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_diff = if in_range {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_diff)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, amplitude: f32, sample_rate: u32) -> impl Iterator<Item = f32> {
        let dt = 1.0 / sample_rate as f32;
        (0..).map(move |i: u32| {
            amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 * dt).sin()
        })
    }

    #[test]
    fn one_sample_per_hop() {
        let mut analyser = FrameAnalyser::new(TARGET_SAMPLE_RATE);
        let pushed = FRAME_SIZE * 3 + 10;
        let produced = sine(220.0, 0.5, TARGET_SAMPLE_RATE)
            .take(pushed)
            .filter_map(|s| analyser.push(s))
            .count();
        // One full window, then one more analysis per complete hop.
        assert_eq!(produced, 1 + (pushed - FRAME_SIZE) / HOP_SIZE);
        assert_eq!(produced, 9);
    }

    #[test]
    fn nothing_before_the_window_fills() {
        let mut analyser = FrameAnalyser::new(TARGET_SAMPLE_RATE);
        let produced = sine(220.0, 0.5, TARGET_SAMPLE_RATE)
            .take(FRAME_SIZE - 1)
            .filter_map(|s| analyser.push(s))
            .count();
        assert_eq!(produced, 0);
        assert!(analyser.push(0.0).is_some());
        for _ in 0..HOP_SIZE - 1 {
            assert!(analyser.push(0.0).is_none());
        }
        assert!(analyser.push(0.0).is_some());
    }

    #[test]
    fn measures_pitch_and_rms() {
        let mut analyser = FrameAnalyser::new(TARGET_SAMPLE_RATE);
        let sample = sine(220.0, 0.5, TARGET_SAMPLE_RATE)
            .take(FRAME_SIZE)
            .filter_map(|s| analyser.push(s))
            .last()
            .unwrap();

        assert!((sample.frequency - 220.0).abs() < 2.0, "got {} Hz", sample.frequency);
        // RMS of a sine is amplitude / sqrt(2).
        assert!((sample.amplitude - 0.3536).abs() < 0.01, "got {}", sample.amplitude);
    }

    #[test]
    fn silence_has_no_pitch() {
        let mut analyser = FrameAnalyser::new(TARGET_SAMPLE_RATE);
        let sample = std::iter::repeat(0.0)
            .take(FRAME_SIZE)
            .filter_map(|s| analyser.push(s))
            .last()
            .unwrap();
        assert_eq!(sample.frequency, 0.0);
        assert_eq!(sample.amplitude, 0.0);
    }
}

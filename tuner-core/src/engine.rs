//! # Tuner Engine Module
//!
//! Wires a [`PitchTap`] to a [`TuningSession`]. The tap runs on the realtime
//! audio thread and only pushes samples into a bounded crossbeam channel; the
//! engine drains that channel on the consumer thread, so every session
//! mutation and every publication happens on one thread without locks.
//!
//! ## Architecture
//! - **Audio Thread**: CPAL callback, frame analysis, `try_send` of samples
//! - **Consumer Thread**: `pump` or `run_until`, session updates, sustain ticks
//! - **Communication**: Crossbeam channels for samples and shutdown

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::Sample;
use crate::audio::{MicrophoneTap, PitchTap};
use crate::config::TunerConfig;
use crate::session::TuningSession;

/// Samples buffered between the audio thread and the consumer. At one sample
/// per ~11.6ms hop this is about three quarters of a second; newer samples are
/// dropped by the tap while the queue is full.
pub const SAMPLE_QUEUE_CAPACITY: usize = 64;

/// How long `run_until` waits for a sample when no sustain tick is scheduled.
const IDLE_WAIT: Duration = Duration::from_millis(100);

pub struct TunerEngine<T: PitchTap> {
    session: TuningSession,
    tap: T,
    samples: Receiver<Sample>,
    running: bool,
}

impl TunerEngine<MicrophoneTap> {
    /// Builds an engine on the default microphone.
    ///
    /// # Returns
    /// * `Ok(engine)` - A paused engine; call [`TunerEngine::resume`] to start capture
    /// * `Err(e)` - Invalid configuration, or no usable input device
    pub fn with_microphone(config: &TunerConfig) -> Result<Self> {
        let session = TuningSession::new(config)?;
        let (sample_tx, sample_rx) = crossbeam_channel::bounded(SAMPLE_QUEUE_CAPACITY);
        let tap = MicrophoneTap::new(sample_tx)?;
        Ok(Self::new(session, tap, sample_rx))
    }
}

impl<T: PitchTap> TunerEngine<T> {
    /// Creates a paused engine around an existing session and tap.
    pub fn new(mut session: TuningSession, tap: T, samples: Receiver<Sample>) -> Self {
        session.pause();
        Self {
            session,
            tap,
            samples,
            running: false,
        }
    }

    /// Starts the tap and sample ingestion. Idempotent.
    ///
    /// If the tap cannot start, the engine stays paused and the error is
    /// returned so the caller can retry later.
    pub fn resume(&mut self) -> Result<()> {
        if self.running {
            log::debug!("[ENGINE] Already running");
            return Ok(());
        }

        if let Err(e) = self.tap.start() {
            log::warn!("[ENGINE] Could not start audio, staying paused: {:#}", e);
            return Err(e);
        }

        self.running = true;
        self.session.resume();
        log::info!("[ENGINE] Running");
        Ok(())
    }

    /// Stops the tap, pauses the session and discards queued samples. Idempotent.
    pub fn pause(&mut self) {
        if !self.running {
            return;
        }

        self.tap.stop();
        self.session.pause();
        let stale = self.samples.try_iter().count();
        self.running = false;
        log::info!("[ENGINE] Paused, dropped {} queued sample(s)", stale);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Processes pending work on the calling thread.
    ///
    /// This function:
    /// 1. Waits for a sample, but no longer than `max_wait` or the next sustain tick
    /// 2. Feeds every queued sample to the session
    /// 3. Fires any sustain ticks that are due
    ///
    /// # Returns
    /// * `Ok(n)` - Number of samples consumed
    /// * `Err(e)` - The tap dropped its end of the sample channel and every
    ///   queued sample has been consumed; further calls would return at once
    pub fn pump(&mut self, max_wait: Duration) -> Result<usize> {
        let deadline = self.wait_deadline(Instant::now() + max_wait);

        if !self.running {
            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
            return Ok(0);
        }

        let mut consumed = 0;
        let mut closed = false;
        match self.samples.recv_deadline(deadline) {
            Ok(sample) => {
                self.session.on_sample(sample, Instant::now());
                consumed += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => closed = true,
        }

        for sample in self.samples.try_iter() {
            self.session.on_sample(sample, Instant::now());
            consumed += 1;
        }

        self.session.poll_sustain(Instant::now());

        if closed {
            log::warn!("[ENGINE] Sample channel closed");
            return Err(anyhow!("Sample channel closed"));
        }
        Ok(consumed)
    }

    /// Runs the consumer loop until `shutdown` receives a message or the
    /// sample channel closes, then pauses the engine.
    pub fn run_until(&mut self, shutdown: &Receiver<()>) -> Result<()> {
        self.resume()?;

        loop {
            let timeout = self
                .session
                .next_deadline()
                .map(|due| due.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);

            crossbeam_channel::select! {
                recv(self.samples) -> msg => match msg {
                    Ok(sample) => self.session.on_sample(sample, Instant::now()),
                    Err(_) => {
                        log::warn!("[ENGINE] Sample channel closed");
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    log::info!("[ENGINE] Received shutdown signal");
                    break;
                },
                default(timeout) => {},
            }

            self.session.poll_sustain(Instant::now());
        }

        self.pause();
        Ok(())
    }

    pub fn session(&self) -> &TuningSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TuningSession {
        &mut self.session
    }

    pub fn tap(&self) -> &T {
        &self.tap
    }

    fn wait_deadline(&self, limit: Instant) -> Instant {
        match self.session.next_deadline() {
            Some(tick) => tick.min(limit),
            None => limit,
        }
    }
}

//! Local audio sample sources for mentor_room
//!
//! The visualization reads the local microphone through the [`SampleTap`]
//! trait. This crate provides a shared rolling window that capture code
//! writes into, a synthetic tone source for running without hardware, and
//! (with the `capture` feature) device capture through cpal.

use log::trace;
use rand::Rng;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

#[cfg(feature = "capture")]
pub mod capture;

pub const SAMPLE_RATE: u32 = 48000;
pub const CHANNELS: u16 = 1;

/// Read access to the most recent samples of a live mono signal.
pub trait SampleTap: Send + Sync {
    /// Fill `out` with the latest `out.len()` samples, oldest first.
    ///
    /// When fewer samples exist the front of `out` is zeroed. Returns the
    /// number of real samples written.
    fn read_latest(&self, out: &mut [f32]) -> usize;
}

struct WindowInner {
    buffer: Vec<f32>,
    write_pos: usize,
    filled: usize,
}

/// Fixed-size rolling window of the latest samples, shared between a writer
/// (capture callback) and readers (analysis).
#[derive(Clone)]
pub struct SampleWindow {
    inner: Arc<Mutex<WindowInner>>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(WindowInner {
                buffer: vec![0.0; capacity],
                write_pos: 0,
                filled: 0,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Append samples, overwriting the oldest ones.
    pub fn push(&self, samples: &[f32]) {
        let mut inner = self.lock();
        let capacity = inner.buffer.len();
        for &sample in samples {
            let pos = inner.write_pos;
            inner.buffer[pos] = sample;
            inner.write_pos = (pos + 1) % capacity;
        }
        inner.filled = (inner.filled + samples.len()).min(capacity);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.buffer.iter_mut().for_each(|s| *s = 0.0);
        inner.write_pos = 0;
        inner.filled = 0;
    }

    fn lock(&self) -> MutexGuard<'_, WindowInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SampleTap for SampleWindow {
    fn read_latest(&self, out: &mut [f32]) -> usize {
        let inner = self.lock();
        let capacity = inner.buffer.len();
        let available = inner.filled.min(out.len());
        let pad = out.len() - available;

        out[..pad].iter_mut().for_each(|s| *s = 0.0);
        // Oldest of the `available` samples sits `available` slots behind write_pos
        let start = (inner.write_pos + capacity - available) % capacity;
        for (i, slot) in out[pad..].iter_mut().enumerate() {
            *slot = inner.buffer[(start + i) % capacity];
        }
        available
    }
}

struct ToneState {
    started: Instant,
    phase: f32,
}

/// Synthetic voice-like signal used when no capture device is wired in.
///
/// A low fundamental with a few harmonics, a slow syllable envelope and a
/// little noise, generated on demand from wall-clock time.
pub struct ToneTap {
    fundamental: f32,
    sample_rate: u32,
    noise: f32,
    state: Mutex<ToneState>,
}

impl ToneTap {
    pub fn new(fundamental: f32) -> Self {
        Self {
            fundamental,
            sample_rate: SAMPLE_RATE,
            noise: 0.02,
            state: Mutex::new(ToneState {
                started: Instant::now(),
                phase: 0.0,
            }),
        }
    }

    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    fn envelope(seconds: f32) -> f32 {
        // Roughly three syllables per second, never fully silent
        0.15 + 0.85 * (0.5 + 0.5 * (2.0 * PI * 1.5 * seconds).sin()).powi(2)
    }
}

impl Default for ToneTap {
    fn default() -> Self {
        Self::new(180.0)
    }
}

impl SampleTap for ToneTap {
    fn read_latest(&self, out: &mut [f32]) -> usize {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let seconds = state.started.elapsed().as_secs_f32();
        let gain = Self::envelope(seconds);
        let step = 2.0 * PI * self.fundamental / self.sample_rate as f32;
        let mut rng = rand::thread_rng();

        for sample in out.iter_mut() {
            let phase = state.phase;
            let voiced = phase.sin() * 0.6 + (2.0 * phase).sin() * 0.25 + (3.0 * phase).sin() * 0.1;
            let noise = if self.noise > 0.0 {
                rng.gen_range(-self.noise..self.noise)
            } else {
                0.0
            };
            *sample = (voiced * gain * 0.5 + noise).clamp(-1.0, 1.0);
            state.phase = (phase + step) % (2.0 * PI);
        }
        trace!("Generated {} synthetic samples (gain {:.2})", out.len(), gain);
        out.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_reads_zeros() {
        let window = SampleWindow::new(8);
        let mut out = [1.0f32; 4];
        assert_eq!(window.read_latest(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn partial_window_is_front_padded() {
        let window = SampleWindow::new(8);
        window.push(&[0.1, 0.2]);
        let mut out = [9.0f32; 4];
        assert_eq!(window.read_latest(&mut out), 2);
        assert_eq!(out, [0.0, 0.0, 0.1, 0.2]);
    }

    #[test]
    fn window_keeps_latest_samples_in_order() {
        let window = SampleWindow::new(4);
        window.push(&[1.0, 2.0, 3.0]);
        window.push(&[4.0, 5.0, 6.0]);
        let mut out = [0.0f32; 4];
        assert_eq!(window.read_latest(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);

        let mut last_two = [0.0f32; 2];
        window.read_latest(&mut last_two);
        assert_eq!(last_two, [5.0, 6.0]);
    }

    #[test]
    fn clear_resets_window() {
        let window = SampleWindow::new(4);
        window.push(&[1.0, 2.0]);
        window.clear();
        let mut out = [7.0f32; 2];
        assert_eq!(window.read_latest(&mut out), 0);
        assert_eq!(out, [0.0, 0.0]);
        assert_eq!(window.capacity(), 4);
    }

    #[test_log::test]
    fn tone_is_bounded_and_audible() {
        let tone = ToneTap::default().with_noise(0.0);
        let mut out = vec![0.0f32; 512];
        assert_eq!(tone.read_latest(&mut out), 512);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        let peak = out.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak > 0.01);
    }
}

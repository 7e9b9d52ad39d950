//! Frequency analysis of the local microphone.
//!
//! Produces byte-scaled frequency magnitudes the same way a browser analyser
//! node does: Blackman window, forward FFT, per-bin magnitude smoothed over
//! time, converted to decibels and mapped linearly from `[min_db, max_db]`
//! onto `0..=255`.

use audio_io::SampleTap;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Transform size; fixed so the bin count never changes under the renderer.
pub const FFT_SIZE: usize = 256;
pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;

pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DB: f32 = -100.0;
pub const DEFAULT_MAX_DB: f32 = -30.0;

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    time: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bins: Vec<u8>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl Analyser {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        Self {
            fft,
            window: blackman(FFT_SIZE),
            time: vec![0.0; FFT_SIZE],
            spectrum: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: vec![0.0; FREQUENCY_BIN_COUNT],
            bins: vec![0; FREQUENCY_BIN_COUNT],
            smoothing: DEFAULT_SMOOTHING,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
        }
    }

    /// Time constant in `[0, 1)`; 0 disables smoothing.
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 0.99);
        self
    }

    pub fn frequency_bin_count(&self) -> usize {
        FREQUENCY_BIN_COUNT
    }

    /// Pull the latest window from `tap` and analyse it.
    pub fn sample(&mut self, tap: &dyn SampleTap) -> &[u8] {
        tap.read_latest(&mut self.time);
        self.analyse()
    }

    /// Analyse the last `FFT_SIZE` samples of `samples` (zero-padded in front
    /// when shorter).
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> &[u8] {
        let take = samples.len().min(FFT_SIZE);
        let pad = FFT_SIZE - take;
        self.time[..pad].iter_mut().for_each(|s| *s = 0.0);
        self.time[pad..].copy_from_slice(&samples[samples.len() - take..]);
        self.analyse()
    }

    /// Last computed bins.
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    fn analyse(&mut self) -> &[u8] {
        for (i, slot) in self.spectrum.iter_mut().enumerate() {
            *slot = Complex::new(self.time[i] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let scale = 1.0 / FFT_SIZE as f32;
        let range = self.max_db - self.min_db;
        for k in 0..FREQUENCY_BIN_COUNT {
            let magnitude = self.spectrum[k].norm() * scale;
            let smoothed = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            self.bins[k] = if self.smoothed[k] <= 0.0 {
                0
            } else {
                let db = 20.0 * self.smoothed[k].log10();
                let scaled = 255.0 * (db - self.min_db) / range;
                scaled.floor().clamp(0.0, 255.0) as u8
            };
        }
        &self.bins
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

fn blackman(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..size)
        .map(|n| {
            let x = n as f32 / size as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

use std::{
    collections::HashMap,
    f32::consts::PI,
    fmt::Debug,
    sync::Arc,
};

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::{
    CHANNEL_HIGH_TONE,
    VIS_HIGH_TONE,
    buffer::SampleBuffer,
};

/// Lower edge of the SSTV audio sub-band searched for the dominant peak.
pub const BAND_LOW: f32 = VIS_HIGH_TONE;
/// Upper edge of the SSTV audio sub-band.
pub const BAND_HIGH: f32 = CHANNEL_HIGH_TONE;

/// Dominant frequency recovered from one analysis window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyEstimate {
    /// Center of the analysis window, in seconds from the buffer start.
    pub time: f32,
    /// Estimated frequency in Hz, refined to sub-bin resolution.
    pub frequency: f32,
    /// Peak-to-noise-floor ratio mapped into `[0, 1]`.
    pub confidence: f32,
}

/// Windowed spectral estimator over a [`SampleBuffer`].
///
/// The window size is chosen by the caller per estimate: a larger window
/// buys frequency resolution at the cost of time resolution. FFT plans and
/// Hann windows are cached per size.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    plans: HashMap<usize, Arc<dyn rustfft::Fft<f32>>>,
    windows: HashMap<usize, Vec<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    sample_rate: f32,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            windows: HashMap::new(),
            buffer: Vec::new(),
            scratch: Vec::new(),
            sample_rate,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Largest power-of-two window not longer than `duration` seconds,
    /// clamped to a practical range. Used for probing short pulses whose
    /// length is dictated by the protocol rather than by the caller.
    pub fn probe_window(&self, duration: f32) -> usize {
        let samples = (duration * self.sample_rate).max(1.0) as usize;
        let window = if samples.is_power_of_two() {
            samples
        }
        else {
            samples.next_power_of_two() / 2
        };
        window.clamp(64, 2048)
    }

    /// Estimates the dominant frequency in the SSTV sub-band within a
    /// window of `window_size` samples centered at `center_time`.
    ///
    /// Deterministic and side-effect free with respect to the buffer; an
    /// all-zero window yields confidence 0 and a frequency pinned to the
    /// band edge, never NaN.
    pub fn estimate(
        &mut self,
        samples: &SampleBuffer,
        center_time: f32,
        window_size: usize,
    ) -> FrequencyEstimate {
        debug_assert!(window_size >= 4 && window_size & 1 == 0);

        self.buffer.resize(window_size, Complex::default());
        samples.fill_window(center_time, &mut self.buffer);

        let window = self
            .windows
            .entry(window_size)
            .or_insert_with(|| hann_window(window_size));
        for (sample, coefficient) in self.buffer.iter_mut().zip(window.iter()) {
            *sample *= coefficient;
        }

        let fft = self
            .plans
            .entry(window_size)
            .or_insert_with(|| self.planner.plan_fft_forward(window_size))
            .clone();
        self.scratch
            .resize(fft.get_inplace_scratch_len(), Complex::default());
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let bin_width = self.sample_rate / window_size as f32;
        let low_bin = ((BAND_LOW / bin_width) as usize).max(1);
        let high_bin = ((BAND_HIGH / bin_width).ceil() as usize)
            .min(window_size / 2 - 1)
            .max(low_bin);

        let mut peak_bin = low_bin;
        let mut peak = 0.0f32;
        let mut band_sum = 0.0f32;
        for bin in low_bin..=high_bin {
            let magnitude = self.buffer[bin].norm();
            band_sum += magnitude;
            if magnitude > peak {
                peak = magnitude;
                peak_bin = bin;
            }
        }

        if peak <= f32::EPSILON {
            return FrequencyEstimate {
                time: center_time,
                frequency: peak_bin as f32 * bin_width,
                confidence: 0.0,
            };
        }

        // quadratic interpolation across the neighboring bins for sub-bin
        // resolution
        let left = self.buffer[peak_bin - 1].norm();
        let right = self.buffer[peak_bin + 1].norm();
        let denominator = left - 2.0 * peak + right;
        let delta = if denominator.abs() <= f32::EPSILON {
            0.0
        }
        else {
            (0.5 * (left - right) / denominator).clamp(-0.5, 0.5)
        };

        let band_mean = band_sum / (high_bin - low_bin + 1) as f32;

        FrequencyEstimate {
            time: center_time,
            frequency: (peak_bin as f32 + delta) * bin_width,
            confidence: ((peak - band_mean) / peak).clamp(0.0, 1.0),
        }
    }
}

impl Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    let n = (size - 1) as f32;
    (0..size)
        .map(|i| (PI * i as f32 / n).sin().powi(2))
        .collect()
}

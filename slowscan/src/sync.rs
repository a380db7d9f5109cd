//! Per-line sync pulse tracking.

use crate::{
    SYNC_TONE,
    buffer::SampleBuffer,
    modes::ModeDescriptor,
    spectrum::SpectrumAnalyzer,
};

const SYNC_TOLERANCE: f32 = 50.0;
const MIN_CONFIDENCE: f32 = 0.05;

/// Recovered timing for one scanline.
#[derive(Clone, Copy, Debug)]
pub struct LineTiming {
    /// Start of the line's sync pulse, in seconds from the buffer start.
    pub start: f32,
    pub duration: f32,
    /// False when the sync pulse was not found and the line start was
    /// dead-reckoned from the previous line.
    pub synced: bool,
}

/// Locates each line's sync pulse within a bounded drift window after the
/// previous line's end. When the pulse is missing the tracker falls back to
/// the nominal dead-reckoned position, so decoding always makes forward
/// progress.
#[derive(Clone, Copy, Debug)]
pub struct SyncTracker {
    sync_time: f32,
    line_time: f32,
    tolerance: f32,
    next_start: f32,
    line: usize,
}

impl SyncTracker {
    pub fn new(mode: &ModeDescriptor, header_end: f32, drift_tolerance: f32) -> Self {
        Self {
            sync_time: mode.sync_time,
            line_time: mode.line_time,
            tolerance: drift_tolerance * mode.line_time,
            next_start: header_end,
            line: 0,
        }
    }

    /// Recovers the timing of the next line. Infallible; a lost sync is a
    /// degradation flag, never an abort.
    pub fn next_line(
        &mut self,
        spectrum: &mut SpectrumAnalyzer,
        samples: &SampleBuffer,
    ) -> LineTiming {
        let expected = self.next_start;
        let window = spectrum.probe_window(self.sync_time);
        let step = (self.sync_time / 4.0).max(0.5e-3);

        let mut best: Option<(f32, f32)> = None;
        let mut t = expected - self.tolerance;
        if self.line == 0 {
            // the VIS stop bit is the same 1200 Hz tone as the sync pulse;
            // the first line's search must not reach back across the header
            // end
            t = expected;
        }
        while t <= expected + self.tolerance {
            let estimate = spectrum.estimate(samples, t + self.sync_time / 2.0, window);
            let deviation = (estimate.frequency - SYNC_TONE).abs();
            if deviation < SYNC_TOLERANCE
                && estimate.confidence > MIN_CONFIDENCE
                && best.map_or(true, |(_, best_deviation)| deviation < best_deviation)
            {
                best = Some((t, deviation));
            }
            t += step;
        }

        let (start, synced) = match best {
            Some((start, deviation)) => {
                tracing::trace!(line = self.line, start, deviation, "sync pulse found");
                (start, true)
            }
            None => {
                tracing::warn!(line = self.line, expected, "sync lost, dead reckoning");
                (expected, false)
            }
        };

        self.next_start = start + self.line_time;
        self.line += 1;

        LineTiming {
            start,
            duration: self.line_time,
            synced,
        }
    }
}

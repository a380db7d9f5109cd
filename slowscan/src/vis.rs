//! VIS calibration header detection.
//!
//! The canonical header is a 1900 Hz leader for 300 ms, a 1200 Hz break for
//! 10 ms, another 300 ms leader, then ten 30 ms VIS bits: start (1200 Hz),
//! seven data bits LSB first (1100 Hz = 1, 1300 Hz = 0), even parity and a
//! 1200 Hz stop bit. The short break pulse is the timing anchor: once it is
//! located, every bit center is a fixed offset from it.

use crate::{
    LEADER_BREAK_TIME,
    LEADER_TIME,
    LEADER_TONE,
    SYNC_TONE,
    VIS_BIT_TIME,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    buffer::SampleBuffer,
    modes::VisCode,
    spectrum::SpectrumAnalyzer,
};

const LEADER_TOLERANCE: f32 = 50.0;
const BREAK_TOLERANCE: f32 = 80.0;
const BIT_TOLERANCE: f32 = 100.0;

const LEADER_SCAN_STEP: f32 = 5e-3;
const BREAK_SCAN_STEP: f32 = 1e-3;

/// Raw header decode result. Parity verification and mode lookup are left
/// to the caller so a parity mismatch (recoverable) and an unknown mode
/// (fatal) can take different paths.
#[derive(Clone, Copy, Debug)]
pub struct RawHeader {
    pub vis_code: VisCode,
    pub parity_bit: bool,
    /// End of the stop bit, where the first scanline begins.
    pub header_end: f32,
}

#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("no leader tone within the first {horizon} seconds")]
    LeaderNotFound { horizon: f32 },
    #[error("leader break pulse not found after the leader tone")]
    BreakNotFound,
    #[error("second leader tone missing after the break")]
    SecondLeaderMissing,
    #[error("vis start bit missing")]
    StartBitMissing,
    #[error("vis bit {bit} is neither a mark nor a space tone")]
    AmbiguousBit { bit: u8 },
}

/// Searches the first `horizon` seconds of the buffer for a calibration
/// header and decodes its VIS bits.
pub fn detect_header(
    spectrum: &mut SpectrumAnalyzer,
    samples: &SampleBuffer,
    horizon: f32,
) -> Result<RawHeader, CalibrationError> {
    let leader_start = find_leader(spectrum, samples, horizon)?;
    let break_start = find_break(spectrum, samples, leader_start)?;
    tracing::debug!(leader_start, break_start, "header candidate");

    let bit_window = spectrum.probe_window(0.8 * VIS_BIT_TIME);

    // second leader spans the 300 ms after the break
    let second_leader = spectrum.estimate(
        samples,
        break_start + LEADER_BREAK_TIME + LEADER_TIME / 2.0,
        spectrum.probe_window(0.02),
    );
    if (second_leader.frequency - LEADER_TONE).abs() > LEADER_TOLERANCE {
        return Err(CalibrationError::SecondLeaderMissing);
    }

    let vis_start = break_start + LEADER_BREAK_TIME + LEADER_TIME;
    let start_bit = spectrum.estimate(samples, vis_start + VIS_BIT_TIME / 2.0, bit_window);
    if (start_bit.frequency - SYNC_TONE).abs() > BREAK_TOLERANCE {
        return Err(CalibrationError::StartBitMissing);
    }

    let mut vis_code = 0u8;
    let mut parity_bit = false;
    for bit in 0..8u8 {
        let center = vis_start + (bit as f32 + 1.5) * VIS_BIT_TIME;
        let estimate = spectrum.estimate(samples, center, bit_window);

        let value = if (estimate.frequency - VIS_HIGH_TONE).abs() < BIT_TOLERANCE {
            true
        }
        else if (estimate.frequency - VIS_LOW_TONE).abs() < BIT_TOLERANCE {
            false
        }
        else {
            return Err(CalibrationError::AmbiguousBit { bit });
        };

        if bit == 7 {
            parity_bit = value;
        }
        else if value {
            vis_code |= 1 << bit;
        }
    }

    let header = RawHeader {
        // bit 7 is never set here, so the code is always in range
        vis_code: VisCode::new_unchecked(vis_code),
        parity_bit,
        header_end: vis_start + 10.0 * VIS_BIT_TIME,
    };
    tracing::debug!(?header, "decoded vis header");
    Ok(header)
}

/// Coarse scan for a sustained 1900 Hz tone. Returns a time at or slightly
/// before the leader onset; the break search only needs it as a lower bound.
fn find_leader(
    spectrum: &mut SpectrumAnalyzer,
    samples: &SampleBuffer,
    horizon: f32,
) -> Result<f32, CalibrationError> {
    let window = spectrum.probe_window(0.02);
    let end = horizon.min(samples.duration());

    let mut t = 0.0;
    while t <= end {
        let sustained = [0.0, 0.1, 0.25].iter().all(|offset| {
            let estimate = spectrum.estimate(samples, t + offset, window);
            (estimate.frequency - LEADER_TONE).abs() < LEADER_TOLERANCE
        });
        if sustained {
            return Ok(t);
        }
        t += LEADER_SCAN_STEP;
    }

    Err(CalibrationError::LeaderNotFound { horizon })
}

/// Locates the 10 ms break pulse that separates the two leader tones and
/// returns its start time.
fn find_break(
    spectrum: &mut SpectrumAnalyzer,
    samples: &SampleBuffer,
    leader_start: f32,
) -> Result<f32, CalibrationError> {
    let window = spectrum.probe_window(0.008);

    let scan_from = leader_start + LEADER_TIME - LEADER_SCAN_STEP * 10.0;
    let scan_to = leader_start + LEADER_TIME + 0.1;

    let mut best: Option<(f32, f32)> = None;
    let mut t = scan_from;
    while t <= scan_to {
        let estimate = spectrum.estimate(samples, t, window);
        let deviation = (estimate.frequency - SYNC_TONE).abs();
        if deviation < BREAK_TOLERANCE
            && best.map_or(true, |(_, best_deviation)| deviation < best_deviation)
        {
            best = Some((t, deviation));
        }
        t += BREAK_SCAN_STEP;
    }

    let (center, _) = best.ok_or(CalibrationError::BreakNotFound)?;
    Ok(center - LEADER_BREAK_TIME / 2.0)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use super::detect_header;
    use crate::{
        LEADER_BREAK_TIME,
        LEADER_TIME,
        LEADER_TONE,
        SYNC_TONE,
        VIS_BIT_TIME,
        VIS_HIGH_TONE,
        VIS_LOW_TONE,
        buffer::SampleBuffer,
        modes::VisCode,
        spectrum::SpectrumAnalyzer,
    };

    const SAMPLE_RATE: u32 = 44100;

    struct ToneGen {
        samples: Vec<f32>,
        phase: f32,
    }

    impl ToneGen {
        fn new() -> Self {
            Self {
                samples: Vec::new(),
                phase: 0.0,
            }
        }

        fn tone(&mut self, frequency: f32, duration: f32) {
            let step = TAU * frequency / SAMPLE_RATE as f32;
            for _ in 0..(duration * SAMPLE_RATE as f32) as usize {
                self.samples.push(self.phase.sin());
                self.phase = (self.phase + step) % TAU;
            }
        }

        fn silence(&mut self, duration: f32) {
            self.samples
                .extend(std::iter::repeat_n(0.0, (duration * SAMPLE_RATE as f32) as usize));
        }
    }

    fn synthesize_header(tone_gen: &mut ToneGen, vis_code: VisCode, parity: bool) {
        tone_gen.tone(LEADER_TONE, LEADER_TIME);
        tone_gen.tone(SYNC_TONE, LEADER_BREAK_TIME);
        tone_gen.tone(LEADER_TONE, LEADER_TIME);
        tone_gen.tone(SYNC_TONE, VIS_BIT_TIME);
        for bit in 0..7 {
            let tone = if vis_code.get_bit(bit) {
                VIS_HIGH_TONE
            }
            else {
                VIS_LOW_TONE
            };
            tone_gen.tone(tone, VIS_BIT_TIME);
        }
        tone_gen.tone(if parity { VIS_HIGH_TONE } else { VIS_LOW_TONE }, VIS_BIT_TIME);
        tone_gen.tone(SYNC_TONE, VIS_BIT_TIME);
    }

    #[test]
    fn header_is_decoded_with_leading_silence() {
        let vis_code = VisCode::new(0x2c).unwrap();
        let mut tone_gen = ToneGen::new();
        tone_gen.silence(0.2);
        synthesize_header(&mut tone_gen, vis_code, vis_code.parity());
        tone_gen.silence(0.2);

        let buffer = SampleBuffer::new(&tone_gen.samples, SAMPLE_RATE);
        let mut spectrum = SpectrumAnalyzer::new(SAMPLE_RATE as f32);

        let header = detect_header(&mut spectrum, &buffer, 3.0).unwrap();
        assert_eq!(header.vis_code, vis_code);
        assert_eq!(header.parity_bit, vis_code.parity());

        let expected_end = 0.2 + 2.0 * LEADER_TIME + LEADER_BREAK_TIME + 10.0 * VIS_BIT_TIME;
        assert!(
            (header.header_end - expected_end).abs() < 0.01,
            "header end {} vs {}",
            header.header_end,
            expected_end
        );
    }

    #[test]
    fn silence_has_no_header() {
        let samples = vec![0.0f32; 2 * SAMPLE_RATE as usize];
        let buffer = SampleBuffer::new(&samples, SAMPLE_RATE);
        let mut spectrum = SpectrumAnalyzer::new(SAMPLE_RATE as f32);

        assert!(detect_header(&mut spectrum, &buffer, 3.0).is_err());
    }

    #[test]
    fn flipped_parity_bit_survives_to_the_caller() {
        let vis_code = VisCode::new(0x2c).unwrap();
        let mut tone_gen = ToneGen::new();
        synthesize_header(&mut tone_gen, vis_code, !vis_code.parity());
        tone_gen.silence(0.1);

        let buffer = SampleBuffer::new(&tone_gen.samples, SAMPLE_RATE);
        let mut spectrum = SpectrumAnalyzer::new(SAMPLE_RATE as f32);

        let header = detect_header(&mut spectrum, &buffer, 3.0).unwrap();
        assert_eq!(header.vis_code, vis_code);
        assert_ne!(header.parity_bit, vis_code.parity());
    }
}

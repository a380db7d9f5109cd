//! Scanline pixel reconstruction.

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    buffer::SampleBuffer,
    modes::ModeDescriptor,
    spectrum::SpectrumAnalyzer,
    sync::LineTiming,
    util::unlerp,
};

/// One decoded image row.
#[derive(Clone, Debug)]
pub struct Scanline {
    pub row: usize,
    pub synced: bool,
    pub pixels: Vec<[u8; 4]>,
}

/// Converts one line's time segment into a row of RGBA pixels.
///
/// Frequencies outside the 1500–2300 Hz luminance band clamp to 0 or 255,
/// so noise can corrupt intensity but never row geometry.
#[derive(Clone, Copy, Debug)]
pub struct LineDecoder {
    mode: ModeDescriptor,
    fft_size: usize,
}

impl LineDecoder {
    pub fn new(mode: ModeDescriptor, fft_size: usize) -> Self {
        Self { mode, fft_size }
    }

    pub fn decode(
        &self,
        spectrum: &mut SpectrumAnalyzer,
        samples: &SampleBuffer,
        timing: &LineTiming,
        row: usize,
    ) -> Scanline {
        let num_channels = self.mode.color_format.num_channels();
        let width = self.mode.width;

        let mut channels = [const { Vec::new() }; 3];
        for (channel, values) in channels.iter_mut().take(num_channels).enumerate() {
            let channel_start = timing.start + self.mode.channel_start(channel);
            values.reserve(width);

            for x in 0..width {
                let center = channel_start + (x as f32 + 0.5) * self.mode.pixel_time;
                let estimate = spectrum.estimate(samples, center, self.fft_size);
                values.push(intensity(estimate.frequency));
            }
        }

        let pixels = (0..width)
            .map(|x| {
                let values: Vec<u8> = channels[..num_channels]
                    .iter()
                    .map(|channel| channel[x])
                    .collect();
                self.mode.color_format.to_rgba(&values)
            })
            .collect();

        Scanline {
            row,
            synced: timing.synced,
            pixels,
        }
    }
}

#[inline]
fn intensity(frequency: f32) -> u8 {
    let value = unlerp(frequency, CHANNEL_LOW_TONE, CHANNEL_HIGH_TONE).clamp(0.0, 1.0);
    (value * 255.0).round() as u8
}

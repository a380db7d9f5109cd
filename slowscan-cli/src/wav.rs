//! WAV loading for the decoder: any channel count is mixed down to mono,
//! integer formats are rescaled to float.

use std::path::Path;

use hound::SampleFormat;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error(transparent)]
    Hound(#[from] hound::Error),
    #[error("wav file has no channels")]
    NoChannels,
    #[error("unsupported bits per sample: {bits_per_sample}")]
    UnsupportedBitsPerSample { bits_per_sample: u16 },
}

/// Reads a WAV file as mono f32 samples plus its sample rate.
pub fn read_mono(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(WavError::NoChannels);
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => {
            reader
                .samples::<f32>()
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Int, 16) => {
            reader
                .samples::<i16>()
                .map(|sample| sample.map(|sample| sample as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Int, 32) => {
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|sample| sample as f32 / i32::MAX as f32))
                .collect::<Result<_, _>>()?
        }
        (_, bits_per_sample) => {
            return Err(WavError::UnsupportedBitsPerSample { bits_per_sample });
        }
    };

    let channels = spec.channels as usize;
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

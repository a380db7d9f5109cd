use std::panic::{
    AssertUnwindSafe,
    catch_unwind,
};

use crate::{
    HEADER_TIME,
    buffer::SampleBuffer,
    line::LineDecoder,
    modes::{
        DefaultModes,
        ModeDescriptor,
        ModeSelectError,
        SelectMode,
        VisCode,
    },
    raster::RasterImage,
    spectrum::SpectrumAnalyzer,
    sync::SyncTracker,
    vis::detect_header,
};

pub const MIN_FFT_SIZE: usize = 128;
pub const MAX_FFT_SIZE: usize = 16384;

/// Receiver for intermediate progress notifications. Implemented for any
/// `FnMut(f32)` closure; values are strictly increasing within `[0, 1]` and
/// always precede the terminal result.
pub trait ProgressSink {
    fn progress(&mut self, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: FnMut(f32),
{
    #[inline]
    fn progress(&mut self, fraction: f32) {
        self(fraction)
    }
}

/// Input rejected before any analysis begins.
#[derive(Clone, Debug, thiserror::Error)]
pub enum InputError {
    #[error("empty sample buffer")]
    EmptyBuffer,
    #[error(
        "sample buffer too short: {num_samples} samples, but a calibration header needs {required}"
    )]
    TooShort { num_samples: usize, required: usize },
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error(
        "unsupported fft size {fft_size}: must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}"
    )]
    UnsupportedFftSize { fft_size: usize },
}

/// Terminal decode failure. Recoverable conditions (missing header, parity
/// mismatch, lost sync) never surface here; they degrade the output instead.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("unsupported mode: vis code {:#04x}", .vis_code.get())]
    UnsupportedMode { vis_code: VisCode },
    #[error("internal decoder fault: {message}")]
    Internal { message: String },
}

#[derive(Clone, Copy, Debug)]
pub struct DecoderConfig {
    /// Mode assumed when no valid VIS header is found.
    pub fallback_mode: ModeDescriptor,
    /// How far into the buffer to search for the calibration header, in
    /// seconds.
    pub search_horizon: f32,
    /// Sync search window as a fraction of the nominal line duration.
    pub drift_tolerance: f32,
    /// Emit a progress notification every this many lines.
    pub progress_lines: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fallback_mode: ModeDescriptor::M1,
            search_horizon: 3.0,
            drift_tolerance: 0.05,
            progress_lines: 4,
        }
    }
}

/// SSTV decoder. Holds configuration only; every [`decode`](Self::decode)
/// call runs an independent session over its input and leaves no state
/// behind.
#[derive(Clone, Copy, Debug)]
pub struct SstvDecoder<M = DefaultModes> {
    config: DecoderConfig,
    select_mode: M,
}

impl SstvDecoder<DefaultModes> {
    #[inline]
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    #[inline]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self::with_mode_select(config, DefaultModes)
    }
}

impl Default for SstvDecoder<DefaultModes> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SstvDecoder<M>
where
    M: SelectMode,
{
    pub fn with_mode_select(config: DecoderConfig, select_mode: M) -> Self {
        Self {
            config,
            select_mode,
        }
    }

    /// Decodes one transmission.
    ///
    /// Emits zero or more progress notifications, then returns exactly one
    /// terminal outcome: the finished raster or a typed error. Panics inside
    /// the session are caught here and reported as
    /// [`DecodeError::Internal`].
    pub fn decode<P>(
        &self,
        samples: &[f32],
        sample_rate: u32,
        fft_size: usize,
        mut progress: P,
    ) -> Result<RasterImage, DecodeError>
    where
        P: ProgressSink,
    {
        validate_input(samples, sample_rate, fft_size)?;

        match catch_unwind(AssertUnwindSafe(|| {
            self.run_session(samples, sample_rate, fft_size, &mut progress)
        })) {
            Ok(result) => result,
            Err(panic) => {
                Err(DecodeError::Internal {
                    message: panic_message(panic),
                })
            }
        }
    }

    fn run_session<P>(
        &self,
        samples: &[f32],
        sample_rate: u32,
        fft_size: usize,
        progress: &mut P,
    ) -> Result<RasterImage, DecodeError>
    where
        P: ProgressSink,
    {
        let buffer = SampleBuffer::new(samples, sample_rate);
        let mut spectrum = SpectrumAnalyzer::new(buffer.sample_rate());

        tracing::debug!(duration = buffer.duration(), "calibrating");
        let (mode, header_end) =
            match detect_header(&mut spectrum, &buffer, self.config.search_horizon) {
                Ok(header) => {
                    match self
                        .select_mode
                        .mode_descriptor_with_parity(header.vis_code, header.parity_bit)
                    {
                        Ok(mode) => {
                            tracing::debug!(mode = mode.name, header_end = header.header_end);
                            (mode, header.header_end)
                        }
                        Err(ModeSelectError::UnknownMode { vis_code }) => {
                            return Err(DecodeError::UnsupportedMode { vis_code });
                        }
                        Err(error @ ModeSelectError::Parity) => self.fall_back(&error),
                    }
                }
                Err(error) => self.fall_back(&error),
            };

        tracing::debug!(mode = mode.name, "decoding");
        let mut raster = RasterImage::for_mode(&mode);
        let mut tracker = SyncTracker::new(&mode, header_end, self.config.drift_tolerance);
        let line_decoder = LineDecoder::new(mode, fft_size);

        for line in 0..mode.num_lines {
            let timing = tracker.next_line(&mut spectrum, &buffer);
            let scanline = line_decoder.decode(&mut spectrum, &buffer, &timing, line);

            for dy in 0..mode.line_height {
                raster.write_row(line * mode.line_height + dy, &scanline.pixels);
            }

            let lines_done = line + 1;
            if lines_done % self.config.progress_lines.max(1) == 0 || lines_done == mode.num_lines
            {
                progress.progress(lines_done as f32 / mode.num_lines as f32);
            }
        }

        Ok(raster)
    }

    /// Calibration could not resolve a mode: substitute the configured
    /// default and the nominal header length, and keep decoding.
    fn fall_back(&self, error: &dyn std::error::Error) -> (ModeDescriptor, f32) {
        tracing::warn!(
            %error,
            fallback = self.config.fallback_mode.name,
            "calibration failed, decoding with fallback mode"
        );
        (self.config.fallback_mode, HEADER_TIME)
    }
}

fn validate_input(samples: &[f32], sample_rate: u32, fft_size: usize) -> Result<(), InputError> {
    if samples.is_empty() {
        return Err(InputError::EmptyBuffer);
    }
    if sample_rate == 0 {
        return Err(InputError::InvalidSampleRate);
    }
    if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        return Err(InputError::UnsupportedFftSize { fft_size });
    }

    let required = (HEADER_TIME * sample_rate as f32).ceil() as usize;
    if samples.len() < required {
        return Err(InputError::TooShort {
            num_samples: samples.len(),
            required,
        });
    }

    Ok(())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    }
    else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    }
    else {
        "unknown panic".to_owned()
    }
}

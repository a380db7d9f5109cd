mod wav;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{
    Error,
    bail,
};
use slowscan::{
    DecoderConfig,
    SstvDecoder,
    modes::builtin_mode_by_short_name,
};
use tracing_subscriber::EnvFilter;

use crate::wav::read_mono;

fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!(?args);

    let Some(fallback_mode) = builtin_mode_by_short_name(&args.fallback_mode)
    else {
        bail!("unknown fallback mode: {}", args.fallback_mode);
    };

    let (samples, sample_rate) = read_mono(&args.input)?;
    tracing::info!(
        num_samples = samples.len(),
        sample_rate,
        "loaded {}",
        args.input.display()
    );

    let decoder = SstvDecoder::with_config(DecoderConfig {
        fallback_mode: *fallback_mode,
        search_horizon: args.horizon,
        ..DecoderConfig::default()
    });

    let mut last_percent = 0u32;
    let image = decoder.decode(&samples, sample_rate, args.fft_size, |fraction: f32| {
        let percent = (fraction * 100.0) as u32;
        if percent / 10 > last_percent / 10 {
            tracing::info!("decoding: {percent}%");
        }
        last_percent = percent;
    })?;

    let (width, height) = (image.width(), image.height());
    image.into_rgba_image().save(&args.output)?;
    tracing::info!(width, height, "wrote {}", args.output.display());

    Ok(())
}

/// Decode an SSTV transmission from a WAV recording into a PNG image.
#[derive(Debug, Parser)]
struct Args {
    /// Input WAV file.
    input: PathBuf,

    /// Output image file.
    output: PathBuf,

    /// FFT window size used for pixel sampling. Larger windows improve
    /// frequency (intensity) resolution at the cost of horizontal detail.
    #[clap(long, default_value = "1024")]
    fft_size: usize,

    /// Mode assumed when no VIS header can be decoded (short name, e.g. M1,
    /// S1, R36).
    #[clap(long, default_value = "M1")]
    fallback_mode: String,

    /// How many seconds to search for the calibration header.
    #[clap(long, default_value = "3.0")]
    horizon: f32,
}

//! Decoder for Slow-Scan Television (SSTV) audio recordings.
//!
//! The input is a mono buffer of 32 bit float PCM samples. The output is an
//! RGBA raster image. The decoder locates the VIS calibration header to
//! select a transmission mode, tracks per-line sync pulses with a drift
//! tolerance, and reconstructs pixels by estimating the dominant audio
//! frequency at each pixel center.
//!
//! ```no_run
//! use slowscan::SstvDecoder;
//!
//! # fn main() -> Result<(), slowscan::DecodeError> {
//! let samples: Vec<f32> = todo!("mono PCM from your audio source");
//! let decoder = SstvDecoder::new();
//! let image = decoder.decode(&samples, 44100, 1024, |progress: f32| {
//!     eprintln!("{:3.0}%", progress * 100.0);
//! })?;
//! image.into_rgba_image().save("decoded.png").unwrap();
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - <http://lionel.cordesses.free.fr/gpages/sstv.html>
//! - <https://web.archive.org/web/20120505141047/http://www.cs.helsinki.fi/u/okraisan/slowrx/>
//! - <http://www.barberdsp.com/downloads/Dayton%20Paper.pdf>
//! - <https://web.archive.org/web/20120313215600/http://lionel.cordesses.free.fr/gpages/Cordesses.pdf>

pub mod buffer;
mod decoder;
pub mod line;
pub mod modes;
pub mod raster;
pub mod spectrum;
pub mod sync;
mod util;
pub mod vis;

pub use decoder::{
    DecodeError,
    DecoderConfig,
    InputError,
    ProgressSink,
    SstvDecoder,
};
pub use raster::RasterImage;

pub const LEADER_TONE: f32 = 1900.0;
pub const LEADER_TIME: f32 = 0.300;

pub const LEADER_BREAK_TIME: f32 = 0.010;

pub const VIS_BIT_TIME: f32 = 0.030;
pub const VIS_LOW_TONE: f32 = 1300.0;
pub const VIS_HIGH_TONE: f32 = 1100.0;

// sync, leader break, vis start/stop
pub const SYNC_TONE: f32 = 1200.0;

pub const PORCH_TONE: f32 = 1500.0;

pub const CHANNEL_LOW_TONE: f32 = 1500.0;
pub const CHANNEL_HIGH_TONE: f32 = 2300.0;

/// Nominal length of the calibration header: two leader tones, the leader
/// break and the ten VIS bits (start, 7 data, parity, stop).
pub const HEADER_TIME: f32 = 2.0 * LEADER_TIME + LEADER_BREAK_TIME + 10.0 * VIS_BIT_TIME;

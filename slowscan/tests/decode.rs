//! End-to-end decoder tests against synthesized transmissions.

use std::f64::consts::TAU;

use slowscan::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    DecodeError,
    DecoderConfig,
    InputError,
    LEADER_BREAK_TIME,
    LEADER_TIME,
    LEADER_TONE,
    PORCH_TONE,
    SYNC_TONE,
    SstvDecoder,
    VIS_BIT_TIME,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    modes::{
        ColorFormat,
        ModeDescriptor,
        VisCode,
    },
};

const SAMPLE_RATE: u32 = 44100;

/// Compact mode keeping the synthesized transmissions short. Resolved
/// through the `SelectMode` seam instead of the built-in registry.
const TEST_MODE: ModeDescriptor = ModeDescriptor {
    name: "Test 16x8",
    short_name: "T16",
    vis_code: VisCode::new_unchecked(0x44),
    color_format: ColorFormat::Rgb,
    width: 16,
    num_lines: 8,
    line_height: 1,
    sync_time: 10e-3,
    porch_time: 3e-3,
    sep_time: 2e-3,
    pixel_time: 10e-3,
    line_time: 499e-3,
};

/// Phase-continuous tone synthesizer. Segment boundaries are tracked on an
/// exact clock so rounding never accumulates across a transmission.
struct ToneGen {
    samples: Vec<f32>,
    phase: f64,
    clock: f64,
}

impl ToneGen {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            phase: 0.0,
            clock: 0.0,
        }
    }

    fn tone(&mut self, frequency: f32, duration: f32) {
        self.clock += duration as f64;
        let target = (self.clock * SAMPLE_RATE as f64).round() as usize;
        let step = TAU * frequency as f64 / SAMPLE_RATE as f64;
        while self.samples.len() < target {
            self.samples.push(self.phase.sin() as f32);
            self.phase = (self.phase + step) % TAU;
        }
    }

    fn silence(&mut self, duration: f32) {
        self.clock += duration as f64;
        let target = (self.clock * SAMPLE_RATE as f64).round() as usize;
        self.samples.resize(target, 0.0);
    }

    fn header(&mut self, vis_code: VisCode, parity: bool) {
        self.tone(LEADER_TONE, LEADER_TIME);
        self.tone(SYNC_TONE, LEADER_BREAK_TIME);
        self.tone(LEADER_TONE, LEADER_TIME);
        self.tone(SYNC_TONE, VIS_BIT_TIME);
        for bit in 0..7 {
            let tone = if vis_code.get_bit(bit) {
                VIS_HIGH_TONE
            }
            else {
                VIS_LOW_TONE
            };
            self.tone(tone, VIS_BIT_TIME);
        }
        self.tone(if parity { VIS_HIGH_TONE } else { VIS_LOW_TONE }, VIS_BIT_TIME);
        self.tone(SYNC_TONE, VIS_BIT_TIME);
    }

    /// Inverse of the decoder's frequency mapping for one solid-color line.
    fn line(&mut self, mode: &ModeDescriptor, rgb: [u8; 3]) {
        self.tone(SYNC_TONE, mode.sync_time);
        self.tone(PORCH_TONE, mode.porch_time);
        for value in rgb {
            let t = value as f32 / 255.0;
            let frequency = CHANNEL_LOW_TONE + t * (CHANNEL_HIGH_TONE - CHANNEL_LOW_TONE);
            self.tone(frequency, mode.scan_time());
            self.tone(PORCH_TONE, mode.sep_time);
        }
    }
}

fn synthesize_transmission(rgb: [u8; 3]) -> Vec<f32> {
    let mut tone_gen = ToneGen::new();
    tone_gen.silence(0.05);
    tone_gen.header(TEST_MODE.vis_code, TEST_MODE.vis_code.parity());
    for _ in 0..TEST_MODE.num_lines {
        tone_gen.line(&TEST_MODE, rgb);
    }
    tone_gen.silence(0.1);
    tone_gen.samples
}

fn test_decoder() -> SstvDecoder<ModeDescriptor> {
    let config = DecoderConfig {
        fallback_mode: TEST_MODE,
        progress_lines: 1,
        ..DecoderConfig::default()
    };
    SstvDecoder::with_mode_select(config, TEST_MODE)
}

#[test]
fn round_trip_reproduces_a_solid_color() {
    let rgb = [180, 64, 200];
    let samples = synthesize_transmission(rgb);

    let mut progress = Vec::new();
    let image = test_decoder()
        .decode(&samples, SAMPLE_RATE, 512, |fraction: f32| progress.push(fraction))
        .unwrap();

    assert_eq!(image.width(), TEST_MODE.width);
    assert_eq!(image.height(), TEST_MODE.height());
    assert_eq!(image.data().len(), TEST_MODE.width * TEST_MODE.height() * 4);

    for (i, pixel) in image.data().chunks_exact(4).enumerate() {
        for channel in 0..3 {
            let decoded = pixel[channel] as i16;
            let expected = rgb[channel] as i16;
            assert!(
                (decoded - expected).abs() <= 8,
                "pixel {i} channel {channel}: {decoded} vs {expected}"
            );
        }
        assert_eq!(pixel[3], 0xff);
    }

    assert!(!progress.is_empty());
}

#[test]
fn identical_input_yields_identical_output() {
    let samples = synthesize_transmission([30, 200, 120]);
    let decoder = test_decoder();

    let first = decoder
        .decode(&samples, SAMPLE_RATE, 512, |_: f32| {})
        .unwrap();
    let second = decoder
        .decode(&samples, SAMPLE_RATE, 512, |_: f32| {})
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn progress_is_strictly_increasing_and_bounded() {
    let samples = synthesize_transmission([0, 0, 0]);

    let mut progress = Vec::new();
    test_decoder()
        .decode(&samples, SAMPLE_RATE, 512, |fraction: f32| progress.push(fraction))
        .unwrap();

    assert_eq!(progress.len(), TEST_MODE.num_lines);
    for pair in progress.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    assert!(progress.iter().all(|fraction| (0.0..=1.0).contains(fraction)));
    assert_eq!(*progress.last().unwrap(), 1.0);
}

#[test]
fn all_zero_input_degrades_but_completes() {
    // no header, no sync pulses: calibration falls back, every line is
    // dead-reckoned, and the decode still terminates with a full image
    let samples = vec![0.0f32; SAMPLE_RATE as usize];

    let mut progress = Vec::new();
    let image = test_decoder()
        .decode(&samples, SAMPLE_RATE, 1024, |fraction: f32| progress.push(fraction))
        .unwrap();

    assert_eq!(image.width(), TEST_MODE.width);
    assert_eq!(image.height(), TEST_MODE.height());
    assert_eq!(progress.len(), TEST_MODE.num_lines);
    for pair in progress.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn short_buffer_is_rejected_without_progress() {
    let samples = vec![0.0f32; SAMPLE_RATE as usize / 4];

    let mut progress = Vec::<f32>::new();
    let error = test_decoder()
        .decode(&samples, SAMPLE_RATE, 1024, |fraction: f32| progress.push(fraction))
        .unwrap_err();

    assert!(matches!(
        error,
        DecodeError::Input(InputError::TooShort { .. })
    ));
    assert!(progress.is_empty());
}

#[test]
fn invalid_fft_size_is_rejected_without_progress() {
    let samples = vec![0.0f32; SAMPLE_RATE as usize];

    let mut progress = Vec::<f32>::new();
    let error = test_decoder()
        .decode(&samples, SAMPLE_RATE, 3, |fraction: f32| progress.push(fraction))
        .unwrap_err();

    assert!(matches!(
        error,
        DecodeError::Input(InputError::UnsupportedFftSize { fft_size: 3 })
    ));
    assert!(progress.is_empty());
}

#[test]
fn unknown_vis_code_is_a_fatal_typed_error() {
    // valid parity, but 0x01 is not in the built-in registry
    let vis_code = VisCode::new(0x01).unwrap();
    let mut tone_gen = ToneGen::new();
    tone_gen.header(vis_code, vis_code.parity());
    tone_gen.silence(0.2);

    let decoder = SstvDecoder::new();
    let error = decoder
        .decode(&tone_gen.samples, SAMPLE_RATE, 1024, |_: f32| {})
        .unwrap_err();

    match error {
        DecodeError::UnsupportedMode { vis_code } => assert_eq!(vis_code.get(), 0x01),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn corrupted_parity_falls_back_and_completes() {
    let mut tone_gen = ToneGen::new();
    tone_gen.header(TEST_MODE.vis_code, !TEST_MODE.vis_code.parity());
    tone_gen.silence(0.5);

    let image = test_decoder()
        .decode(&tone_gen.samples, SAMPLE_RATE, 512, |_: f32| {})
        .unwrap();

    // fallback descriptor decides the raster dimensions
    assert_eq!(image.width(), TEST_MODE.width);
    assert_eq!(image.height(), TEST_MODE.height());
}

#[test]
fn header_is_found_after_leading_silence() {
    let rgb = [128, 128, 128];
    let mut tone_gen = ToneGen::new();
    tone_gen.silence(0.4);
    tone_gen.header(TEST_MODE.vis_code, TEST_MODE.vis_code.parity());
    for _ in 0..TEST_MODE.num_lines {
        tone_gen.line(&TEST_MODE, rgb);
    }
    tone_gen.silence(0.1);

    let image = test_decoder()
        .decode(&tone_gen.samples, SAMPLE_RATE, 512, |_: f32| {})
        .unwrap();

    // interior pixel, clear of any boundary smear
    let pixel_index = (3 * TEST_MODE.width + 8) * 4;
    let pixel = &image.data()[pixel_index..pixel_index + 4];
    for channel in 0..3 {
        assert!(
            (pixel[channel] as i16 - 128).abs() <= 8,
            "channel {channel}: {}",
            pixel[channel]
        );
    }
}

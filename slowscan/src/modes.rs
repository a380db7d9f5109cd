//! Mode descriptors
//!
//! Timings adapted from [here][1]. [Vis codes][2]
//!
//! [1]: https://github.com/windytan/slowrx/blob/master/modespec.c
//! [2]: https://web.archive.org/web/20050306193820/http://www.tima.com/~djones/vis.txt

use std::{
    collections::HashMap,
    sync::OnceLock,
};

/// Color model of a mode's channel layout, in transmission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    /// Green, blue, red scans (Martin, Scottie).
    Gbr,
    /// Red, green, blue scans (Wraase, Pasokon).
    Rgb,
    /// Luma, R-Y chroma, B-Y chroma scans (Robot color, PD).
    Yuv,
    /// Single luma scan (Robot B/W).
    Gray,
}

impl ColorFormat {
    #[inline]
    pub fn num_channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            _ => 3,
        }
    }

    /// Combines one pixel's channel intensities into an RGBA pixel.
    pub fn to_rgba(&self, values: &[u8]) -> [u8; 4] {
        match self {
            Self::Gbr => [values[2], values[0], values[1], 0xff],
            Self::Rgb => [values[0], values[1], values[2], 0xff],
            Self::Yuv => yuv_to_rgba(values[0], values[1], values[2]),
            Self::Gray => [values[0], values[0], values[0], 0xff],
        }
    }
}

/// ITU-R BT.601 conversion with chroma centered on 128.
fn yuv_to_rgba(y: u8, cr: u8, cb: u8) -> [u8; 4] {
    let y = y as f32;
    let cr = cr as f32 - 128.0;
    let cb = cb as f32 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;

    [
        r.clamp(0.0, 255.0).round() as u8,
        g.clamp(0.0, 255.0).round() as u8,
        b.clamp(0.0, 255.0).round() as u8,
        0xff,
    ]
}

/// 7 bit VIS code identifying a transmission mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VisCode(u8);

impl VisCode {
    #[inline]
    pub const fn new(value: u8) -> Option<Self> {
        if value & 0x80 == 0 {
            Some(Self(value))
        }
        else {
            None
        }
    }

    #[inline]
    pub const fn new_unchecked(value: u8) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn get_bit(&self, bit: u8) -> bool {
        assert!(bit < 7);
        (self.0 >> bit) & 1 != 0
    }

    /// Even-parity bit for the 7 data bits.
    #[inline]
    pub fn parity(&self) -> bool {
        let parity = (self.0 >> 6)
            ^ (self.0 >> 5)
            ^ (self.0 >> 4)
            ^ (self.0 >> 3)
            ^ (self.0 >> 2)
            ^ (self.0 >> 1)
            ^ self.0;
        parity & 1 != 0
    }
}

/// Static timing and color parameters of one SSTV variant.
///
/// A line is transmitted as sync pulse, porch, then per channel a scan
/// segment of `width * pixel_time` followed by a separator. All times are
/// seconds.
#[derive(Clone, Copy, Debug)]
pub struct ModeDescriptor {
    pub name: &'static str,
    pub short_name: &'static str,
    pub vis_code: VisCode,
    pub color_format: ColorFormat,
    /// Pixels per scanline.
    pub width: usize,
    /// Transmitted scanlines.
    pub num_lines: usize,
    /// Raster rows each transmitted line covers (2 for half-resolution
    /// modes).
    pub line_height: usize,
    pub sync_time: f32,
    pub porch_time: f32,
    pub sep_time: f32,
    pub pixel_time: f32,
    pub line_time: f32,
}

impl ModeDescriptor {
    /// Height of the output raster.
    #[inline]
    pub fn height(&self) -> usize {
        self.num_lines * self.line_height
    }

    /// Duration of one channel's scan segment.
    #[inline]
    pub fn scan_time(&self) -> f32 {
        self.pixel_time * self.width as f32
    }

    /// Offset of a channel's scan segment from the line start.
    #[inline]
    pub fn channel_start(&self, channel: usize) -> f32 {
        self.sync_time
            + self.porch_time
            + channel as f32 * (self.scan_time() + self.sep_time)
    }

    // N7CXI, 2000
    pub const M1: Self = Self {
        name: "Martin M1",
        short_name: "M1",
        vis_code: VisCode(0x2c),
        color_format: ColorFormat::Gbr,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 4.862e-3,
        porch_time: 0.572e-3,
        sep_time: 0.572e-3,
        pixel_time: 0.4576e-3,
        line_time: 446.446e-3,
    };

    /// N7CXI, 2000
    pub const M2: Self = Self {
        name: "Martin M2",
        short_name: "M2",
        vis_code: VisCode(0x28),
        color_format: ColorFormat::Gbr,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 4.862e-3,
        porch_time: 0.572e-3,
        sep_time: 0.572e-3,
        pixel_time: 0.2288e-3,
        line_time: 226.7986e-3,
    };

    /// N7CXI, 2000
    pub const S1: Self = Self {
        name: "Scottie S1",
        short_name: "S1",
        vis_code: VisCode(0x3c),
        color_format: ColorFormat::Gbr,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 9e-3,
        porch_time: 1.5e-3,
        sep_time: 1.5e-3,
        pixel_time: 0.4320e-3,
        line_time: 428.38e-3,
    };

    /// N7CXI, 2000
    pub const S2: Self = Self {
        name: "Scottie S2",
        short_name: "S2",
        vis_code: VisCode(0x38),
        color_format: ColorFormat::Gbr,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 9e-3,
        porch_time: 1.5e-3,
        sep_time: 1.5e-3,
        pixel_time: 0.2752e-3,
        line_time: 277.692e-3,
    };

    /// N7CXI, 2000
    pub const SDX: Self = Self {
        name: "Scottie DX",
        short_name: "SDX",
        vis_code: VisCode(0x4c),
        color_format: ColorFormat::Gbr,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 9e-3,
        porch_time: 1.5e-3,
        sep_time: 1.5e-3,
        pixel_time: 1.08053e-3,
        line_time: 1050.3e-3,
    };

    /// N7CXI, 2000
    pub const R36: Self = Self {
        name: "Robot 36",
        short_name: "R36",
        vis_code: VisCode(0x08),
        color_format: ColorFormat::Yuv,
        width: 320,
        num_lines: 240,
        line_height: 1,
        sync_time: 9e-3,
        porch_time: 3e-3,
        sep_time: 6e-3,
        pixel_time: 0.1375e-3,
        line_time: 150e-3,
    };

    /// N7CXI, 2000
    pub const R72: Self = Self {
        name: "Robot 72",
        short_name: "R72",
        vis_code: VisCode(0x0c),
        color_format: ColorFormat::Yuv,
        width: 320,
        num_lines: 240,
        line_height: 1,
        sync_time: 9e-3,
        porch_time: 3e-3,
        sep_time: 4.7e-3,
        pixel_time: 0.2875e-3,
        line_time: 300e-3,
    };

    /// N7CXI, 2000
    pub const R8BW: Self = Self {
        name: "Robot 8 B/W",
        short_name: "R8Gray",
        vis_code: VisCode(0x02),
        color_format: ColorFormat::Gray,
        width: 320,
        num_lines: 120,
        line_height: 2,
        sync_time: 7e-3,
        porch_time: 0e-3,
        sep_time: 0e-3,
        pixel_time: 0.1871875e-3,
        line_time: 66.9e-3,
    };

    /// N7CXI, 2000
    pub const PD90: Self = Self {
        name: "PD-90",
        short_name: "PD90",
        vis_code: VisCode(0x63),
        color_format: ColorFormat::Yuv,
        width: 320,
        num_lines: 256,
        line_height: 1,
        sync_time: 20e-3,
        porch_time: 2.08e-3,
        sep_time: 0e-3,
        pixel_time: 0.532e-3,
        line_time: 703.04e-3,
    };

    /// N7CXI, 2000
    pub const PD120: Self = Self {
        name: "PD-120",
        short_name: "PD120",
        vis_code: VisCode(0x5f),
        color_format: ColorFormat::Yuv,
        width: 640,
        num_lines: 496,
        line_height: 1,
        sync_time: 20e-3,
        porch_time: 2.08e-3,
        sep_time: 0e-3,
        pixel_time: 0.19e-3,
        line_time: 508.48e-3,
    };
}

const BUILTIN_MODES: &[&ModeDescriptor] = &[
    &ModeDescriptor::M1,
    &ModeDescriptor::M2,
    &ModeDescriptor::S1,
    &ModeDescriptor::S2,
    &ModeDescriptor::SDX,
    &ModeDescriptor::R36,
    &ModeDescriptor::R72,
    &ModeDescriptor::R8BW,
    &ModeDescriptor::PD90,
    &ModeDescriptor::PD120,
];

pub fn builtin_mode(vis_code: VisCode) -> Option<&'static ModeDescriptor> {
    static MAP: OnceLock<HashMap<VisCode, &'static ModeDescriptor>> = OnceLock::new();
    let map = MAP.get_or_init(|| {
        BUILTIN_MODES
            .iter()
            .map(|mode| (mode.vis_code, *mode))
            .collect()
    });

    map.get(&vis_code).copied()
}

pub fn builtin_mode_by_short_name(short_name: &str) -> Option<&'static ModeDescriptor> {
    BUILTIN_MODES
        .iter()
        .find(|mode| mode.short_name.eq_ignore_ascii_case(short_name))
        .copied()
}

#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum ModeSelectError {
    #[error("vis parity mismatch")]
    Parity,
    #[error("unknown vis code {:#04x}", .vis_code.get())]
    UnknownMode { vis_code: VisCode },
}

/// Seam for resolving a decoded VIS code into a mode descriptor. The
/// built-in registry is closed; tests and special deployments can substitute
/// their own.
pub trait SelectMode {
    fn mode_descriptor(&self, vis_code: VisCode) -> Result<ModeDescriptor, ModeSelectError>;

    fn mode_descriptor_with_parity(
        &self,
        vis_code: VisCode,
        parity: bool,
    ) -> Result<ModeDescriptor, ModeSelectError> {
        let expected_parity = vis_code.parity();
        tracing::debug!(?vis_code, ?expected_parity, ?parity);
        if expected_parity != parity {
            Err(ModeSelectError::Parity)
        }
        else {
            self.mode_descriptor(vis_code)
        }
    }
}

impl<T> SelectMode for &T
where
    T: SelectMode,
{
    #[inline]
    fn mode_descriptor(&self, vis_code: VisCode) -> Result<ModeDescriptor, ModeSelectError> {
        (&**self).mode_descriptor(vis_code)
    }

    #[inline]
    fn mode_descriptor_with_parity(
        &self,
        vis_code: VisCode,
        parity: bool,
    ) -> Result<ModeDescriptor, ModeSelectError> {
        (&**self).mode_descriptor_with_parity(vis_code, parity)
    }
}

/// The built-in registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultModes;

impl SelectMode for DefaultModes {
    fn mode_descriptor(&self, vis_code: VisCode) -> Result<ModeDescriptor, ModeSelectError> {
        builtin_mode(vis_code)
            .copied()
            .ok_or(ModeSelectError::UnknownMode { vis_code })
    }
}

impl SelectMode for ModeDescriptor {
    fn mode_descriptor(&self, vis_code: VisCode) -> Result<ModeDescriptor, ModeSelectError> {
        if vis_code == self.vis_code {
            Ok(*self)
        }
        else {
            Err(ModeSelectError::UnknownMode { vis_code })
        }
    }
}

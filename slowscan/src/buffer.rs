use num_complex::Complex;

/// Read-only view of the recorded PCM samples for one decode session.
///
/// Times are in seconds from the start of the buffer. Window reads outside
/// the recorded range yield zeros, so timing recovery can dead-reckon past
/// the end of a truncated recording without ever failing a read.
#[derive(Clone, Copy, Debug)]
pub struct SampleBuffer<'a> {
    samples: &'a [f32],
    sample_rate: f32,
}

impl<'a> SampleBuffer<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate as f32,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Length of the recording in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }

    #[inline]
    pub fn index_at(&self, time: f32) -> isize {
        (time * self.sample_rate) as isize
    }

    /// Copies a window of samples centered at `center_time` into `window`,
    /// widening to complex for the FFT. Out-of-range samples read as zero.
    pub fn fill_window(&self, center_time: f32, window: &mut [Complex<f32>]) {
        let start = self.index_at(center_time) - window.len() as isize / 2;

        for (i, out) in window.iter_mut().enumerate() {
            let index = start + i as isize;
            let sample = usize::try_from(index)
                .ok()
                .and_then(|index| self.samples.get(index).copied())
                .unwrap_or_default();
            *out = Complex::new(sample, 0.0);
        }
    }
}

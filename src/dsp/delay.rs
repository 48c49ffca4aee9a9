//! Feedback delay send — stereo delay line whose output is fed back into
//! its own input through a gain below unity.

/// A stereo feedback delay producing the wet (delayed) signal only.
///
/// The loop `delay_output → gain(feedback) → delay_input` is held in an
/// owned ring buffer: each sample reads the value written `delay` samples
/// ago and writes `input + feedback · read` at the write cursor.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,

    /// Feedback amount, strictly below 1.
    pub feedback: f32,
}

impl FeedbackDelay {
    /// Create a delay of `delay_time` seconds.
    ///
    /// `feedback` is clamped to `[0, 0.999]`; callers validate it first so the
    /// clamp never changes a legal value.
    pub fn new(sample_rate: f64, delay_time: f64, feedback: f64) -> Self {
        let delay_samples = ((delay_time.max(0.0) * sample_rate).round() as usize).max(1);
        Self {
            buffer_l: vec![0.0; delay_samples],
            buffer_r: vec![0.0; delay_samples],
            write_pos: 0,
            delay_samples,
            feedback: feedback.clamp(0.0, 0.999) as f32,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Process a stereo sample pair, returning the delayed output.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        // Buffer length equals the delay, so the read cursor sits on the write cursor.
        let delayed_l = self.buffer_l[self.write_pos];
        let delayed_r = self.buffer_r[self.write_pos];

        self.buffer_l[self.write_pos] = left + delayed_l * self.feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * self.feedback;

        self.write_pos = (self.write_pos + 1) % self.delay_samples;

        (delayed_l, delayed_r)
    }

    /// Replace a stereo block with its delayed, fed-back copy.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process(*l, *r);
        }
    }
}

//! Summing bus for the remix path.

/// A summing stereo bus that accumulates audio from multiple sources.
#[derive(Debug, Clone)]
pub struct Mixer {
    /// Gain applied to every source as it is added.
    pub source_gain: f32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer {
            source_gain: 0.8,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Prepare a bus of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.left.clear();
        self.left.resize(num_samples, 0.0);
        self.right.clear();
        self.right.resize(num_samples, 0.0);
    }

    /// Add a stereo frame at the given index.
    pub fn add(&mut self, index: usize, left: f32, right: f32) {
        if index < self.left.len() {
            self.left[index] += left * self.source_gain;
            self.right[index] += right * self.source_gain;
        }
    }

    /// Add a whole source starting at frame 0. Frames past the bus are dropped.
    pub fn add_source(&mut self, left: &[f32], right: &[f32]) {
        for (i, (&l, &r)) in left.iter().zip(right).enumerate() {
            self.add(i, l, r);
        }
    }

    /// Mutable access to the bus, for in-place bus processing.
    pub fn bus_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.left, &mut self.right)
    }

    pub fn into_channels(self) -> (Vec<f32>, Vec<f32>) {
        (self.left, self.right)
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

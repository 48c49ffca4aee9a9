//! Equal-power stereo panner for two-channel input.

use std::f32::consts::FRAC_PI_2;

/// Stereo panner. Pan 0 is an exact pass-through; negative values fold the
/// right channel into the left, positive values the reverse.
#[derive(Debug, Clone, Copy)]
pub struct StereoPanner {
    pan: f32,
}

impl StereoPanner {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: pan.clamp(-1.0, 1.0),
        }
    }

    pub fn centered() -> Self {
        Self::new(0.0)
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn process_block(&self, left: &mut [f32], right: &mut [f32]) {
        if self.pan == 0.0 {
            return;
        }
        if self.pan < 0.0 {
            let x = (self.pan + 1.0) * FRAC_PI_2;
            let (gain_l, gain_r) = (x.cos(), x.sin());
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l += *r * gain_l;
                *r *= gain_r;
            }
        } else {
            let x = self.pan * FRAC_PI_2;
            let (gain_l, gain_r) = (x.cos(), x.sin());
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *r += *l * gain_r;
                *l *= gain_l;
            }
        }
    }
}

impl Default for StereoPanner {
    fn default() -> Self {
        Self::centered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_identity() {
        let panner = StereoPanner::centered();
        let mut left = vec![0.3, -0.2, 0.9];
        let mut right = vec![-0.1, 0.4, 0.0];
        panner.process_block(&mut left, &mut right);
        assert_eq!(left, vec![0.3, -0.2, 0.9]);
        assert_eq!(right, vec![-0.1, 0.4, 0.0]);
    }

    #[test]
    fn hard_left_folds_right_into_left() {
        let panner = StereoPanner::new(-1.0);
        let mut left = vec![0.25];
        let mut right = vec![0.5];
        panner.process_block(&mut left, &mut right);
        assert!((left[0] - 0.75).abs() < 1e-6);
        assert!(right[0].abs() < 1e-6);
    }

    #[test]
    fn hard_right_folds_left_into_right() {
        let panner = StereoPanner::new(2.0);
        assert_eq!(panner.pan(), 1.0);
        let mut left = vec![0.25];
        let mut right = vec![0.5];
        panner.process_block(&mut left, &mut right);
        assert!(left[0].abs() < 1e-6);
        assert!((right[0] - 0.75).abs() < 1e-6);
    }
}

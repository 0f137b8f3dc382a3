//! Soft-knee transfer curves for the drive stage.
//!
//! Below the threshold the signal passes untouched. Above it the excess is
//! squeezed exponentially towards a ceiling set by the headroom, so the curve
//! bends instead of clipping.

pub const DEFAULT_CURVE_LEN: usize = 65536;

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(0.05 * db)
}

/// Compression model shared by every sample of one curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftKnee {
    linear_threshold: f32,
    k: f32,
}

impl SoftKnee {
    pub fn new(threshold_db: f32, headroom_db: f32) -> Self {
        let linear_threshold = db_to_linear(threshold_db);
        let linear_headroom = db_to_linear(headroom_db);
        let maximum = 1.05 * linear_headroom * linear_threshold;
        Self {
            linear_threshold,
            k: maximum - linear_threshold,
        }
    }

    pub fn linear_threshold(&self) -> f32 {
        self.linear_threshold
    }

    /// With no room between threshold and ceiling (headroom at or below
    /// `-20 * log10(1.05)` dB) the knee degenerates into a hard clip at the
    /// threshold.
    pub fn shape(&self, x: f32) -> f32 {
        let magnitude = x.abs();
        if magnitude < self.linear_threshold {
            return x;
        }
        if self.k <= 0.0 {
            return self.linear_threshold.copysign(x);
        }
        let squeezed = self.linear_threshold
            + self.k * (1.0 - (-(magnitude - self.linear_threshold) / self.k).exp());
        squeezed.copysign(x)
    }
}

/// Builds a lookup table of `len` entries (`len` should be even). The upper
/// half holds the shaped positive branch, the lower half its mirror image.
pub fn generate(threshold_db: f32, headroom_db: f32, len: usize) -> Vec<f32> {
    let knee = SoftKnee::new(threshold_db, headroom_db);
    let half = len / 2;
    let mut table = vec![0.0; len];
    for i in 0..half {
        let y = knee.shape(i as f32 / half as f32);
        table[half + i] = y;
        table[half - i - 1] = -y;
    }
    table
}

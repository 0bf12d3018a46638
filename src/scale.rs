//! Linear scales from entity weights to display sizes.

use crate::config::SizeRange;

/// A linear map from an input domain to an output range. When the domain is
/// a single point there is nothing to interpolate, and every input maps to
/// the neutral size instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearScale {
    Linear {
        min: f64,
        max: f64,
        out_min: f64,
        out_max: f64,
    },
    Degenerate {
        value: f64,
    },
}

impl LinearScale {
    pub fn new(min: f64, max: f64, out: &SizeRange) -> Self {
        if max > min {
            Self::Linear {
                min,
                max,
                out_min: out.min,
                out_max: out.max,
            }
        } else {
            Self::Degenerate { value: out.neutral }
        }
    }

    /// Domain spanning the smallest to the largest observed weight. No
    /// weights at all gives the degenerate scale.
    pub fn fit<I: IntoIterator<Item = u64>>(weights: I, out: &SizeRange) -> Self {
        let mut bounds: Option<(u64, u64)> = None;
        for w in weights {
            bounds = Some(match bounds {
                None => (w, w),
                Some((lo, hi)) => (lo.min(w), hi.max(w)),
            });
        }
        match bounds {
            Some((lo, hi)) => Self::new(lo as f64, hi as f64, out),
            None => Self::Degenerate { value: out.neutral },
        }
    }

    /// Domain `[0, max]`: sizes proportional to the share of the maximum.
    pub fn proportional(max: u64, out: &SizeRange) -> Self {
        Self::new(0.0, max as f64, out)
    }

    /// Inputs outside the domain are clamped to it.
    pub fn map(&self, value: f64) -> f64 {
        match *self {
            Self::Linear {
                min,
                max,
                out_min,
                out_max,
            } => {
                let t = (value.clamp(min, max) - min) / (max - min);
                out_min + (out_max - out_min) * t
            }
            Self::Degenerate { value } => value,
        }
    }

    pub fn map_weight(&self, weight: u64) -> f64 {
        self.map(weight as f64)
    }
}

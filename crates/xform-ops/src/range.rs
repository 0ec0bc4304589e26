//! Range operation for clamping and remapping values.
//!
//! The range op can:
//! - Clamp values to a min/max bound
//! - Scale and offset values (linear remapping)
//! - Combine both operations
//!
//! Identity replacements for clamping curves (log, basic gamma, standard
//! 1-D LUTs) are expressed as range ops, so the optimizer leans on this
//! type heavily.
//!
//! # Example
//!
//! ```rust
//! use xform_ops::RangeOpData;
//!
//! // Simple clamp to [0, 1]
//! let range = RangeOpData::clamp(0.0, 1.0);
//! let mut rgb = [1.5_f32, -0.2, 0.5];
//! range.apply_rgb(&mut rgb);
//! assert_eq!(rgb, [1.0, 0.0, 0.5]);
//! ```

use std::sync::OnceLock;

use xform_core::FormatMetadata;

use crate::cacheid::fmt_f64;
use crate::error::{OpError, OpResult};

/// Range operation parameters.
///
/// Bounds come in in/out pairs: when both pairs are present the op scales
/// `[min_in, max_in]` onto `[min_out, max_out]` and clamps to the output
/// bounds; with a single pair the op is a pure clamp.
#[derive(Debug, Clone)]
pub struct RangeOpData {
    min_in: Option<f64>,
    max_in: Option<f64>,
    min_out: Option<f64>,
    max_out: Option<f64>,
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
}

impl Default for RangeOpData {
    fn default() -> Self {
        Self::clamp(0.0, 1.0)
    }
}

impl PartialEq for RangeOpData {
    fn eq(&self, other: &Self) -> bool {
        self.min_in == other.min_in
            && self.max_in == other.max_in
            && self.min_out == other.min_out
            && self.max_out == other.max_out
            && self.metadata.id() == other.metadata.id()
    }
}

impl RangeOpData {
    /// Creates a range with full remapping parameters.
    pub fn new(
        min_in: Option<f64>,
        max_in: Option<f64>,
        min_out: Option<f64>,
        max_out: Option<f64>,
    ) -> Self {
        Self {
            min_in,
            max_in,
            min_out,
            max_out,
            metadata: FormatMetadata::new("Range"),
            cache_id: OnceLock::new(),
        }
    }

    /// Creates a clamp to `[min, max]` with no scaling.
    pub fn clamp(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max), Some(min), Some(max))
    }

    /// Creates a clamp with only a lower bound.
    pub fn clamp_min(min: f64) -> Self {
        Self::new(Some(min), None, Some(min), None)
    }

    /// Creates a clamp with only an upper bound.
    pub fn clamp_max(max: f64) -> Self {
        Self::new(None, Some(max), None, Some(max))
    }

    /// Lower input bound, if any.
    pub fn min_in(&self) -> Option<f64> {
        self.min_in
    }

    /// Upper input bound, if any.
    pub fn max_in(&self) -> Option<f64> {
        self.max_in
    }

    /// Lower output bound, if any.
    pub fn min_out(&self) -> Option<f64> {
        self.min_out
    }

    /// Upper output bound, if any.
    pub fn max_out(&self) -> Option<f64> {
        self.max_out
    }

    /// Attached metadata.
    pub fn metadata(&self) -> &FormatMetadata {
        &self.metadata
    }

    /// Mutable metadata access.
    pub fn metadata_mut(&mut self) -> &mut FormatMetadata {
        &mut self.metadata
    }

    /// Replaces the metadata tree.
    pub fn set_metadata(&mut self, metadata: FormatMetadata) {
        self.metadata = metadata;
    }

    /// Checks the range invariants.
    pub fn validate(&self) -> OpResult<()> {
        if self.min_in.is_some() != self.min_out.is_some() {
            return Err(OpError::validation(
                "range: min_in and min_out must be both set or both empty".to_string(),
            ));
        }
        if self.max_in.is_some() != self.max_out.is_some() {
            return Err(OpError::validation(
                "range: max_in and max_out must be both set or both empty".to_string(),
            ));
        }
        for v in [self.min_in, self.max_in, self.min_out, self.max_out]
            .into_iter()
            .flatten()
        {
            if !v.is_finite() {
                return Err(OpError::validation(format!(
                    "range: bound '{v}' is not finite"
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_in, self.max_in) {
            if lo >= hi {
                return Err(OpError::validation(format!(
                    "range: min_in '{lo}' must be less than max_in '{hi}'"
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_out, self.max_out) {
            if lo > hi {
                return Err(OpError::validation(format!(
                    "range: min_out '{lo}' must not exceed max_out '{hi}'"
                )));
            }
        }
        Ok(())
    }

    /// Scale factor of the remapping (1.0 for pure clamps).
    pub fn scale(&self) -> f64 {
        match (self.min_in, self.max_in, self.min_out, self.max_out) {
            (Some(min_in), Some(max_in), Some(min_out), Some(max_out)) => {
                (max_out - min_out) / (max_in - min_in)
            }
            _ => 1.0,
        }
    }

    /// Offset of the remapping (0.0 for pure clamps).
    pub fn offset(&self) -> f64 {
        match (self.min_in, self.min_out) {
            (Some(min_in), Some(min_out)) => min_out - min_in * self.scale(),
            _ => 0.0,
        }
    }

    /// True when the op scales or offsets in addition to clamping.
    pub fn scales(&self) -> bool {
        (self.scale() - 1.0).abs() > 1e-12 || self.offset().abs() > 1e-12
    }

    /// True when at least one output bound is present.
    pub fn is_clamping(&self) -> bool {
        self.min_out.is_some() || self.max_out.is_some()
    }

    /// Effective lower clamp bound.
    pub fn lower_bound(&self) -> f64 {
        self.min_out.unwrap_or(f64::NEG_INFINITY)
    }

    /// Effective upper clamp bound.
    pub fn upper_bound(&self) -> f64 {
        self.max_out.unwrap_or(f64::INFINITY)
    }

    /// A range with no bounds passes all values through untouched.
    pub fn is_identity(&self) -> bool {
        !self.is_clamping() && !self.scales()
    }

    /// A range has no hidden behavior beyond its bounds.
    pub fn is_no_op(&self) -> bool {
        self.is_identity()
    }

    /// True when applying `self` after `weaker` gives the same result as
    /// applying `self` alone (i.e. this op clamps to the same or a stricter
    /// domain). Only meaningful when `weaker` is a pure clamp.
    pub fn clamps_at_least_as_much_as(&self, weaker: &RangeOpData) -> bool {
        self.lower_bound() >= weaker.lower_bound() && self.upper_bound() <= weaker.upper_bound()
    }

    /// Swaps the in/out bounds.
    pub fn inverse(&self) -> RangeOpData {
        let mut out = RangeOpData::new(self.min_out, self.max_out, self.min_in, self.max_in);
        out.metadata = self.metadata.clone();
        out
    }

    /// True when `other` is exactly this op with in/out swapped.
    pub fn is_inverse(&self, other: &RangeOpData) -> bool {
        self.min_in == other.min_out
            && self.max_in == other.max_out
            && self.min_out == other.min_in
            && self.max_out == other.max_in
    }

    /// Applies the range to one RGB pixel. Alpha is never touched.
    #[inline]
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        let scale = self.scale() as f32;
        let offset = self.offset() as f32;
        let lower = self.lower_bound() as f32;
        let upper = self.upper_bound() as f32;

        if self.scales() {
            for c in rgb.iter_mut() {
                let v = *c * scale + offset;
                *c = clamp_nan(v, lower, upper);
            }
        } else if self.min_out.is_some() && self.max_out.is_some() {
            for c in rgb.iter_mut() {
                *c = clamp_nan(*c, lower, upper);
            }
        } else if self.min_out.is_some() {
            // NaN becomes the lower bound.
            for c in rgb.iter_mut() {
                *c = if c.is_nan() { lower } else { c.max(lower) };
            }
        } else if self.max_out.is_some() {
            for c in rgb.iter_mut() {
                *c = if c.is_nan() { upper } else { c.min(upper) };
            }
        }
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            format!(
                "{} Range minIn {} maxIn {} minOut {} maxOut {}",
                self.metadata.id(),
                fmt_bound(self.min_in),
                fmt_bound(self.max_in),
                fmt_bound(self.min_out),
                fmt_bound(self.max_out),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }
}

fn fmt_bound(bound: Option<f64>) -> String {
    match bound {
        Some(v) => fmt_f64(v),
        None => "none".to_string(),
    }
}

/// Clamps to [lower, upper], mapping NaN to the lower bound.
#[inline]
fn clamp_nan(v: f32, lower: f32, upper: f32) -> f32 {
    if v.is_nan() {
        lower
    } else if v < lower {
        lower
    } else if v > upper {
        upper
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_simple_clamp() {
        let range = RangeOpData::clamp(0.0, 1.0);

        let mut rgb = [1.5_f32, -0.2, 0.5];
        range.apply_rgb(&mut rgb);

        assert!((rgb[0] - 1.0).abs() < EPSILON);
        assert!((rgb[1] - 0.0).abs() < EPSILON);
        assert!((rgb[2] - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_clamp_min_only() {
        let range = RangeOpData::clamp_min(0.0);
        assert!(range.is_clamping());
        assert!(!range.scales());
        assert_eq!(range.upper_bound(), f64::INFINITY);

        let mut rgb = [1.5_f32, -0.2, 0.5];
        range.apply_rgb(&mut rgb);

        assert!((rgb[0] - 1.5).abs() < EPSILON); // unchanged
        assert!((rgb[1] - 0.0).abs() < EPSILON); // clamped
        assert!((rgb[2] - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_remap_with_clamp() {
        // Remap [0, 1] -> [0.1, 0.9], input outside range.
        let range = RangeOpData::new(Some(0.0), Some(1.0), Some(0.1), Some(0.9));
        assert!(range.scales());

        let mut rgb = [-0.5_f32, 1.5, 0.5];
        range.apply_rgb(&mut rgb);

        assert!((rgb[0] - 0.1).abs() < EPSILON);
        assert!((rgb[1] - 0.9).abs() < EPSILON);
        assert!((rgb[2] - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_nan_handling() {
        let range = RangeOpData::clamp(0.0, 1.0);

        let mut rgb = [f32::NAN, 0.5, f32::NAN];
        range.apply_rgb(&mut rgb);

        assert!((rgb[0] - 0.0).abs() < EPSILON);
        assert!((rgb[1] - 0.5).abs() < EPSILON);
        assert!((rgb[2] - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_symmetry() {
        let range = RangeOpData::new(Some(0.0), Some(1.0), Some(0.1), Some(0.9));
        let inv = range.inverse();

        assert!(range.is_inverse(&inv));
        assert!(inv.is_inverse(&range));
        assert_eq!(inv.min_in(), Some(0.1));
        assert_eq!(inv.max_out(), Some(1.0));
    }

    #[test]
    fn test_stricter_clamp_detection() {
        let weak = RangeOpData::clamp_min(-0.5);
        let strict = RangeOpData::clamp(0.0, 1.0);
        assert!(strict.clamps_at_least_as_much_as(&weak));
        assert!(!weak.clamps_at_least_as_much_as(&strict));
        // Equal domains count as "at least as much".
        assert!(weak.clamps_at_least_as_much_as(&weak));
    }

    #[test]
    fn test_validation() {
        let bad = RangeOpData::new(Some(0.0), None, None, None);
        assert!(matches!(bad.validate(), Err(OpError::Validation(_))));

        let bad = RangeOpData::new(Some(1.0), Some(1.0), Some(0.0), Some(1.0));
        assert!(matches!(bad.validate(), Err(OpError::Validation(_))));

        assert!(RangeOpData::clamp_min(0.0).validate().is_ok());
    }

    #[test]
    fn test_cache_id_distinguishes_bounds() {
        let a = RangeOpData::clamp_min(0.0);
        let b = RangeOpData::clamp_min(0.0);
        let c = RangeOpData::clamp_min(0.1);
        assert_eq!(a.finalize().unwrap(), b.finalize().unwrap());
        assert_ne!(a.finalize().unwrap(), c.finalize().unwrap());
    }
}

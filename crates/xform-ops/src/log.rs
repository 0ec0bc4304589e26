//! Logarithmic curve operation.
//!
//! Implements the affine log family:
//!
//! - Forward:  `out = logSlope * log_base(linSlope * in + linOffset) + logOffset`
//! - Inverse:  `out = (base^((in - logOffset) / logSlope) - linOffset) / linSlope`
//!
//! Each channel carries its own four parameters; a shared scalar base
//! completes the curve. Simple log2/log10 and their antilogs are the
//! special case of default parameters with base 2 or 10.

use std::sync::OnceLock;

use xform_core::{FormatMetadata, TransformDirection};

use crate::cacheid::fmt_f64;
use crate::error::{OpError, OpResult};
use crate::matrix::MatrixOpData;
use crate::op::Op;
use crate::range::RangeOpData;

const MIN_VALUE: f32 = f32::MIN_POSITIVE;

/// Per-channel log curve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogParams {
    /// Log side slope (k).
    pub log_side_slope: f64,
    /// Log side offset (kb).
    pub log_side_offset: f64,
    /// Linear side slope (m).
    pub lin_side_slope: f64,
    /// Linear side offset (b).
    pub lin_side_offset: f64,
}

impl Default for LogParams {
    fn default() -> Self {
        Self {
            log_side_slope: 1.0,
            log_side_offset: 0.0,
            lin_side_slope: 1.0,
            lin_side_offset: 0.0,
        }
    }
}

impl LogParams {
    /// Creates log params with explicit values.
    pub fn new(
        log_side_slope: f64,
        log_side_offset: f64,
        lin_side_slope: f64,
        lin_side_offset: f64,
    ) -> Self {
        Self {
            log_side_slope,
            log_side_offset,
            lin_side_slope,
            lin_side_offset,
        }
    }

    fn validate(&self, channel: &str) -> OpResult<()> {
        if self.lin_side_slope.abs() < 1e-12 {
            return Err(OpError::validation(format!(
                "log: invalid {channel} linear slope value '{}', linear slope cannot be 0",
                self.lin_side_slope
            )));
        }
        if self.log_side_slope.abs() < 1e-12 {
            return Err(OpError::validation(format!(
                "log: invalid {channel} log slope value '{}', log slope cannot be 0",
                self.log_side_slope
            )));
        }
        Ok(())
    }
}

/// Logarithmic curve operation.
#[derive(Debug, Clone)]
pub struct LogOpData {
    base: f64,
    red: LogParams,
    green: LogParams,
    blue: LogParams,
    direction: TransformDirection,
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
}

impl PartialEq for LogOpData {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.red == other.red
            && self.green == other.green
            && self.blue == other.blue
            && self.direction == other.direction
            && self.metadata.id() == other.metadata.id()
    }
}

impl LogOpData {
    /// Creates a log op with default parameters (a plain log/antilog of the
    /// given base).
    pub fn new(base: f64, direction: TransformDirection) -> Self {
        Self::with_params(base, LogParams::default(), direction)
    }

    /// Creates a log op with the same parameters on all three channels.
    pub fn with_params(base: f64, params: LogParams, direction: TransformDirection) -> Self {
        Self {
            base,
            red: params,
            green: params,
            blue: params,
            direction,
            metadata: FormatMetadata::new("Log"),
            cache_id: OnceLock::new(),
        }
    }

    /// Creates a log op with per-channel parameters.
    pub fn per_channel(
        direction: TransformDirection,
        base: f64,
        red: LogParams,
        green: LogParams,
        blue: LogParams,
    ) -> Self {
        Self {
            base,
            red,
            green,
            blue,
            direction,
            metadata: FormatMetadata::new("Log"),
            cache_id: OnceLock::new(),
        }
    }

    /// Log base.
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Red channel parameters.
    pub fn red_params(&self) -> &LogParams {
        &self.red
    }

    /// Green channel parameters.
    pub fn green_params(&self) -> &LogParams {
        &self.green
    }

    /// Blue channel parameters.
    pub fn blue_params(&self) -> &LogParams {
        &self.blue
    }

    /// Transform direction.
    pub fn direction(&self) -> TransformDirection {
        self.direction
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

    /// Sets the base. Call `validate()` again afterward.
    pub fn set_base(&mut self, base: f64) {
        self.base = base;
        self.cache_id = OnceLock::new();
    }

    /// Sets the direction. Call `validate()` again afterward.
    pub fn set_direction(&mut self, direction: TransformDirection) {
        self.direction = direction;
        self.cache_id = OnceLock::new();
    }

    /// Sets all three channels to the same parameters. Call `validate()`
    /// again afterward.
    pub fn set_params(&mut self, params: LogParams) {
        self.red = params;
        self.green = params;
        self.blue = params;
        self.cache_id = OnceLock::new();
    }

    /// Checks the log invariants.
    pub fn validate(&self) -> OpResult<()> {
        if self.direction == TransformDirection::Unknown {
            return Err(OpError::validation("log: invalid direction".to_string()));
        }
        self.red.validate("red")?;
        self.green.validate("green")?;
        self.blue.validate("blue")?;

        if self.base == 1.0 {
            return Err(OpError::validation(format!(
                "log: invalid base value '{}', base cannot be 1",
                self.base
            )));
        }
        if self.base <= 0.0 {
            return Err(OpError::validation(format!(
                "log: invalid base value '{}', base must be greater than 0",
                self.base
            )));
        }
        Ok(())
    }

    /// True when all three channels use the same parameters.
    ///
    /// Strict float comparison is fine here: the same operations are
    /// applied to all components, so values that start equal stay equal.
    pub fn all_components_equal(&self) -> bool {
        self.red == self.green && self.red == self.blue
    }

    /// True when this op is a plain log/antilog of the given base.
    pub fn is_log_base(&self, base: f64) -> bool {
        self.all_components_equal() && self.red == LogParams::default() && self.base == base
    }

    /// True when this op is a plain log2/antilog2.
    pub fn is_log2(&self) -> bool {
        self.is_log_base(2.0)
    }

    /// True when this op is a plain log10/antilog10.
    pub fn is_log10(&self) -> bool {
        self.is_log_base(10.0)
    }

    /// A log curve is never a numeric identity.
    pub fn is_identity(&self) -> bool {
        false
    }

    /// A log curve always clamps its linear side, so it is never a no-op.
    pub fn is_no_op(&self) -> bool {
        false
    }

    /// Each channel only reads its own input.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Returns the direction-flipped curve. Parameters are unchanged; the
    /// family is closed under direction flip, so this never fails.
    pub fn inverse(&self) -> LogOpData {
        let mut inv = self.clone();
        inv.direction = self.direction.inverse();
        inv.cache_id = OnceLock::new();
        inv
    }

    /// Conservative inverse detection.
    ///
    /// Only recognizes the case where both operations apply identical
    /// parameters on every channel. Mismatched per-channel parameters can
    /// be mathematically complementary, but recognizing them would
    /// complicate the identity replacement, so they are deliberately not
    /// treated as inverses.
    pub fn is_inverse(&self, other: &LogOpData) -> bool {
        self.direction.inverse() == other.direction
            && self.all_components_equal()
            && other.all_components_equal()
            && self.red == other.red
            && self.base == other.base
    }

    /// Minimal equivalent operation for an identity-configured curve.
    ///
    /// The forward curve rejects linear-side arguments at or below zero,
    /// so its replacement is a clamp at `-linOffset/linSlope`. The inverse
    /// curve covers the full domain and becomes a pass-through matrix.
    pub fn identity_replacement(&self) -> Op {
        let mut op = match self.direction {
            TransformDirection::Forward => {
                let min_value = -self.red.lin_side_offset / self.red.lin_side_slope;
                Op::Range(RangeOpData::clamp_min(min_value))
            }
            _ => Op::Matrix(MatrixOpData::identity()),
        };
        op.set_metadata(self.metadata.clone());
        op
    }

    /// Applies the curve to one RGB pixel, honoring the direction.
    #[inline]
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        match self.direction {
            TransformDirection::Inverse => self.apply_log_to_lin(rgb),
            _ => self.apply_lin_to_log(rgb),
        }
    }

    /// `out = logSlope * log_base(linSlope * in + linOffset) + logOffset`
    fn apply_lin_to_log(&self, rgb: &mut [f32; 3]) {
        let params = [&self.red, &self.green, &self.blue];
        let log2_base = (self.base as f32).log2();

        for (i, v) in rgb.iter_mut().enumerate() {
            let p = params[i];
            let m = p.lin_side_slope as f32;
            let b = p.lin_side_offset as f32;
            let k_log = p.log_side_slope as f32 / log2_base;
            let kb = p.log_side_offset as f32;

            let arg = (*v * m + b).max(MIN_VALUE);
            *v = arg.log2() * k_log + kb;
        }
    }

    /// `out = (base^((in - logOffset) / logSlope) - linOffset) / linSlope`
    fn apply_log_to_lin(&self, rgb: &mut [f32; 3]) {
        let params = [&self.red, &self.green, &self.blue];
        let log2_base = (self.base as f32).log2();

        for (i, v) in rgb.iter_mut().enumerate() {
            let p = params[i];
            let k_inv = log2_base / p.log_side_slope as f32;
            let kb = p.log_side_offset as f32;
            let b = p.lin_side_offset as f32;
            let m_inv = 1.0 / p.lin_side_slope as f32;

            *v = (2.0_f32.powf((*v - kb) * k_inv) - b) * m_inv;
        }
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            format!(
                "{} {} Log Base {} LogSlope {} LogOffset {} LinearSlope {} LinearOffset {}",
                self.metadata.id(),
                self.direction.as_str(),
                fmt_f64(self.base),
                self.param_string(|p| p.log_side_slope),
                self.param_string(|p| p.log_side_offset),
                self.param_string(|p| p.lin_side_slope),
                self.param_string(|p| p.lin_side_offset),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }

    /// Renders one parameter across channels: a single value when the
    /// channels agree, a triple otherwise.
    fn param_string(&self, get: impl Fn(&LogParams) -> f64) -> String {
        if self.all_components_equal() {
            fmt_f64(get(&self.red))
        } else {
            format!(
                "{}, {}, {}",
                fmt_f64(get(&self.red)),
                fmt_f64(get(&self.green)),
                fmt_f64(get(&self.blue))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::OpType;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_log10_known_values() {
        let op = LogOpData::new(10.0, TransformDirection::Forward);

        let mut rgb = [10.0_f32, 100.0, 1.0];
        op.apply_rgb(&mut rgb);
        assert!((rgb[0] - 1.0).abs() < EPSILON, "log10(10) should be 1, got {}", rgb[0]);
        assert!((rgb[1] - 2.0).abs() < EPSILON, "log10(100) should be 2, got {}", rgb[1]);
        assert!(rgb[2].abs() < EPSILON, "log10(1) should be 0, got {}", rgb[2]);
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        let params = LogParams::new(0.5, 0.1, 2.0, 0.05);
        let op = LogOpData::with_params(10.0, params, TransformDirection::Forward);
        let inv = op.inverse();

        for &v in &[0.01_f32, 0.1, 0.5, 1.0, 2.0] {
            let mut rgb = [v, v, v];
            op.apply_rgb(&mut rgb);
            inv.apply_rgb(&mut rgb);
            for c in rgb {
                let rel = (c - v).abs() / v.max(0.001);
                assert!(rel < 0.01, "roundtrip failed for {v}: got {c}");
            }
        }
    }

    #[test]
    fn test_negative_values_clamped() {
        let op = LogOpData::new(10.0, TransformDirection::Forward);
        let mut rgb = [-1.0_f32, -1.0, -1.0];
        op.apply_rgb(&mut rgb);
        for c in rgb {
            assert!(c.is_finite(), "log of negative should be finite (clamped)");
        }
    }

    #[test]
    fn test_validation_fails() {
        // Base 1 is rejected in both directions.
        for dir in [TransformDirection::Forward, TransformDirection::Inverse] {
            let op = LogOpData::new(1.0, dir);
            let err = op.validate().unwrap_err();
            assert!(err.to_string().contains("base cannot be 1"), "{err}");
        }

        let op = LogOpData::new(-2.0, TransformDirection::Forward);
        let err = op.validate().unwrap_err();
        assert!(err.to_string().contains("base must be greater than 0"), "{err}");

        let op = LogOpData::with_params(
            10.0,
            LogParams::new(1.0, 0.0, 0.0, 0.0),
            TransformDirection::Forward,
        );
        let err = op.validate().unwrap_err();
        assert!(err.to_string().contains("linear slope cannot be 0"), "{err}");

        let op = LogOpData::with_params(
            10.0,
            LogParams::new(0.0, 0.0, 1.0, 0.0),
            TransformDirection::Forward,
        );
        let err = op.validate().unwrap_err();
        assert!(err.to_string().contains("log slope cannot be 0"), "{err}");

        let op = LogOpData::new(10.0, TransformDirection::Unknown);
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_is_inverse_requires_equal_components() {
        let r = LogParams::new(1.5, 10.0, 1.1, 1.0);
        let g = LogParams::new(1.6, 20.0, 1.2, 2.0);
        let b = LogParams::new(1.7, 30.0, 1.3, 3.0);

        let per_channel = LogOpData::per_channel(TransformDirection::Forward, 10.0, r, g, b);
        let inv = per_channel.inverse();
        // Parameters survive inversion untouched.
        assert_eq!(per_channel.red_params(), inv.red_params());
        // Per-channel ops are not recognized as inverses.
        assert!(!per_channel.is_inverse(&inv));

        let uniform = LogOpData::with_params(10.0, r, TransformDirection::Forward);
        let inv = uniform.inverse();
        assert!(uniform.is_inverse(&inv));
        assert!(inv.is_inverse(&uniform));
    }

    #[test]
    fn test_identity_replacement() {
        // Forward base-2 log with default params clamps at 0, no upper bound.
        let op = LogOpData::new(2.0, TransformDirection::Forward);
        let rep = op.identity_replacement();
        assert_eq!(rep.op_type(), OpType::Range);
        if let Op::Range(range) = &rep {
            assert_eq!(range.lower_bound(), 0.0);
            assert_eq!(range.upper_bound(), f64::INFINITY);
        }

        // The inverse direction passes through and becomes a matrix.
        let op = LogOpData::new(2.0, TransformDirection::Inverse);
        assert_eq!(op.identity_replacement().op_type(), OpType::Matrix);

        // Non-trivial linear side moves the clamp to -linOffset/linSlope.
        let params = LogParams::new(1.5, 10.0, 2.0, 1.0);
        let op = LogOpData::with_params(2.0, params, TransformDirection::Forward);
        if let Op::Range(range) = op.identity_replacement() {
            assert_eq!(range.lower_bound(), -0.5);
        } else {
            panic!("expected a range replacement");
        }
    }

    #[test]
    fn test_cache_id_renders_per_channel_params() {
        let r = LogParams::new(1.5, 10.0, 1.1, 1.0);
        let g = LogParams::new(1.6, 20.0, 1.2, 2.0);
        let uniform = LogOpData::with_params(10.0, r, TransformDirection::Forward);
        let per_channel = LogOpData::per_channel(TransformDirection::Forward, 10.0, r, g, r);

        let a = uniform.finalize().unwrap().to_string();
        let b = per_channel.finalize().unwrap().to_string();
        assert_ne!(a, b);

        // Direction is part of the identity.
        let inv = uniform.inverse();
        assert_ne!(a, inv.finalize().unwrap());
    }
}

//! Gamma curve operation.
//!
//! Two curve families share this op:
//!
//! - **Basic**: a pure power law `out = in^gamma` that clamps negative
//!   inputs to zero. One parameter per channel.
//! - **Moncurve**: a power law blended with a linear segment near zero so
//!   the slope at the origin stays finite (the sRGB construction,
//!   generalized). Two parameters per channel: gamma and offset.
//!
//! Both come in forward and reverse flavors. Reverse applies the
//! algebraically inverted curve with the same stored parameters, which
//! keeps `inverse()` a pure style flip.

use std::sync::OnceLock;

use xform_core::FormatMetadata;

use crate::cacheid::fmt_params;
use crate::error::{OpError, OpResult};
use crate::matrix::MatrixOpData;
use crate::op::Op;
use crate::range::RangeOpData;

/// Per-channel gamma parameter list.
///
/// One value for basic styles, gamma + offset for moncurve styles. The
/// length is validated at run time because it depends on the style.
pub type GammaParams = Vec<f64>;

const IDENTITY_SCALE: f64 = 1.0;
const IDENTITY_OFFSET: f64 = 0.0;

/// Gamma curve style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GammaStyle {
    /// Power law, clamping negatives: `out = max(in, 0)^gamma`.
    BasicForward,
    /// Inverted power law: `out = max(in, 0)^(1/gamma)`.
    BasicReverse,
    /// Linear segment near zero blended with a power law.
    MoncurveForward,
    /// Inverse of the moncurve forward curve.
    MoncurveReverse,
}

impl GammaStyle {
    /// Stable name used in cache identities and file formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BasicForward => "basicFwd",
            Self::BasicReverse => "basicRev",
            Self::MoncurveForward => "moncurveFwd",
            Self::MoncurveReverse => "moncurveRev",
        }
    }

    /// Parses a style name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basicfwd" => Some(Self::BasicForward),
            "basicrev" => Some(Self::BasicReverse),
            "moncurvefwd" => Some(Self::MoncurveForward),
            "moncurverev" => Some(Self::MoncurveReverse),
            _ => None,
        }
    }

    /// True for the basic (clamping power-law) styles.
    pub fn is_basic(self) -> bool {
        matches!(self, Self::BasicForward | Self::BasicReverse)
    }

    /// The algebraic counterpart of this style.
    pub fn inverse(self) -> Self {
        match self {
            Self::BasicForward => Self::BasicReverse,
            Self::BasicReverse => Self::BasicForward,
            Self::MoncurveForward => Self::MoncurveReverse,
            Self::MoncurveReverse => Self::MoncurveForward,
        }
    }
}

/// Gamma curve operation with per-channel parameters.
#[derive(Debug, Clone)]
pub struct GammaOpData {
    style: GammaStyle,
    red: GammaParams,
    green: GammaParams,
    blue: GammaParams,
    alpha: GammaParams,
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
}

impl PartialEq for GammaOpData {
    fn eq(&self, other: &Self) -> bool {
        self.style == other.style
            && self.red == other.red
            && self.green == other.green
            && self.blue == other.blue
            && self.alpha == other.alpha
            && self.metadata.id() == other.metadata.id()
    }
}

impl Default for GammaOpData {
    fn default() -> Self {
        let style = GammaStyle::BasicForward;
        let id = Self::identity_parameters(style);
        Self::new(style, id.clone(), id.clone(), id.clone(), id)
    }
}

impl GammaOpData {
    /// Creates a gamma op with explicit per-channel parameters.
    pub fn new(
        style: GammaStyle,
        red: GammaParams,
        green: GammaParams,
        blue: GammaParams,
        alpha: GammaParams,
    ) -> Self {
        Self {
            style,
            red,
            green,
            blue,
            alpha,
            metadata: FormatMetadata::new("Gamma"),
            cache_id: OnceLock::new(),
        }
    }

    /// Creates a gamma op applying the same parameters to R, G and B with
    /// an identity alpha.
    pub fn uniform(style: GammaStyle, params: GammaParams) -> Self {
        let alpha = Self::identity_parameters(style);
        Self::new(style, params.clone(), params.clone(), params, alpha)
    }

    /// Identity parameter vector for a style.
    pub fn identity_parameters(style: GammaStyle) -> GammaParams {
        if style.is_basic() {
            vec![IDENTITY_SCALE]
        } else {
            vec![IDENTITY_SCALE, IDENTITY_OFFSET]
        }
    }

    /// Whether a parameter vector is the identity for a style.
    pub fn is_identity_parameters(params: &[f64], style: GammaStyle) -> bool {
        if style.is_basic() {
            params.len() == 1 && params[0] == IDENTITY_SCALE
        } else {
            params.len() == 2 && params[0] == IDENTITY_SCALE && params[1] == IDENTITY_OFFSET
        }
    }

    /// Curve style.
    pub fn style(&self) -> GammaStyle {
        self.style
    }

    /// Red channel parameters.
    pub fn red_params(&self) -> &GammaParams {
        &self.red
    }

    /// Green channel parameters.
    pub fn green_params(&self) -> &GammaParams {
        &self.green
    }

    /// Blue channel parameters.
    pub fn blue_params(&self) -> &GammaParams {
        &self.blue
    }

    /// Alpha channel parameters.
    pub fn alpha_params(&self) -> &GammaParams {
        &self.alpha
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

    /// Sets the style. Call `validate()` again afterward.
    pub fn set_style(&mut self, style: GammaStyle) {
        self.style = style;
        self.cache_id = OnceLock::new();
    }

    /// Sets the red parameters. Call `validate()` again afterward.
    pub fn set_red_params(&mut self, params: GammaParams) {
        self.red = params;
        self.cache_id = OnceLock::new();
    }

    /// Sets the green parameters. Call `validate()` again afterward.
    pub fn set_green_params(&mut self, params: GammaParams) {
        self.green = params;
        self.cache_id = OnceLock::new();
    }

    /// Sets the blue parameters. Call `validate()` again afterward.
    pub fn set_blue_params(&mut self, params: GammaParams) {
        self.blue = params;
        self.cache_id = OnceLock::new();
    }

    /// Sets the alpha parameters. Call `validate()` again afterward.
    pub fn set_alpha_params(&mut self, params: GammaParams) {
        self.alpha = params;
        self.cache_id = OnceLock::new();
    }

    /// Sets R, G and B to the same parameters and resets alpha to the
    /// identity. Call `validate()` again afterward.
    pub fn set_params(&mut self, params: GammaParams) {
        self.red = params.clone();
        self.green = params.clone();
        self.blue = params;
        self.alpha = Self::identity_parameters(self.style);
        self.cache_id = OnceLock::new();
    }

    /// Checks parameter counts and bounds for the current style.
    pub fn validate(&self) -> OpResult<()> {
        let (count, low, high): (usize, &[f64], &[f64]) = if self.style.is_basic() {
            (1, &[0.01], &[100.0])
        } else {
            (2, &[1.0, 0.0], &[10.0, 0.9])
        };

        for params in [&self.red, &self.green, &self.blue, &self.alpha] {
            if params.len() != count {
                return Err(OpError::validation(
                    "gamma: wrong number of parameters".to_string(),
                ));
            }
            for (i, p) in params.iter().enumerate() {
                if *p < low[i] {
                    return Err(OpError::validation(format!(
                        "gamma: parameter {p} is less than lower bound {}",
                        low[i]
                    )));
                }
                if *p > high[i] {
                    return Err(OpError::validation(format!(
                        "gamma: parameter {p} is greater than upper bound {}",
                        high[i]
                    )));
                }
            }
        }
        Ok(())
    }

    /// True when all four channels use the same parameters.
    pub fn are_all_components_equal(&self) -> bool {
        self.red == self.green && self.red == self.blue && self.red == self.alpha
    }

    /// True when the alpha channel parameters are the identity.
    pub fn is_alpha_component_identity(&self) -> bool {
        Self::is_identity_parameters(&self.alpha, self.style)
    }

    /// True when R == G == B and alpha is the identity.
    pub fn is_non_channel_dependent(&self) -> bool {
        self.red == self.green && self.red == self.blue && self.is_alpha_component_identity()
    }

    /// True when every channel carries the style's identity parameters.
    pub fn is_identity(&self) -> bool {
        self.are_all_components_equal() && Self::is_identity_parameters(&self.red, self.style)
    }

    /// Basic styles clamp negatives even at identity parameters.
    pub fn is_clamping(&self) -> bool {
        self.style.is_basic()
    }

    /// Identity and no clamping.
    pub fn is_no_op(&self) -> bool {
        self.is_identity() && !self.is_clamping()
    }

    /// Each channel only reads its own input.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Returns the curve with its style flipped to the algebraic
    /// counterpart. Parameters are unchanged; never fails.
    pub fn inverse(&self) -> GammaOpData {
        let mut inv = self.clone();
        inv.style = self.style.inverse();
        inv.cache_id = OnceLock::new();
        inv
    }

    /// Conservative inverse detection: exact opposite style and identical
    /// parameters on all four channels.
    ///
    /// Two BasicForward curves with gamma 1 are mutually self-inverse but
    /// are not detected here; stored basic gammas are kept >= 1 by
    /// convention, and this check follows that convention.
    pub fn is_inverse(&self, other: &GammaOpData) -> bool {
        self.style.inverse() == other.style
            && self.red == other.red
            && self.green == other.green
            && self.blue == other.blue
            && self.alpha == other.alpha
    }

    /// Whether `compose` is defined for this pair.
    ///
    /// Both operations must be basic-style and non-channel-dependent
    /// (R == G == B with identity alpha). Everything else - moncurve
    /// styles, per-channel parameters, a live alpha - is rejected.
    pub fn may_compose(&self, other: &GammaOpData) -> bool {
        self.is_non_channel_dependent()
            && other.is_non_channel_dependent()
            && self.style.is_basic()
            && other.style.is_basic()
    }

    /// Composes two basic gamma curves into one.
    ///
    /// Each exponent counts as its reciprocal when the style is reverse;
    /// the product is re-expressed as BasicReverse when it drops below 1
    /// so stored values stay >= 1, and values within 1e-6 of 1 snap to
    /// exactly 1 so near-identities do not accumulate float noise.
    pub fn compose(&self, other: &GammaOpData) -> OpResult<GammaOpData> {
        if !self.may_compose(other) {
            return Err(OpError::composition(
                "gamma op can only be composed with a compatible basic gamma op".to_string(),
            ));
        }

        let mut g1 = self.red[0];
        if self.style == GammaStyle::BasicReverse {
            g1 = 1.0 / g1;
        }
        let mut g2 = other.red[0];
        if other.style == GammaStyle::BasicReverse {
            g2 = 1.0 / g2;
        }

        let mut g_out = g1 * g2;
        let mut style = GammaStyle::BasicForward;
        if g_out < 1.0 {
            g_out = 1.0 / g_out;
            style = GammaStyle::BasicReverse;
        }

        // E.g. (1/0.45) * 0.45 must come out exactly 1.
        if (g_out - 1.0).abs() < 1e-6 {
            g_out = 1.0;
        }

        let mut out = GammaOpData::uniform(style, vec![g_out]);
        out.metadata = self.metadata.clone();
        out.metadata.combine(&other.metadata);
        Ok(out)
    }

    /// Minimal equivalent operation for an identity-configured curve.
    ///
    /// Basic styles still clamp below zero and become a lower-bound range;
    /// moncurve styles pass the full domain through and become a matrix.
    pub fn identity_replacement(&self) -> Op {
        let mut op = if self.style.is_basic() {
            Op::Range(RangeOpData::clamp_min(0.0))
        } else {
            Op::Matrix(MatrixOpData::identity())
        };
        op.set_metadata(self.metadata.clone());
        op
    }

    /// Applies the curve to one RGBA pixel.
    #[inline]
    pub fn apply_rgba(&self, rgba: &mut [f32; 4]) {
        let params = [&self.red, &self.green, &self.blue, &self.alpha];
        match self.style {
            GammaStyle::BasicForward => {
                for (v, p) in rgba.iter_mut().zip(params) {
                    *v = v.max(0.0).powf(p[0] as f32);
                }
            }
            GammaStyle::BasicReverse => {
                for (v, p) in rgba.iter_mut().zip(params) {
                    *v = v.max(0.0).powf(1.0 / p[0] as f32);
                }
            }
            GammaStyle::MoncurveForward => {
                for (v, p) in rgba.iter_mut().zip(params) {
                    *v = moncurve_fwd(*v, p[0], p[1]);
                }
            }
            GammaStyle::MoncurveReverse => {
                for (v, p) in rgba.iter_mut().zip(params) {
                    *v = moncurve_rev(*v, p[0], p[1]);
                }
            }
        }
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            format!(
                "{} {} r:{} g:{} b:{} a:{}",
                self.metadata.id(),
                self.style.as_str(),
                fmt_params(&self.red),
                fmt_params(&self.green),
                fmt_params(&self.blue),
                fmt_params(&self.alpha),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }
}

/// Linear/power break point and linear slope of the moncurve construction.
///
/// The break point `offset / (gamma - 1)` is where the tangent of the
/// power segment passes through the origin, which makes the piecewise
/// curve C1-continuous.
fn moncurve_break(gamma: f64, offset: f64) -> (f64, f64) {
    if gamma == 1.0 {
        // Degenerate curve: the whole domain is the linear segment.
        return (f64::INFINITY, 1.0 / (1.0 + offset));
    }
    let break_pnt = offset / (gamma - 1.0);
    let slope = gamma / (1.0 + offset)
        * ((offset * gamma) / ((gamma - 1.0) * (1.0 + offset))).powf(gamma - 1.0);
    (break_pnt, slope)
}

#[inline]
fn moncurve_fwd(x: f32, gamma: f64, offset: f64) -> f32 {
    let (break_pnt, slope) = moncurve_break(gamma, offset);
    let xf = x as f64;
    let y = if xf <= break_pnt {
        xf * slope
    } else {
        ((xf + offset) / (1.0 + offset)).powf(gamma)
    };
    y as f32
}

#[inline]
fn moncurve_rev(y: f32, gamma: f64, offset: f64) -> f32 {
    let (break_pnt, slope) = moncurve_break(gamma, offset);
    let yf = y as f64;
    let y_break = if break_pnt.is_finite() {
        break_pnt * slope
    } else {
        f64::INFINITY
    };
    let x = if yf <= y_break {
        // A zero offset degenerates the linear segment to a point at 0.
        if slope > 0.0 { yf / slope } else { 0.0 }
    } else {
        (1.0 + offset) * yf.powf(1.0 / gamma) - offset
    };
    x as f32
}

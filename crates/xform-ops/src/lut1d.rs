//! 1-D lookup table operation.
//!
//! A 1-D LUT applies an independent transfer curve to each color channel
//! (or one shared curve when a single component is stored). Samples are
//! kept in one flattened, interleaved buffer
//! `[r0,g0,b0, r1,g1,b1, ...]` like the process lists that produce them.
//!
//! # Domain encodings
//!
//! A standard table maps `[0, 1]` linearly onto its indices. A half-domain
//! table instead has one entry per 16-bit half-float code, so the full
//! float range (positive and negative) is covered without clamping.
//!
//! # Inversion
//!
//! Applying a LUT in the inverse direction means solving `lut(x) = y` for
//! x. The table is only invertible over its active span - the index range
//! where consecutive samples actually differ - which is tracked per
//! channel in [`ComponentProperties`]. The solver brackets the target with
//! a binary search over a monotonized copy of the span, interpolates the
//! bracket, and extrapolates flat outside the span. The result is an
//! approximation by construction; [`Lut1DOpData::make_fast_lut1d_from_inverse`]
//! tabulates it once so renderers avoid per-pixel root finding.

use std::sync::OnceLock;

use xform_core::halfs;
use xform_core::{BitDepth, FormatMetadata, Interpolation, TransformDirection};

use crate::cacheid::hash_samples;
use crate::error::{OpError, OpResult};
use crate::matrix::MatrixOpData;
use crate::op::Op;
use crate::range::RangeOpData;

/// Minimum sample count when composing with [`ComposeMethod::ResampleBig`].
pub const COMPOSE_RESAMPLE_BIG_SIZE: usize = 65536;

/// Sample count of a standard-domain fast inverse LUT.
const FAST_LUT_SIZE: usize = 65536;

/// Index and value encoding of a 1-D LUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HalfFlags {
    /// Indices and values use standard encoding.
    #[default]
    Standard,
    /// Indices are half-float codes.
    InputHalf,
    /// Values are half-float codes.
    OutputHalf,
    /// Indices and values are half-float codes.
    InputOutputHalf,
}

impl HalfFlags {
    /// Builds flags from the two independent properties.
    pub fn new(input_half: bool, output_half: bool) -> Self {
        match (input_half, output_half) {
            (false, false) => Self::Standard,
            (true, false) => Self::InputHalf,
            (false, true) => Self::OutputHalf,
            (true, true) => Self::InputOutputHalf,
        }
    }

    /// Whether indices are half-float codes.
    pub fn is_input_half(self) -> bool {
        matches!(self, Self::InputHalf | Self::InputOutputHalf)
    }

    /// Whether values are half-float codes.
    pub fn is_output_half(self) -> bool {
        matches!(self, Self::OutputHalf | Self::InputOutputHalf)
    }

    /// Stable name used in cache identities.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::InputHalf => "inHalf",
            Self::OutputHalf => "outHalf",
            Self::InputOutputHalf => "inOutHalf",
        }
    }
}

/// Requested quality of LUT inversion at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutInversionQuality {
    /// Use the implementation default.
    #[default]
    Default,
    /// Per-pixel root finding over the active span.
    Exact,
    /// Tabulated approximation built by `make_fast_lut1d_from_inverse`.
    Fast,
    /// Best available quality.
    Best,
}

impl LutInversionQuality {
    /// Resolves `Default`/`Best` to a concrete quality.
    pub fn concrete(self) -> Self {
        match self {
            Self::Default | Self::Fast => Self::Fast,
            Self::Exact | Self::Best => Self::Exact,
        }
    }

    /// Stable name used in cache identities.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Exact => "exact",
            Self::Fast => "fast",
            Self::Best => "best",
        }
    }
}

/// Hue adjustment mode.
///
/// The ratio-preserving mode keeps the relative position of the middle
/// channel between the min and max channels, which prevents per-channel
/// curves from shifting hues. It makes the op channel-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HueAdjust {
    /// Plain per-channel application.
    #[default]
    None,
    /// Ratio-preserving hue adjustment.
    Dw3,
}

impl HueAdjust {
    /// Stable name used in cache identities.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dw3 => "dw3",
        }
    }
}

/// Controls resampling during 1-D LUT composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMethod {
    /// Preserve the first LUT's domain.
    ResampleNo,
    /// Resample onto at least [`COMPOSE_RESAMPLE_BIG_SIZE`] entries.
    ResampleBig,
}

/// Per-channel inversion properties.
///
/// `start_domain` is the lowest index such that `lut[start] != lut[start+1]`;
/// `end_domain` is the highest index such that `lut[end-1] != lut[end]`.
/// The `neg_*` fields track the same span over the negative half-domain
/// code range and stay zero for standard tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentProperties {
    /// Overall direction over the active span.
    pub is_increasing: bool,
    /// First index of the active span.
    pub start_domain: usize,
    /// Last index of the active span.
    pub end_domain: usize,
    /// First index of the negative half-domain active span.
    pub neg_start_domain: usize,
    /// Last index of the negative half-domain active span.
    pub neg_end_domain: usize,
    /// Direction over the negative half-domain span.
    pub neg_is_increasing: bool,
}

/// Monotonized copy of one channel's active span, ready for bracketed
/// inverse lookups.
#[derive(Debug, Clone)]
struct ChannelSpan {
    start: usize,
    end: usize,
    increasing: bool,
    values: Vec<f32>,
}

impl ChannelSpan {
    fn build(lut: &Lut1DOpData, ch: usize, start: usize, end: usize, increasing: bool) -> Self {
        let mut values: Vec<f32> = (start..=end).map(|i| lut.value(i, ch)).collect();
        // Force monotonicity so the bracket search is well defined even on
        // tables with small local reversals.
        for i in 1..values.len() {
            if increasing {
                values[i] = values[i].max(values[i - 1]);
            } else {
                values[i] = values[i].min(values[i - 1]);
            }
        }
        Self {
            start,
            end,
            increasing,
            values,
        }
    }

    fn is_flat(&self) -> bool {
        self.start >= self.end
    }

    /// Lowest and highest output value covered by the span.
    fn value_range(&self) -> (f32, f32) {
        let first = self.values[0];
        let last = self.values[self.values.len() - 1];
        if self.increasing { (first, last) } else { (last, first) }
    }

    /// Fractional table index whose sample equals `target`, with flat
    /// extrapolation to the span boundaries.
    fn lookup(&self, target: f32) -> f32 {
        if self.is_flat() {
            return self.start as f32;
        }
        let n = self.values.len();
        if self.increasing {
            if target.is_nan() || target <= self.values[0] {
                return self.start as f32;
            }
            if target >= self.values[n - 1] {
                return self.end as f32;
            }
            let k = self.values.partition_point(|v| *v < target);
            let lo = self.values[k - 1];
            let hi = self.values[k];
            let frac = if hi > lo { (target - lo) / (hi - lo) } else { 0.0 };
            (self.start + k - 1) as f32 + frac
        } else {
            if target.is_nan() || target >= self.values[0] {
                return self.start as f32;
            }
            if target <= self.values[n - 1] {
                return self.end as f32;
            }
            let k = self.values.partition_point(|v| *v > target);
            let lo = self.values[k - 1];
            let hi = self.values[k];
            let frac = if lo > hi { (lo - target) / (lo - hi) } else { 0.0 };
            (self.start + k - 1) as f32 + frac
        }
    }
}

/// Per-channel inverse lookup state.
#[derive(Debug, Clone)]
struct InverseLookup {
    pos: ChannelSpan,
    neg: Option<ChannelSpan>,
}

/// 1-D lookup table operation.
#[derive(Debug, Clone)]
pub struct Lut1DOpData {
    array: Vec<f32>,
    components: usize,
    half_flags: HalfFlags,
    interpolation: Interpolation,
    inversion_quality: LutInversionQuality,
    hue_adjust: HueAdjust,
    direction: TransformDirection,
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
    props: OnceLock<[ComponentProperties; 3]>,
    inverse_lookup: OnceLock<[InverseLookup; 3]>,
}

impl PartialEq for Lut1DOpData {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
            && self.components == other.components
            && self.half_flags == other.half_flags
            && self.interpolation == other.interpolation
            && self.inversion_quality == other.inversion_quality
            && self.hue_adjust == other.hue_adjust
            && self.direction == other.direction
            && self.metadata.id() == other.metadata.id()
    }
}

/// Float value of a half code with non-finite codes pinned to usable
/// numbers: infinities saturate to the largest finite half, NaNs go to 0.
fn half_code_value(code: u16) -> f32 {
    if halfs::is_finite_code(code) {
        halfs::code_to_f32(code)
    } else if code == 0x7C00 {
        65504.0
    } else if code == 0xFC00 {
        -65504.0
    } else {
        0.0
    }
}

impl Lut1DOpData {
    /// Creates a standard-domain identity LUT with three components.
    pub fn identity(dimension: usize) -> Self {
        let mut array = Vec::with_capacity(dimension * 3);
        for i in 0..dimension {
            let v = i as f32 / (dimension - 1) as f32;
            array.extend_from_slice(&[v, v, v]);
        }
        Self::with_array(array, 3, HalfFlags::Standard)
    }

    /// Creates a half-domain identity LUT (one entry per half code).
    pub fn half_domain_identity() -> Self {
        let mut array = Vec::with_capacity(halfs::HALF_DOMAIN_DIMENSION * 3);
        for code in 0..halfs::HALF_DOMAIN_DIMENSION {
            let v = half_code_value(code as u16);
            array.extend_from_slice(&[v, v, v]);
        }
        Self::with_array(array, 3, HalfFlags::InputHalf)
    }

    /// Creates a LUT from raw interleaved samples.
    pub fn from_data(array: Vec<f32>, components: usize) -> Self {
        Self::with_array(array, components, HalfFlags::Standard)
    }

    fn with_array(array: Vec<f32>, components: usize, half_flags: HalfFlags) -> Self {
        Self {
            array,
            components,
            half_flags,
            interpolation: Interpolation::Linear,
            inversion_quality: LutInversionQuality::Default,
            hue_adjust: HueAdjust::None,
            direction: TransformDirection::Forward,
            metadata: FormatMetadata::new("Lut1D"),
            cache_id: OnceLock::new(),
            props: OnceLock::new(),
            inverse_lookup: OnceLock::new(),
        }
    }

    /// Number of entries per channel.
    pub fn dimension(&self) -> usize {
        self.array.len() / self.components
    }

    /// Number of stored color components (1 or 3).
    pub fn components(&self) -> usize {
        self.components
    }

    /// True when one curve is shared by all three channels.
    pub fn has_single_lut(&self) -> bool {
        self.components == 1
    }

    /// Raw interleaved samples.
    pub fn array(&self) -> &[f32] {
        &self.array
    }

    /// Mutable sample access. Clears the cache identity and the derived
    /// inversion state; call `validate()` again afterward.
    pub fn array_mut(&mut self) -> &mut Vec<f32> {
        self.clear_caches();
        &mut self.array
    }

    /// Domain/value encoding flags.
    pub fn half_flags(&self) -> HalfFlags {
        self.half_flags
    }

    /// Whether indices are half-float codes.
    pub fn is_input_half_domain(&self) -> bool {
        self.half_flags.is_input_half()
    }

    /// Whether values are raw half-float codes.
    pub fn is_output_raw_halfs(&self) -> bool {
        self.half_flags.is_output_half()
    }

    /// Sets the input-half-domain property. Used by file readers while
    /// building the op; call `validate()` again afterward.
    pub fn set_input_half_domain(&mut self, input_half: bool) {
        self.half_flags = HalfFlags::new(input_half, self.half_flags.is_output_half());
        self.clear_caches();
    }

    /// Sets the raw-halfs output property. Used by file readers while
    /// building the op; call `validate()` again afterward.
    pub fn set_output_raw_halfs(&mut self, output_half: bool) {
        self.half_flags = HalfFlags::new(self.half_flags.is_input_half(), output_half);
        self.clear_caches();
    }

    /// Interpolation used between samples.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Sets the interpolation.
    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
        self.cache_id = OnceLock::new();
    }

    /// Requested inversion quality.
    pub fn inversion_quality(&self) -> LutInversionQuality {
        self.inversion_quality
    }

    /// Sets the inversion quality.
    pub fn set_inversion_quality(&mut self, quality: LutInversionQuality) {
        self.inversion_quality = quality;
        self.cache_id = OnceLock::new();
    }

    /// Hue adjustment mode.
    pub fn hue_adjust(&self) -> HueAdjust {
        self.hue_adjust
    }

    /// Sets the hue adjustment mode.
    pub fn set_hue_adjust(&mut self, hue_adjust: HueAdjust) {
        self.hue_adjust = hue_adjust;
        self.cache_id = OnceLock::new();
    }

    /// Transform direction.
    pub fn direction(&self) -> TransformDirection {
        self.direction
    }

    /// Sets the direction. Call `validate()` again afterward.
    pub fn set_direction(&mut self, direction: TransformDirection) {
        self.direction = direction;
        self.cache_id = OnceLock::new();
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

    fn clear_caches(&mut self) {
        self.cache_id = OnceLock::new();
        self.props = OnceLock::new();
        self.inverse_lookup = OnceLock::new();
    }

    /// Checks the LUT invariants.
    pub fn validate(&self) -> OpResult<()> {
        if self.direction == TransformDirection::Unknown {
            return Err(OpError::validation("LUT 1D: invalid direction".to_string()));
        }
        if self.components != 1 && self.components != 3 {
            return Err(OpError::validation(format!(
                "LUT 1D: invalid number of color components '{}'",
                self.components
            )));
        }
        if self.array.is_empty() || self.array.len() % self.components != 0 {
            return Err(OpError::validation(format!(
                "LUT 1D: array length '{}' does not match {} components",
                self.array.len(),
                self.components
            )));
        }
        let dimension = self.dimension();
        if dimension < 2 {
            return Err(OpError::validation(format!(
                "LUT 1D: invalid dimension '{dimension}', must be at least 2"
            )));
        }
        if self.half_flags.is_input_half() && dimension != halfs::HALF_DOMAIN_DIMENSION {
            return Err(OpError::validation(format!(
                "LUT 1D: half-domain LUT must have {} entries, found '{dimension}'",
                halfs::HALF_DOMAIN_DIMENSION
            )));
        }
        for v in &self.array {
            if !v.is_finite() {
                return Err(OpError::validation(format!(
                    "LUT 1D: sample '{v}' is not finite"
                )));
            }
        }
        Ok(())
    }

    /// Decoded sample at index `i` for channel `ch`.
    #[inline]
    pub fn value(&self, i: usize, ch: usize) -> f32 {
        let c = ch.min(self.components - 1);
        let raw = self.array[i * self.components + c];
        if self.half_flags.is_output_half() {
            half_code_value(raw as u16)
        } else {
            raw
        }
    }

    /// True when the table reproduces its domain exactly.
    ///
    /// Compared bit-for-bit against the generated identity fill; tables
    /// loaded from files that merely approximate an identity are
    /// conservatively treated as non-identity.
    pub fn is_identity(&self) -> bool {
        let dimension = self.dimension();
        for i in 0..dimension {
            let expected = if self.half_flags.is_input_half() {
                half_code_value(i as u16)
            } else {
                i as f32 / (dimension - 1) as f32
            };
            for ch in 0..self.components {
                if self.value(i, ch) != expected {
                    return false;
                }
            }
        }
        true
    }

    /// A standard-domain identity still clamps inputs to [0, 1]; only the
    /// half-domain identity covers the full float range and is a no-op.
    pub fn is_no_op(&self) -> bool {
        self.half_flags.is_input_half() && self.is_identity()
    }

    /// Hue adjustment mixes channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        self.hue_adjust != HueAdjust::None
    }

    /// Whether the table is dense enough for the given input precision to
    /// be read by direct indexing rather than interpolation.
    pub fn may_lookup(&self, incoming: BitDepth) -> bool {
        self.half_flags.is_input_half() || Some(self.dimension()) == incoming.ideal_lut_size()
    }

    /// Minimal equivalent operation for an identity table.
    ///
    /// The standard domain clamps to [0, 1] and becomes a range; the
    /// half domain covers everything and becomes a pass-through matrix.
    pub fn identity_replacement(&self) -> Op {
        let mut op = if self.half_flags.is_input_half() {
            Op::Matrix(MatrixOpData::identity())
        } else {
            Op::Range(RangeOpData::clamp(0.0, 1.0))
        };
        op.set_metadata(self.metadata.clone());
        op
    }

    // ========================================================================
    // Component properties & inversion state
    // ========================================================================

    /// Derives the per-channel inversion properties from the sample array.
    pub fn component_properties(&self) -> &[ComponentProperties; 3] {
        self.props.get_or_init(|| {
            let mut out = [ComponentProperties::default(); 3];
            for (ch, props) in out.iter_mut().enumerate() {
                *props = self.scan_channel(ch);
            }
            out
        })
    }

    fn scan_channel(&self, ch: usize) -> ComponentProperties {
        if self.half_flags.is_input_half() {
            let (start, end) = self.scan_span(ch, 0, halfs::MAX_POS_FINITE_CODE as usize);
            let (neg_start, neg_end) = self.scan_span(
                ch,
                halfs::NEG_CODE_START as usize,
                halfs::MAX_NEG_FINITE_CODE as usize,
            );
            ComponentProperties {
                is_increasing: self.value(end, ch) > self.value(start, ch),
                start_domain: start,
                end_domain: end,
                neg_start_domain: neg_start,
                neg_end_domain: neg_end,
                neg_is_increasing: self.value(neg_end, ch) > self.value(neg_start, ch),
            }
        } else {
            let (start, end) = self.scan_span(ch, 0, self.dimension() - 1);
            ComponentProperties {
                is_increasing: self.value(end, ch) > self.value(start, ch),
                start_domain: start,
                end_domain: end,
                ..Default::default()
            }
        }
    }

    /// First and last index in `[lo, hi]` across which consecutive samples
    /// differ. Returns `(lo, lo)` for a flat segment.
    fn scan_span(&self, ch: usize, lo: usize, hi: usize) -> (usize, usize) {
        let mut start = None;
        let mut end = None;
        for i in lo..hi {
            if self.value(i, ch) != self.value(i + 1, ch) {
                if start.is_none() {
                    start = Some(i);
                }
                end = Some(i + 1);
            }
        }
        match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => (lo, lo),
        }
    }

    fn inverse_lookups(&self) -> &[InverseLookup; 3] {
        self.inverse_lookup.get_or_init(|| {
            let props = self.component_properties();
            std::array::from_fn(|ch| {
                let p = &props[ch];
                let pos =
                    ChannelSpan::build(self, ch, p.start_domain, p.end_domain, p.is_increasing);
                let neg = if self.half_flags.is_input_half() {
                    Some(ChannelSpan::build(
                        self,
                        ch,
                        p.neg_start_domain,
                        p.neg_end_domain,
                        p.neg_is_increasing,
                    ))
                } else {
                    None
                };
                InverseLookup { pos, neg }
            })
        })
    }

    /// Domain value whose table sample best matches `target` on `ch`.
    fn eval_channel_inverse(&self, ch: usize, target: f32) -> f32 {
        let lookup = &self.inverse_lookups()[ch.min(self.components - 1)];

        if self.half_flags.is_input_half() {
            // Pick the span whose value range covers the target; default to
            // the positive span with flat extrapolation.
            let span = match &lookup.neg {
                Some(neg) if !neg.is_flat() => {
                    let (lo, hi) = neg.value_range();
                    let (plo, phi) = lookup.pos.value_range();
                    let in_neg = target >= lo && target <= hi;
                    let in_pos = !lookup.pos.is_flat() && target >= plo && target <= phi;
                    if in_neg && !in_pos { neg } else { &lookup.pos }
                }
                _ => &lookup.pos,
            };
            let idx = span.lookup(target);
            let i0 = idx.floor() as usize;
            let frac = idx - i0 as f32;
            let x0 = half_code_value(i0 as u16);
            if frac > 0.0 {
                let x1 = half_code_value((i0 + 1) as u16);
                x0 + (x1 - x0) * frac
            } else {
                x0
            }
        } else {
            let idx = lookup.pos.lookup(target);
            idx / (self.dimension() - 1) as f32
        }
    }

    /// Interpolated forward read of `ch` at domain position `x`.
    fn eval_channel_forward(&self, ch: usize, x: f32) -> f32 {
        if self.half_flags.is_input_half() {
            // Dense enough for a direct lookup.
            let code = halfs::f32_to_code(x);
            return self.value(code as usize, ch);
        }
        if x.is_nan() {
            return self.value(0, ch);
        }
        let dimension = self.dimension();
        let t = x.clamp(0.0, 1.0) * (dimension - 1) as f32;
        if self.interpolation == Interpolation::Nearest {
            return self.value((t.round() as usize).min(dimension - 1), ch);
        }
        let i0 = (t.floor() as usize).min(dimension - 1);
        let i1 = (i0 + 1).min(dimension - 1);
        let frac = t - i0 as f32;
        self.value(i0, ch) * (1.0 - frac) + self.value(i1, ch) * frac
    }

    fn eval_channel(&self, ch: usize, x: f32) -> f32 {
        match self.direction {
            TransformDirection::Inverse => self.eval_channel_inverse(ch, x),
            _ => self.eval_channel_forward(ch, x),
        }
    }

    /// Applies the LUT to one RGB pixel, honoring direction and hue
    /// adjustment. Alpha is never touched by a 1-D LUT.
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        if self.hue_adjust == HueAdjust::Dw3 {
            self.apply_hue_adjusted(rgb);
        } else {
            for (ch, v) in rgb.iter_mut().enumerate() {
                *v = self.eval_channel(ch, *v);
            }
        }
    }

    /// Ratio-preserving application: the min and max channels go through
    /// their curves, the middle channel keeps its relative position.
    fn apply_hue_adjusted(&self, rgb: &mut [f32; 3]) {
        let (min_ch, max_ch) = min_max_channels(rgb);
        if min_ch == max_ch || rgb[max_ch] == rgb[min_ch] {
            for (ch, v) in rgb.iter_mut().enumerate() {
                *v = self.eval_channel(ch, *v);
            }
            return;
        }
        let mid_ch = 3 - min_ch - max_ch;
        let ratio = (rgb[mid_ch] - rgb[min_ch]) / (rgb[max_ch] - rgb[min_ch]);

        let out_min = self.eval_channel(min_ch, rgb[min_ch]);
        let out_max = self.eval_channel(max_ch, rgb[max_ch]);

        rgb[min_ch] = out_min;
        rgb[max_ch] = out_max;
        rgb[mid_ch] = out_min + ratio * (out_max - out_min);
    }

    // ========================================================================
    // Inversion
    // ========================================================================

    /// Returns the direction-flipped LUT.
    ///
    /// Fails when the table has no active span to invert over (all
    /// channels flat).
    pub fn inverse(&self) -> OpResult<Lut1DOpData> {
        self.ensure_invertible()?;
        let mut inv = self.clone();
        inv.direction = self.direction.inverse();
        inv.cache_id = OnceLock::new();
        Ok(inv)
    }

    fn ensure_invertible(&self) -> OpResult<()> {
        let props = self.component_properties();
        let flat = (0..self.components)
            .all(|ch| props[ch].start_domain >= props[ch].end_domain);
        if flat {
            return Err(OpError::inversion(
                "LUT 1D cannot be inverted: no active domain (all samples equal)".to_string(),
            ));
        }
        Ok(())
    }

    /// Conservative inverse detection: equal storage (dimension,
    /// components, domain encoding, exact sample equality) under flipped
    /// direction.
    pub fn is_inverse(&self, other: &Lut1DOpData) -> bool {
        self.direction.inverse() == other.direction
            && self.components == other.components
            && self.half_flags == other.half_flags
            && self.array == other.array
    }

    /// Builds a forward LUT that approximates an inverse-direction LUT.
    ///
    /// Tabulates the active-span inverse solve over a dense domain so the
    /// renderer can use plain forward interpolation. Values outside the
    /// active span map to the span's boundary value. The approximation is
    /// not exact; it exists to avoid per-pixel root finding.
    pub fn make_fast_lut1d_from_inverse(lut: &Lut1DOpData) -> OpResult<Lut1DOpData> {
        if lut.direction != TransformDirection::Inverse {
            return Err(OpError::inversion(
                "fast LUT can only be built from an inverse-direction LUT".to_string(),
            ));
        }
        lut.validate()?;
        lut.ensure_invertible()?;

        let half_domain = lut.half_flags.is_input_half() || lut.has_extended_range();
        let components = lut.components;

        let mut out = if half_domain {
            let mut array = Vec::with_capacity(halfs::HALF_DOMAIN_DIMENSION * components);
            for code in 0..halfs::HALF_DOMAIN_DIMENSION {
                let x = half_code_value(code as u16);
                for ch in 0..components {
                    array.push(lut.eval_channel_inverse(ch, x));
                }
            }
            Lut1DOpData::with_array(array, components, HalfFlags::InputHalf)
        } else {
            let dimension = FAST_LUT_SIZE;
            let mut array = Vec::with_capacity(dimension * components);
            for i in 0..dimension {
                let x = i as f32 / (dimension - 1) as f32;
                for ch in 0..components {
                    array.push(lut.eval_channel_inverse(ch, x));
                }
            }
            Lut1DOpData::with_array(array, components, HalfFlags::Standard)
        };
        out.interpolation = lut.interpolation;
        out.metadata = lut.metadata.clone();
        Ok(out)
    }

    /// True when any decoded sample falls outside [0, 1].
    fn has_extended_range(&self) -> bool {
        let dimension = self.dimension();
        for i in 0..dimension {
            for ch in 0..self.components {
                let v = self.value(i, ch);
                if !(0.0..=1.0).contains(&v) {
                    return true;
                }
            }
        }
        false
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Whether [`Lut1DOpData::compose`] will accept this pair.
    ///
    /// Hue-adjusted operands mix channels and cannot be composed
    /// per-channel; mismatched domain encodings would lose precision; the
    /// first operand must be a forward LUT so its stored samples are its
    /// function values.
    pub fn may_compose(&self, other: &Lut1DOpData) -> bool {
        self.hue_adjust == HueAdjust::None
            && other.hue_adjust == HueAdjust::None
            && self.direction == TransformDirection::Forward
            && self.half_flags.is_input_half() == other.half_flags.is_input_half()
    }

    /// Evaluates `a`'s domain through a set of following operations,
    /// producing one combined LUT.
    ///
    /// With [`ComposeMethod::ResampleBig`] a standard-domain `a` is first
    /// resampled onto at least [`COMPOSE_RESAMPLE_BIG_SIZE`] entries so the
    /// finer structure of the following ops is not lost.
    pub fn compose(a: &Lut1DOpData, ops: &[Op], method: ComposeMethod) -> OpResult<Lut1DOpData> {
        a.validate()?;
        if a.direction != TransformDirection::Forward {
            return Err(OpError::composition(
                "LUT 1D composition requires a forward-direction first operand".to_string(),
            ));
        }
        if a.hue_adjust != HueAdjust::None {
            return Err(OpError::composition(
                "cannot compose a hue-adjusted LUT 1D".to_string(),
            ));
        }

        let input_half = a.half_flags.is_input_half();
        let resample = method == ComposeMethod::ResampleBig
            && !input_half
            && a.dimension() < COMPOSE_RESAMPLE_BIG_SIZE;
        let dimension = if resample {
            COMPOSE_RESAMPLE_BIG_SIZE
        } else {
            a.dimension()
        };

        let mut array = Vec::with_capacity(dimension * 3);
        for i in 0..dimension {
            let mut rgba = if resample {
                let x = i as f32 / (dimension - 1) as f32;
                let mut rgba = [x, x, x, 1.0];
                for (ch, v) in rgba[..3].iter_mut().enumerate() {
                    *v = a.eval_channel_forward(ch, *v);
                }
                rgba
            } else {
                [a.value(i, 0), a.value(i, 1), a.value(i, 2), 1.0]
            };
            for op in ops {
                op.apply_rgba(&mut rgba);
            }
            array.extend_from_slice(&rgba[..3]);
        }

        let mut out = Lut1DOpData::with_array(array, 3, HalfFlags::new(input_half, false));
        out.interpolation = a.interpolation;
        out.metadata = a.metadata.clone();
        for op in ops {
            out.metadata.combine(op.metadata());
        }
        Ok(out)
    }

    // ========================================================================
    // Cache identity
    // ========================================================================

    /// Validates, then computes the cache identity exactly once.
    ///
    /// Sample data is folded into a bit-exact hash rather than printed;
    /// two LUTs with byte-identical arrays and equal attributes share an
    /// identity.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            format!(
                "{} {} Lut1D dim {} comps {} {} {} hue {} inv {} data {:016x}",
                self.metadata.id(),
                self.direction.as_str(),
                self.dimension(),
                self.components,
                self.half_flags.as_str(),
                self.interpolation.as_str(),
                self.hue_adjust.as_str(),
                self.inversion_quality.as_str(),
                hash_samples(&self.array),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }
}

/// Channel indices holding the smallest and largest of the three values.
fn min_max_channels(rgb: &[f32; 3]) -> (usize, usize) {
    let mut min_ch = 0;
    let mut max_ch = 0;
    for ch in 1..3 {
        if rgb[ch] < rgb[min_ch] {
            min_ch = ch;
        }
        if rgb[ch] > rgb[max_ch] {
            max_ch = ch;
        }
    }
    (min_ch, max_ch)
}

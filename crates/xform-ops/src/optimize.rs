//! Sequence optimization engine.
//!
//! Walks an operation sequence left to right over adjacent pairs and
//! rewrites it into a shorter, mathematically equivalent one. Which
//! rewrites are allowed is controlled by a bit set of
//! [`OptimizationFlags`]; the named grades are the standard unions,
//! ordered from strictly lossless to draft quality.
//!
//! The engine iterates its passes until nothing changes (or a pass budget
//! runs out), so running it twice with the same flags never changes the
//! result of the first run.

use tracing::debug;
use xform_core::BitDepth;

use crate::error::OpResult;
use crate::lut1d::{ComposeMethod, Lut1DOpData};
use crate::lut3d::Lut3DOpData;
use crate::op::{Op, OpType};
use crate::sequence::OpSequence;

/// Bit set of enabled optimization rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationFlags(u32);

impl OptimizationFlags {
    /// No optimization.
    pub const NONE: Self = Self(0x0000);
    /// Delete no-op identities, replace clamping identities.
    pub const IDENTITY: Self = Self(0x0001);
    /// Drop a clamp followed by an equal-or-stricter clamp.
    pub const PAIR_IDENTITY_CLAMP: Self = Self(0x0002);
    /// Replace adjacent mutually-inverse 1-D LUTs.
    pub const PAIR_IDENTITY_LUT1D: Self = Self(0x0004);
    /// Replace adjacent mutually-inverse 3-D LUTs.
    pub const PAIR_IDENTITY_LUT3D: Self = Self(0x0008);
    /// Replace adjacent mutually-inverse gamma curves.
    pub const PAIR_IDENTITY_GAMMA: Self = Self(0x0010);
    /// Replace adjacent mutually-inverse log curves.
    pub const PAIR_IDENTITY_LOG: Self = Self(0x0020);
    /// Fold adjacent matrices.
    pub const COMP_MATRIX: Self = Self(0x0040);
    /// Merge adjacent 1-D LUTs.
    pub const COMP_LUT1D: Self = Self(0x0080);
    /// Merge adjacent 3-D LUTs.
    pub const COMP_LUT3D: Self = Self(0x0100);
    /// Merge adjacent compatible gamma curves.
    pub const COMP_GAMMA: Self = Self(0x0200);
    /// Collapse a channel-independent prefix into one lookup table.
    pub const COMP_SEPARABLE_PREFIX: Self = Self(0x0400);
    /// Every rewrite, including lossy resampling.
    pub const ALL: Self = Self(0xFFFF);

    /// Rewrites that cannot change any output value.
    pub const LOSSLESS: Self = Self(
        Self::IDENTITY.0
            | Self::PAIR_IDENTITY_CLAMP.0
            | Self::PAIR_IDENTITY_LUT1D.0
            | Self::PAIR_IDENTITY_LUT3D.0
            | Self::PAIR_IDENTITY_GAMMA.0
            | Self::PAIR_IDENTITY_LOG.0
            | Self::COMP_MATRIX.0
            | Self::COMP_GAMMA.0,
    );
    /// Lossless plus 1-D LUT merging and prefix collapse.
    pub const VERY_GOOD: Self = Self(
        Self::LOSSLESS.0 | Self::COMP_LUT1D.0 | Self::COMP_SEPARABLE_PREFIX.0,
    );
    /// Very good plus 3-D LUT merging.
    pub const GOOD: Self = Self(Self::VERY_GOOD.0 | Self::COMP_LUT3D.0);
    /// Everything.
    pub const DRAFT: Self = Self::ALL;
    /// Default grade.
    pub const DEFAULT: Self = Self::VERY_GOOD;

    /// True when every bit of `other` is enabled.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for OptimizationFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for OptimizationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pass budget; rewrites converge long before this in practice.
const MAX_PASSES: usize = 8;

/// Optimizes a sequence in place under the given flag set.
///
/// `input_depth` is the precision of the pixels that will enter the
/// sequence; it gates the separable-prefix collapse, which only pays off
/// for integer inputs.
pub fn optimize(
    seq: &mut OpSequence,
    flags: OptimizationFlags,
    input_depth: BitDepth,
) -> OpResult<()> {
    if flags == OptimizationFlags::NONE {
        return Ok(());
    }

    for pass in 0..MAX_PASSES {
        let mut changed = false;
        let ops = seq.ops_mut();

        changed |= remove_identities(ops, flags);
        changed |= remove_clamp_pairs(ops, flags);
        changed |= remove_inverse_pairs(ops, flags);
        changed |= compose_adjacent(ops, flags)?;
        changed |= collapse_separable_prefix(ops, flags, input_depth)?;

        if !changed {
            debug!(passes = pass + 1, ops = seq.len(), "optimization converged");
            break;
        }
    }
    Ok(())
}

/// Pass 1: identity elimination.
fn remove_identities(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    if !flags.contains(OptimizationFlags::IDENTITY) {
        return false;
    }
    let mut changed = false;
    let mut i = 0;
    while i < ops.len() {
        if ops[i].is_identity() {
            if ops[i].is_no_op() {
                debug!(kind = ops[i].op_type().as_str(), "removing no-op identity");
                ops.remove(i);
            } else {
                debug!(
                    kind = ops[i].op_type().as_str(),
                    "replacing clamping identity"
                );
                let replacement = ops[i].identity_replacement();
                ops[i] = replacement;
                i += 1;
            }
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

/// Input-side clamp bounds of an op, when the op starts by clamping.
fn input_clamp_bounds(op: &Op) -> Option<(f64, f64)> {
    match op {
        Op::Range(range) => Some((
            range.min_in().unwrap_or(f64::NEG_INFINITY),
            range.max_in().unwrap_or(f64::INFINITY),
        )),
        // Basic gamma clamps negatives before the power law.
        Op::Gamma(gamma) if gamma.is_clamping() => Some((0.0, f64::INFINITY)),
        _ => None,
    }
}

/// Pass 2: a pure clamp followed by an equal-or-stricter clamp is inert.
fn remove_clamp_pairs(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    if !flags.contains(OptimizationFlags::PAIR_IDENTITY_CLAMP) {
        return false;
    }
    let mut changed = false;
    let mut i = 0;
    while i + 1 < ops.len() {
        let removable = match &ops[i] {
            Op::Range(first) if !first.scales() && first.is_clamping() => {
                match input_clamp_bounds(&ops[i + 1]) {
                    Some((lo, hi)) => first.lower_bound() <= lo && first.upper_bound() >= hi,
                    None => false,
                }
            }
            _ => false,
        };
        if removable {
            debug!("removing clamp shadowed by a stricter clamp");
            ops.remove(i);
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

fn pair_flag_for(kind: OpType) -> Option<OptimizationFlags> {
    match kind {
        OpType::Lut1d => Some(OptimizationFlags::PAIR_IDENTITY_LUT1D),
        OpType::Lut3d => Some(OptimizationFlags::PAIR_IDENTITY_LUT3D),
        OpType::Gamma => Some(OptimizationFlags::PAIR_IDENTITY_GAMMA),
        OpType::Log => Some(OptimizationFlags::PAIR_IDENTITY_LOG),
        _ => None,
    }
}

/// Pass 3: adjacent same-kind operations that cancel out become the
/// kind's identity replacement.
fn remove_inverse_pairs(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < ops.len() {
        let kind = ops[i].op_type();
        let enabled = pair_flag_for(kind).is_some_and(|flag| flags.contains(flag));
        if enabled && ops[i].is_inverse(&ops[i + 1]) {
            debug!(kind = kind.as_str(), "replacing mutually-inverse pair");
            let replacement = ops[i].identity_replacement();
            ops.splice(i..=i + 1, [replacement]);
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

/// Pass 4: same-kind composition of adjacent operations.
fn compose_adjacent(ops: &mut Vec<Op>, flags: OptimizationFlags) -> OpResult<bool> {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < ops.len() {
        let merged: Option<Op> = match (&ops[i], &ops[i + 1]) {
            (Op::Matrix(a), Op::Matrix(b)) if flags.contains(OptimizationFlags::COMP_MATRIX) => {
                Some(Op::Matrix(a.compose(b)))
            }
            (Op::Gamma(a), Op::Gamma(b))
                if flags.contains(OptimizationFlags::COMP_GAMMA) && a.may_compose(b) =>
            {
                Some(Op::Gamma(a.compose(b)?))
            }
            (Op::Lut1d(a), Op::Lut1d(b))
                if flags.contains(OptimizationFlags::COMP_LUT1D) && a.may_compose(b) =>
            {
                let method = if b.dimension() > a.dimension() {
                    ComposeMethod::ResampleBig
                } else {
                    ComposeMethod::ResampleNo
                };
                Some(Op::Lut1d(Lut1DOpData::compose(
                    a,
                    std::slice::from_ref(&ops[i + 1]),
                    method,
                )?))
            }
            (Op::Lut3d(a), Op::Lut3d(b))
                if flags.contains(OptimizationFlags::COMP_LUT3D)
                    && a.direction() == xform_core::TransformDirection::Forward
                    && b.direction() == xform_core::TransformDirection::Forward =>
            {
                Some(Op::Lut3d(Lut3DOpData::compose(
                    a,
                    std::slice::from_ref(&ops[i + 1]),
                )?))
            }
            _ => None,
        };
        if let Some(op) = merged {
            debug!(kind = op.op_type().as_str(), "merged adjacent pair");
            ops.splice(i..=i + 1, [op]);
            changed = true;
        } else {
            i += 1;
        }
    }
    Ok(changed)
}

/// Pass 5: collapse a channel-independent prefix into a single lookup
/// table sized to the integer input depth.
fn collapse_separable_prefix(
    ops: &mut Vec<Op>,
    flags: OptimizationFlags,
    input_depth: BitDepth,
) -> OpResult<bool> {
    if !flags.contains(OptimizationFlags::COMP_SEPARABLE_PREFIX) || !input_depth.is_integer() {
        return Ok(false);
    }
    let prefix_len = ops
        .iter()
        .take_while(|op| !op.has_channel_crosstalk())
        .count();
    // A single op gains nothing from tabulation; requiring two also keeps
    // the pass idempotent.
    if prefix_len < 2 {
        return Ok(false);
    }

    let Some(dimension) = input_depth.ideal_lut_size() else {
        return Ok(false);
    };
    let mut array = Vec::with_capacity(dimension * 3);
    for i in 0..dimension {
        let x = i as f32 / (dimension - 1) as f32;
        let mut rgba = [x, x, x, 1.0];
        for op in &ops[..prefix_len] {
            op.apply_rgba(&mut rgba);
        }
        array.extend_from_slice(&rgba[..3]);
    }

    let mut lut = Lut1DOpData::from_data(array, 3);
    let mut metadata = ops[0].metadata().clone();
    for op in &ops[1..prefix_len] {
        metadata.combine(op.metadata());
    }
    lut.set_metadata(metadata);
    lut.validate()?;

    debug!(
        prefix = prefix_len,
        dimension, "collapsed separable prefix into a lookup table"
    );
    ops.splice(..prefix_len, [Op::Lut1d(lut)]);
    Ok(true)
}

/// Optimizes with the default grade and float input.
pub fn optimize_default(seq: &mut OpSequence) -> OpResult<()> {
    optimize(seq, OptimizationFlags::DEFAULT, BitDepth::F32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::{GammaOpData, GammaStyle};
    use crate::log::LogOpData;
    use crate::matrix::MatrixOpData;
    use xform_core::TransformDirection;

    fn optimize_all(seq: &mut OpSequence) {
        optimize(seq, OptimizationFlags::LOSSLESS, BitDepth::F32).unwrap();
    }

    #[test]
    fn test_grades_are_ordered_unions() {
        assert!(OptimizationFlags::VERY_GOOD.contains(OptimizationFlags::LOSSLESS));
        assert!(OptimizationFlags::GOOD.contains(OptimizationFlags::VERY_GOOD));
        assert!(OptimizationFlags::DRAFT.contains(OptimizationFlags::GOOD));
        assert!(!OptimizationFlags::LOSSLESS.contains(OptimizationFlags::COMP_LUT1D));
    }

    #[test]
    fn test_identity_matrix_is_removed() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::identity());
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));
        optimize_all(&mut seq);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].op_type(), OpType::Gamma);
    }

    #[test]
    fn test_clamping_identity_becomes_range() {
        let mut seq = OpSequence::new();
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![1.0]));
        optimize_all(&mut seq);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].op_type(), OpType::Range);
    }

    #[test]
    fn test_clamp_pair_elimination() {
        // The gamma identity becomes clamp_min(0), which the following
        // basic gamma already performs.
        let mut seq = OpSequence::new();
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![1.0]));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));
        optimize_all(&mut seq);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].op_type(), OpType::Gamma);
    }

    #[test]
    fn test_log_pair_elimination() {
        let log = LogOpData::new(2.0, TransformDirection::Forward);
        let mut seq = OpSequence::new();
        seq.push(log.clone());
        seq.push(log.inverse());
        optimize_all(&mut seq);
        // The pair collapses to the forward log's replacement: a clamp.
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].op_type(), OpType::Range);
    }

    #[test]
    fn test_matrix_chain_composes() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::diagonal(2.0, 2.0, 2.0, 1.0));
        seq.push(MatrixOpData::diagonal(0.25, 0.25, 0.25, 1.0));
        seq.push(MatrixOpData::from_scale_offset(1.0, 0.5));
        optimize_all(&mut seq);
        assert_eq!(seq.len(), 1);

        let mut rgb = [1.0_f32, 0.0, 0.5];
        seq.apply_rgb(&mut rgb);
        assert!((rgb[0] - 1.0).abs() < 1e-5);
        assert!((rgb[1] - 0.5).abs() < 1e-5);
        assert!((rgb[2] - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_gamma_compose_then_identity_cleanup() {
        // gamma 2 followed by its reverse composes to gamma 1, which is a
        // clamping identity and ends up as a single range.
        let mut seq = OpSequence::new();
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.0]));
        seq.push(GammaOpData::uniform(GammaStyle::BasicReverse, vec![2.0]));
        optimize_all(&mut seq);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ops()[0].op_type(), OpType::Range);
    }

    #[test]
    fn test_optimizer_is_idempotent() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::diagonal(2.0, 2.0, 2.0, 1.0));
        seq.push(MatrixOpData::diagonal(0.5, 0.5, 0.5, 1.0));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.0]));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![3.0]));
        seq.push(LogOpData::new(10.0, TransformDirection::Forward));

        optimize_all(&mut seq);
        let once = seq.finalize().unwrap();

        optimize_all(&mut seq);
        let twice = seq.finalize().unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_separable_prefix_collapse() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::diagonal(0.9, 0.9, 0.9, 1.0));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));

        optimize(&mut seq, OptimizationFlags::COMP_SEPARABLE_PREFIX, BitDepth::U10).unwrap();
        assert_eq!(seq.len(), 1);
        let Op::Lut1d(lut) = &seq.ops()[0] else {
            panic!("expected a collapsed LUT");
        };
        assert_eq!(lut.dimension(), 1024);
        assert!(lut.may_lookup(BitDepth::U10));

        // Running again must not re-collapse the single LUT.
        let before = seq.finalize().unwrap();
        optimize(&mut seq, OptimizationFlags::COMP_SEPARABLE_PREFIX, BitDepth::U10).unwrap();
        assert_eq!(seq.finalize().unwrap(), before);
    }

    #[test]
    fn test_separable_prefix_needs_integer_depth() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::diagonal(0.9, 0.9, 0.9, 1.0));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));
        optimize(&mut seq, OptimizationFlags::COMP_SEPARABLE_PREFIX, BitDepth::F32).unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_none_flags_change_nothing() {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::identity());
        seq.push(MatrixOpData::identity());
        optimize(&mut seq, OptimizationFlags::NONE, BitDepth::F32).unwrap();
        assert_eq!(seq.len(), 2);
    }
}

//! End-to-end pipeline tests: build, validate, finalize, optimize,
//! invert, apply.

use xform_core::{BitDepth, TransformDirection};
use xform_ops::{
    GammaOpData, GammaStyle, LogOpData, LogParams, Lut1DOpData, MatrixOpData, Op, OpSequence,
    OpType, OptimizationFlags, optimize,
};

const EPSILON: f32 = 1e-4;

fn camera_like_sequence() -> OpSequence {
    // A plausible camera decode: remap, log-to-lin, display gamma.
    let mut seq = OpSequence::new();
    seq.push(MatrixOpData::from_scale_offset(0.9, 0.05));
    seq.push(LogOpData::with_params(
        10.0,
        LogParams::new(0.45, 0.37, 1.2, 0.01),
        TransformDirection::Inverse,
    ));
    seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));
    seq
}

#[test]
fn finalize_is_deterministic_across_clones() {
    let seq = camera_like_sequence();
    let copy = seq.clone();

    let ids = seq.finalize().unwrap();
    let copy_ids = copy.finalize().unwrap();
    assert_eq!(ids, copy_ids);

    // Any parameter change must change the affected cache identity.
    let mut gamma = GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]);
    gamma.set_params(vec![2.4]);
    let mut other = camera_like_sequence();
    other = OpSequence::from_ops(
        other
            .ops()
            .iter()
            .cloned()
            .take(2)
            .chain([Op::Gamma(gamma)])
            .collect(),
    );
    let other_ids = other.finalize().unwrap();
    assert_eq!(ids[0], other_ids[0]);
    assert_ne!(ids[2], other_ids[2]);
}

#[test]
fn sequence_inverse_undoes_sequence() {
    let seq = camera_like_sequence();
    let inv = seq.inverse().unwrap();
    assert_eq!(inv.len(), seq.len());

    // Inverse order is reversed, kinds preserved.
    assert_eq!(inv.ops()[0].op_type(), OpType::Gamma);
    assert_eq!(inv.ops()[2].op_type(), OpType::Matrix);

    for &v in &[0.05_f32, 0.18, 0.5, 0.9] {
        let original = [v, v, v];
        let mut rgb = original;
        seq.apply_rgb(&mut rgb);
        inv.apply_rgb(&mut rgb);
        for i in 0..3 {
            assert!(
                (rgb[i] - original[i]).abs() < 1e-3,
                "roundtrip failed for {v}: got {}",
                rgb[i]
            );
        }
    }
}

#[test]
fn optimizing_preserves_output() {
    let mut seq = OpSequence::new();
    seq.push(MatrixOpData::diagonal(2.0, 2.0, 2.0, 1.0));
    seq.push(MatrixOpData::from_scale_offset(0.5, 0.1));
    seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.0]));
    seq.push(GammaOpData::uniform(GammaStyle::BasicReverse, vec![4.0]));

    let reference = seq.clone();
    optimize(&mut seq, OptimizationFlags::LOSSLESS, BitDepth::F32).unwrap();
    assert!(seq.len() < reference.len());

    for &v in &[0.0_f32, 0.1, 0.5, 0.75, 1.0] {
        let mut expected = [v, v, v];
        reference.apply_rgb(&mut expected);
        let mut actual = [v, v, v];
        seq.apply_rgb(&mut actual);
        for i in 0..3 {
            assert!(
                (expected[i] - actual[i]).abs() < EPSILON,
                "optimization changed output at {v}: {expected:?} vs {actual:?}"
            );
        }
    }
}

#[test]
fn optimizer_idempotence_by_cache_ids() {
    let mut seq = camera_like_sequence();
    seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![1.0]));
    seq.push(LogOpData::new(2.0, TransformDirection::Forward));
    let inv_log = LogOpData::new(2.0, TransformDirection::Forward).inverse();
    seq.push(inv_log);

    for flags in [
        OptimizationFlags::LOSSLESS,
        OptimizationFlags::VERY_GOOD,
        OptimizationFlags::GOOD,
        OptimizationFlags::DRAFT,
    ] {
        let mut once = seq.clone();
        optimize(&mut once, flags, BitDepth::F32).unwrap();
        let first = once.finalize().unwrap();

        optimize(&mut once, flags, BitDepth::F32).unwrap();
        let second = once.finalize().unwrap();
        assert_eq!(first, second, "optimizer not idempotent for {flags:?}");
    }
}

#[test]
fn fast_inverse_lut_feeds_render_path() {
    // Build a display curve, invert it, tabulate the inverse, and verify
    // the tabulated path matches the exact path.
    let mut array = Vec::new();
    let dimension = 4096;
    for i in 0..dimension {
        let v = (i as f32 / (dimension - 1) as f32).powf(2.4);
        array.extend_from_slice(&[v, v, v]);
    }
    let display = Lut1DOpData::from_data(array, 3);
    let inverse = display.inverse().unwrap();
    let fast = Lut1DOpData::make_fast_lut1d_from_inverse(&inverse).unwrap();

    let mut exact_seq = OpSequence::new();
    exact_seq.push(inverse);
    let mut fast_seq = OpSequence::new();
    fast_seq.push(fast);

    for &v in &[0.0_f32, 0.02, 0.18, 0.5, 0.95, 1.0] {
        let mut exact = [v, v, v];
        exact_seq.apply_rgb(&mut exact);
        let mut approx = [v, v, v];
        fast_seq.apply_rgb(&mut approx);
        assert!(
            (exact[0] - approx[0]).abs() < 1e-3,
            "fast inverse diverges at {v}: {} vs {}",
            exact[0],
            approx[0]
        );
    }
}

#[test]
fn crosstalk_gates_separable_prefix() {
    let mut lut3d_seq = OpSequence::new();
    lut3d_seq.push(MatrixOpData::diagonal(0.5, 0.5, 0.5, 1.0));
    lut3d_seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]));
    lut3d_seq.push(xform_ops::Lut3DOpData::identity(9));
    assert!(lut3d_seq.has_channel_crosstalk());

    optimize(
        &mut lut3d_seq,
        OptimizationFlags::COMP_SEPARABLE_PREFIX,
        BitDepth::U8,
    )
    .unwrap();
    // The two separable ops collapse; the cube stays.
    assert_eq!(lut3d_seq.len(), 2);
    assert_eq!(lut3d_seq.ops()[0].op_type(), OpType::Lut1d);
    assert_eq!(lut3d_seq.ops()[1].op_type(), OpType::Lut3d);
}

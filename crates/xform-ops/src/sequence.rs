//! Ordered operation sequences.
//!
//! A sequence owns the ordered list of operations a processor will run.
//! Construction is single-threaded: build, validate, finalize, optionally
//! optimize. A finalized sequence is immutable and can be shared across
//! consumer threads.

use crate::error::OpResult;
use crate::op::Op;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Pixel count above which buffer application fans out to worker threads.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 4096;

/// An ordered list of operations applied left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpSequence {
    ops: Vec<Op>,
}

impl OpSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequence from existing operations.
    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// Appends an operation.
    pub fn push(&mut self, op: impl Into<Op>) {
        self.ops.push(op.into());
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when the sequence holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Mutable access for the optimizer.
    pub(crate) fn ops_mut(&mut self) -> &mut Vec<Op> {
        &mut self.ops
    }

    /// Validates every operation in order, failing on the first error.
    pub fn validate(&self) -> OpResult<()> {
        for op in &self.ops {
            op.validate()?;
        }
        Ok(())
    }

    /// Validates and finalizes every operation, returning the list of
    /// cache identities in order.
    ///
    /// The concatenated list identifies the whole sequence for
    /// memoization: equal lists mean equal compiled pipelines.
    pub fn finalize(&self) -> OpResult<Vec<String>> {
        let mut ids = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            ids.push(op.finalize()?.to_string());
        }
        Ok(ids)
    }

    /// True when any operation mixes channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        self.ops.iter().any(Op::has_channel_crosstalk)
    }

    /// Builds the inverse sequence: every operation inverted, in reverse
    /// order.
    pub fn inverse(&self) -> OpResult<OpSequence> {
        let mut ops = Vec::with_capacity(self.ops.len());
        for op in self.ops.iter().rev() {
            ops.push(op.inverse()?);
        }
        Ok(Self { ops })
    }

    /// Applies the sequence to one RGB triple (alpha assumed opaque).
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        let mut rgba = [rgb[0], rgb[1], rgb[2], 1.0];
        self.apply_rgba(&mut rgba);
        rgb.copy_from_slice(&rgba[..3]);
    }

    /// Applies the sequence to one RGBA pixel.
    pub fn apply_rgba(&self, rgba: &mut [f32; 4]) {
        for op in &self.ops {
            op.apply_rgba(rgba);
        }
    }

    /// Applies the sequence to a packed RGBA f32 buffer.
    ///
    /// Large buffers are processed in parallel when the `parallel` feature
    /// is enabled; the sequence itself is only read, so sharing it across
    /// the workers is safe.
    pub fn apply_rgba_buffer(&self, pixels: &mut [f32]) {
        debug_assert!(pixels.len() % 4 == 0);

        #[cfg(feature = "parallel")]
        if pixels.len() / 4 >= PARALLEL_THRESHOLD {
            pixels.par_chunks_exact_mut(4).for_each(|chunk| {
                let mut rgba = [chunk[0], chunk[1], chunk[2], chunk[3]];
                self.apply_rgba(&mut rgba);
                chunk.copy_from_slice(&rgba);
            });
            return;
        }

        for chunk in pixels.chunks_exact_mut(4) {
            let mut rgba = [chunk[0], chunk[1], chunk[2], chunk[3]];
            self.apply_rgba(&mut rgba);
            chunk.copy_from_slice(&rgba);
        }
    }
}

impl FromIterator<Op> for OpSequence {
    fn from_iter<I: IntoIterator<Item = Op>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::{GammaOpData, GammaStyle};
    use crate::log::LogOpData;
    use crate::matrix::MatrixOpData;
    use xform_core::TransformDirection;

    const EPSILON: f32 = 1e-5;

    fn sample_sequence() -> OpSequence {
        let mut seq = OpSequence::new();
        seq.push(MatrixOpData::from_scale_offset(0.5, 0.25));
        seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.0]));
        seq
    }

    #[test]
    fn test_apply_in_order() {
        let seq = sample_sequence();
        let mut rgb = [1.0_f32, 0.5, 0.0];
        seq.apply_rgb(&mut rgb);
        // (1.0 * 0.5 + 0.25)^2 = 0.5625
        assert!((rgb[0] - 0.5625).abs() < EPSILON);
        // (0.5 * 0.5 + 0.25)^2 = 0.25
        assert!((rgb[1] - 0.25).abs() < EPSILON);
        // (0.0 * 0.5 + 0.25)^2 = 0.0625
        assert!((rgb[2] - 0.0625).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_reverses_order() {
        let seq = sample_sequence();
        let inv = seq.inverse().unwrap();
        assert_eq!(inv.len(), 2);

        // The inverse undoes the sequence.
        let original = [0.8_f32, 0.4, 0.1];
        let mut rgb = original;
        seq.apply_rgb(&mut rgb);
        inv.apply_rgb(&mut rgb);
        for i in 0..3 {
            assert!((rgb[i] - original[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_finalize_returns_one_id_per_op() {
        let seq = sample_sequence();
        let ids = seq.finalize().unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        // Finalizing again yields the identical list.
        assert_eq!(seq.finalize().unwrap(), ids);
    }

    #[test]
    fn test_finalize_propagates_validation_errors() {
        let mut seq = OpSequence::new();
        seq.push(LogOpData::new(1.0, TransformDirection::Forward));
        assert!(seq.finalize().is_err());
    }

    #[test]
    fn test_buffer_apply_matches_single_pixel() {
        let seq = sample_sequence();
        let mut buffer = vec![1.0, 0.5, 0.0, 0.9, 0.2, 0.4, 0.6, 1.0];
        seq.apply_rgba_buffer(&mut buffer);

        let mut first = [1.0_f32, 0.5, 0.0, 0.9];
        seq.apply_rgba(&mut first);
        for i in 0..4 {
            assert!((buffer[i] - first[i]).abs() < EPSILON);
        }
        // Alpha of the first pixel went through the gamma alpha identity.
        assert!((buffer[3] - 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_finalized_sequence_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpSequence>();
    }
}

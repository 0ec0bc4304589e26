//! The operation sum type.
//!
//! Every elementary transform step is one variant of [`Op`]. The closed
//! enum keeps the concrete kind of any operation - including the results
//! of `inverse()` and `identity_replacement()` - queryable, which the
//! optimizer and the tests depend on.

use xform_core::FormatMetadata;

use crate::error::OpResult;
use crate::gamma::GammaOpData;
use crate::log::LogOpData;
use crate::lut1d::Lut1DOpData;
use crate::lut3d::Lut3DOpData;
use crate::matrix::MatrixOpData;
use crate::range::RangeOpData;

/// Discriminator over the operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    /// 4x4 matrix + offset.
    Matrix,
    /// Range clamp/remap.
    Range,
    /// Logarithmic curve.
    Log,
    /// Gamma curve.
    Gamma,
    /// 1-D lookup table.
    Lut1d,
    /// 3-D lookup table.
    Lut3d,
}

impl OpType {
    /// Stable name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matrix => "Matrix",
            Self::Range => "Range",
            Self::Log => "Log",
            Self::Gamma => "Gamma",
            Self::Lut1d => "Lut1D",
            Self::Lut3d => "Lut3D",
        }
    }
}

/// One elementary transform operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// 4x4 matrix + offset.
    Matrix(MatrixOpData),
    /// Range clamp/remap.
    Range(RangeOpData),
    /// Logarithmic curve.
    Log(LogOpData),
    /// Gamma curve.
    Gamma(GammaOpData),
    /// 1-D lookup table.
    Lut1d(Lut1DOpData),
    /// 3-D lookup table.
    Lut3d(Lut3DOpData),
}

impl Op {
    /// Concrete kind of this operation.
    pub fn op_type(&self) -> OpType {
        match self {
            Self::Matrix(_) => OpType::Matrix,
            Self::Range(_) => OpType::Range,
            Self::Log(_) => OpType::Log,
            Self::Gamma(_) => OpType::Gamma,
            Self::Lut1d(_) => OpType::Lut1d,
            Self::Lut3d(_) => OpType::Lut3d,
        }
    }

    /// Attached metadata.
    pub fn metadata(&self) -> &FormatMetadata {
        match self {
            Self::Matrix(op) => op.metadata(),
            Self::Range(op) => op.metadata(),
            Self::Log(op) => op.metadata(),
            Self::Gamma(op) => op.metadata(),
            Self::Lut1d(op) => op.metadata(),
            Self::Lut3d(op) => op.metadata(),
        }
    }

    /// Mutable metadata access.
    pub fn metadata_mut(&mut self) -> &mut FormatMetadata {
        match self {
            Self::Matrix(op) => op.metadata_mut(),
            Self::Range(op) => op.metadata_mut(),
            Self::Log(op) => op.metadata_mut(),
            Self::Gamma(op) => op.metadata_mut(),
            Self::Lut1d(op) => op.metadata_mut(),
            Self::Lut3d(op) => op.metadata_mut(),
        }
    }

    /// Replaces the metadata tree.
    pub fn set_metadata(&mut self, metadata: FormatMetadata) {
        match self {
            Self::Matrix(op) => op.set_metadata(metadata),
            Self::Range(op) => op.set_metadata(metadata),
            Self::Log(op) => op.set_metadata(metadata),
            Self::Gamma(op) => op.set_metadata(metadata),
            Self::Lut1d(op) => op.set_metadata(metadata),
            Self::Lut3d(op) => op.set_metadata(metadata),
        }
    }

    /// Checks the operation invariants.
    pub fn validate(&self) -> OpResult<()> {
        match self {
            Self::Matrix(op) => op.validate(),
            Self::Range(op) => op.validate(),
            Self::Log(op) => op.validate(),
            Self::Gamma(op) => op.validate(),
            Self::Lut1d(op) => op.validate(),
            Self::Lut3d(op) => op.validate(),
        }
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        match self {
            Self::Matrix(op) => op.finalize(),
            Self::Range(op) => op.finalize(),
            Self::Log(op) => op.finalize(),
            Self::Gamma(op) => op.finalize(),
            Self::Lut1d(op) => op.finalize(),
            Self::Lut3d(op) => op.finalize(),
        }
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        match self {
            Self::Matrix(op) => op.cache_id(),
            Self::Range(op) => op.cache_id(),
            Self::Log(op) => op.cache_id(),
            Self::Gamma(op) => op.cache_id(),
            Self::Lut1d(op) => op.cache_id(),
            Self::Lut3d(op) => op.cache_id(),
        }
    }

    /// True when the operation leaves every in-domain value unchanged.
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Matrix(op) => op.is_identity(),
            Self::Range(op) => op.is_identity(),
            Self::Log(op) => op.is_identity(),
            Self::Gamma(op) => op.is_identity(),
            Self::Lut1d(op) => op.is_identity(),
            Self::Lut3d(op) => op.is_identity(),
        }
    }

    /// True when the operation is an identity and does not clamp.
    pub fn is_no_op(&self) -> bool {
        match self {
            Self::Matrix(op) => op.is_no_op(),
            Self::Range(op) => op.is_no_op(),
            Self::Log(op) => op.is_no_op(),
            Self::Gamma(op) => op.is_no_op(),
            Self::Lut1d(op) => op.is_no_op(),
            Self::Lut3d(op) => op.is_no_op(),
        }
    }

    /// True when an output channel depends on more than one input channel.
    pub fn has_channel_crosstalk(&self) -> bool {
        match self {
            Self::Matrix(op) => op.has_channel_crosstalk(),
            Self::Range(_) => false,
            Self::Log(op) => op.has_channel_crosstalk(),
            Self::Gamma(op) => op.has_channel_crosstalk(),
            Self::Lut1d(op) => op.has_channel_crosstalk(),
            Self::Lut3d(op) => op.has_channel_crosstalk(),
        }
    }

    /// Produces the inverse operation.
    ///
    /// Curve kinds are closed under direction/style flips and never fail;
    /// matrix and LUT kinds fail when their data admits no usable inverse.
    pub fn inverse(&self) -> OpResult<Op> {
        Ok(match self {
            Self::Matrix(op) => Self::Matrix(op.inverse()?),
            Self::Range(op) => Self::Range(op.inverse()),
            Self::Log(op) => Self::Log(op.inverse()),
            Self::Gamma(op) => Self::Gamma(op.inverse()),
            Self::Lut1d(op) => Self::Lut1d(op.inverse()?),
            Self::Lut3d(op) => Self::Lut3d(op.inverse()?),
        })
    }

    /// Symmetric, conservative inverse check between same-kind operations.
    ///
    /// False negatives are acceptable; false positives are not.
    pub fn is_inverse(&self, other: &Op) -> bool {
        match (self, other) {
            (Self::Matrix(a), Self::Matrix(b)) => a.is_inverse(b),
            (Self::Range(a), Self::Range(b)) => a.is_inverse(b),
            (Self::Log(a), Self::Log(b)) => a.is_inverse(b),
            (Self::Gamma(a), Self::Gamma(b)) => a.is_inverse(b),
            (Self::Lut1d(a), Self::Lut1d(b)) => a.is_inverse(b),
            (Self::Lut3d(a), Self::Lut3d(b)) => a.is_inverse(b),
            _ => false,
        }
    }

    /// Minimal equivalent operation for an identity configuration.
    pub fn identity_replacement(&self) -> Op {
        match self {
            Self::Matrix(_) | Self::Range(_) => {
                let mut op = Op::Matrix(MatrixOpData::identity());
                op.set_metadata(self.metadata().clone());
                op
            }
            Self::Log(op) => op.identity_replacement(),
            Self::Gamma(op) => op.identity_replacement(),
            Self::Lut1d(op) => op.identity_replacement(),
            Self::Lut3d(op) => op.identity_replacement(),
        }
    }

    /// Applies the operation to one RGBA pixel.
    ///
    /// Matrix and gamma address alpha; the other kinds pass it through.
    #[inline]
    pub fn apply_rgba(&self, rgba: &mut [f32; 4]) {
        match self {
            Self::Matrix(op) => op.apply_rgba(rgba),
            Self::Gamma(op) => op.apply_rgba(rgba),
            Self::Range(op) => {
                let mut rgb = [rgba[0], rgba[1], rgba[2]];
                op.apply_rgb(&mut rgb);
                rgba[..3].copy_from_slice(&rgb);
            }
            Self::Log(op) => {
                let mut rgb = [rgba[0], rgba[1], rgba[2]];
                op.apply_rgb(&mut rgb);
                rgba[..3].copy_from_slice(&rgb);
            }
            Self::Lut1d(op) => {
                let mut rgb = [rgba[0], rgba[1], rgba[2]];
                op.apply_rgb(&mut rgb);
                rgba[..3].copy_from_slice(&rgb);
            }
            Self::Lut3d(op) => {
                let mut rgb = [rgba[0], rgba[1], rgba[2]];
                op.apply_rgb(&mut rgb);
                rgba[..3].copy_from_slice(&rgb);
            }
        }
    }
}

impl From<MatrixOpData> for Op {
    fn from(op: MatrixOpData) -> Self {
        Self::Matrix(op)
    }
}

impl From<RangeOpData> for Op {
    fn from(op: RangeOpData) -> Self {
        Self::Range(op)
    }
}

impl From<LogOpData> for Op {
    fn from(op: LogOpData) -> Self {
        Self::Log(op)
    }
}

impl From<GammaOpData> for Op {
    fn from(op: GammaOpData) -> Self {
        Self::Gamma(op)
    }
}

impl From<Lut1DOpData> for Op {
    fn from(op: Lut1DOpData) -> Self {
        Self::Lut1d(op)
    }
}

impl From<Lut3DOpData> for Op {
    fn from(op: Lut3DOpData) -> Self {
        Self::Lut3d(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::GammaStyle;
    use xform_core::TransformDirection;

    #[test]
    fn test_op_type_survives_inverse() {
        let ops: Vec<Op> = vec![
            MatrixOpData::from_scale_offset(2.0, 0.0).into(),
            RangeOpData::clamp(0.0, 1.0).into(),
            LogOpData::new(2.0, TransformDirection::Forward).into(),
            GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]).into(),
        ];
        for op in &ops {
            let inv = op.inverse().unwrap();
            assert_eq!(op.op_type(), inv.op_type());
        }
    }

    #[test]
    fn test_is_inverse_rejects_cross_kind() {
        let gamma: Op = GammaOpData::uniform(GammaStyle::BasicForward, vec![2.2]).into();
        let log: Op = LogOpData::new(2.0, TransformDirection::Forward).into();
        assert!(!gamma.is_inverse(&log));
        assert!(!log.is_inverse(&gamma));
    }

    #[test]
    fn test_is_inverse_symmetry() {
        let log: Op = LogOpData::new(10.0, TransformDirection::Forward).into();
        let inv = log.inverse().unwrap();
        assert_eq!(log.is_inverse(&inv), inv.is_inverse(&log));
        assert!(log.is_inverse(&inv));
    }

    #[test]
    fn test_metadata_travels_to_replacement() {
        let mut gamma = GammaOpData::uniform(GammaStyle::BasicForward, vec![1.0]);
        gamma.metadata_mut().set_id("curve-7");
        let op: Op = gamma.into();
        assert!(op.is_identity());
        let rep = op.identity_replacement();
        assert_eq!(rep.metadata().id(), "curve-7");
    }
}

//! Matrix operation - 4x4 matrix plus offset vector.
//!
//! The matrix op is the cheapest channel-mixing operation and doubles as
//! the pass-through replacement for identities that do not clamp.

use std::sync::OnceLock;

use xform_core::FormatMetadata;

use crate::cacheid::fmt_params;
use crate::error::{OpError, OpResult};

const IDENTITY_TOLERANCE: f64 = 1e-6;

/// 4x4 matrix operation with an additive offset.
///
/// Applies `out = M * in + offset` to RGBA values. The matrix is stored
/// row-major.
#[derive(Debug, Clone)]
pub struct MatrixOpData {
    matrix: [f64; 16],
    offset: [f64; 4],
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
}

impl Default for MatrixOpData {
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for MatrixOpData {
    fn eq(&self, other: &Self) -> bool {
        self.matrix == other.matrix
            && self.offset == other.offset
            && self.metadata.id() == other.metadata.id()
    }
}

impl MatrixOpData {
    /// Creates an identity matrix (pass-through).
    pub fn identity() -> Self {
        let mut matrix = [0.0; 16];
        matrix[0] = 1.0;
        matrix[5] = 1.0;
        matrix[10] = 1.0;
        matrix[15] = 1.0;
        Self {
            matrix,
            offset: [0.0; 4],
            metadata: FormatMetadata::new("Matrix"),
            cache_id: OnceLock::new(),
        }
    }

    /// Creates a matrix op from explicit values.
    pub fn new(matrix: [f64; 16], offset: [f64; 4]) -> Self {
        Self {
            matrix,
            offset,
            metadata: FormatMetadata::new("Matrix"),
            cache_id: OnceLock::new(),
        }
    }

    /// Creates a per-channel scale matrix.
    pub fn diagonal(r: f64, g: f64, b: f64, a: f64) -> Self {
        let mut m = Self::identity();
        m.matrix[0] = r;
        m.matrix[5] = g;
        m.matrix[10] = b;
        m.matrix[15] = a;
        m
    }

    /// Creates a uniform RGB scale + offset (alpha untouched).
    ///
    /// Used by file readers to remap a declared input range onto [0, 1].
    pub fn from_scale_offset(scale: f64, offset: f64) -> Self {
        let mut m = Self::diagonal(scale, scale, scale, 1.0);
        m.offset = [offset, offset, offset, 0.0];
        m
    }

    /// Row-major matrix coefficients.
    pub fn matrix(&self) -> &[f64; 16] {
        &self.matrix
    }

    /// Additive offset.
    pub fn offset(&self) -> &[f64; 4] {
        &self.offset
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

    /// Checks the matrix invariants.
    pub fn validate(&self) -> OpResult<()> {
        for v in self.matrix.iter().chain(self.offset.iter()) {
            if !v.is_finite() {
                return Err(OpError::validation(format!(
                    "matrix: coefficient '{v}' is not finite"
                )));
            }
        }
        Ok(())
    }

    /// True when the matrix is the identity and the offset is zero.
    pub fn is_identity(&self) -> bool {
        let identity = MatrixOpData::identity();
        self.matrix
            .iter()
            .zip(identity.matrix.iter())
            .all(|(a, b)| (a - b).abs() < IDENTITY_TOLERANCE)
            && self.offset.iter().all(|v| v.abs() < IDENTITY_TOLERANCE)
    }

    /// A matrix never clamps, so an identity matrix is a full no-op.
    pub fn is_no_op(&self) -> bool {
        self.is_identity()
    }

    /// True when all off-diagonal coefficients are zero.
    pub fn is_diagonal(&self) -> bool {
        self.matrix.iter().enumerate().all(|(i, v)| {
            let on_diagonal = i % 5 == 0;
            on_diagonal || v.abs() < IDENTITY_TOLERANCE
        })
    }

    /// An output channel depends on more than one input channel exactly
    /// when the matrix has off-diagonal coefficients.
    pub fn has_channel_crosstalk(&self) -> bool {
        !self.is_diagonal()
    }

    /// Folds this matrix with a following one.
    ///
    /// The result applies `self` first, then `other`.
    pub fn compose(&self, other: &MatrixOpData) -> MatrixOpData {
        let m = mat_mul(&other.matrix, &self.matrix);
        let mo = mat_apply(&other.matrix, &self.offset);
        let offset = [
            mo[0] + other.offset[0],
            mo[1] + other.offset[1],
            mo[2] + other.offset[2],
            mo[3] + other.offset[3],
        ];
        let mut out = MatrixOpData::new(m, offset);
        out.metadata = self.metadata.clone();
        out.metadata.combine(&other.metadata);
        out
    }

    /// Numerically inverted matrix.
    ///
    /// Fails with an inversion error when the matrix is singular.
    pub fn inverse(&self) -> OpResult<MatrixOpData> {
        // glam is column-major; transpose on the way in and out.
        let cols: [f64; 16] = {
            let m = &self.matrix;
            [
                m[0], m[4], m[8], m[12],
                m[1], m[5], m[9], m[13],
                m[2], m[6], m[10], m[14],
                m[3], m[7], m[11], m[15],
            ]
        };
        let mat = glam::DMat4::from_cols_array(&cols);

        let det = mat.determinant();
        if det.abs() < 1e-12 {
            return Err(OpError::inversion(
                "cannot invert singular matrix (determinant near zero)".to_string(),
            ));
        }

        let inv = mat.inverse().to_cols_array();
        let inv_matrix = [
            inv[0], inv[4], inv[8], inv[12],
            inv[1], inv[5], inv[9], inv[13],
            inv[2], inv[6], inv[10], inv[14],
            inv[3], inv[7], inv[11], inv[15],
        ];
        let mo = mat_apply(&inv_matrix, &self.offset);
        let inv_offset = [-mo[0], -mo[1], -mo[2], -mo[3]];

        let mut out = MatrixOpData::new(inv_matrix, inv_offset);
        out.metadata = self.metadata.clone();
        Ok(out)
    }

    /// True when `other` undoes this matrix exactly.
    pub fn is_inverse(&self, other: &MatrixOpData) -> bool {
        self.compose(other).is_identity()
    }

    /// Applies the matrix to one RGBA pixel.
    #[inline]
    pub fn apply_rgba(&self, rgba: &mut [f32; 4]) {
        let v = [
            rgba[0] as f64,
            rgba[1] as f64,
            rgba[2] as f64,
            rgba[3] as f64,
        ];
        let out = mat_apply(&self.matrix, &v);
        for i in 0..4 {
            rgba[i] = (out[i] + self.offset[i]) as f32;
        }
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            format!(
                "{} Matrix m:{} o:{}",
                self.metadata.id(),
                fmt_params(&self.matrix),
                fmt_params(&self.offset),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }
}

/// 4x4 matrix multiply (row-major).
fn mat_mul(a: &[f64; 16], b: &[f64; 16]) -> [f64; 16] {
    let mut r = [0.0; 16];
    for i in 0..4 {
        for j in 0..4 {
            r[i * 4 + j] = a[i * 4] * b[j]
                + a[i * 4 + 1] * b[4 + j]
                + a[i * 4 + 2] * b[8 + j]
                + a[i * 4 + 3] * b[12 + j];
        }
    }
    r
}

/// Applies a 4x4 matrix to a 4-vector (row-major).
fn mat_apply(m: &[f64; 16], v: &[f64; 4]) -> [f64; 4] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2] + m[3] * v[3],
        m[4] * v[0] + m[5] * v[1] + m[6] * v[2] + m[7] * v[3],
        m[8] * v[0] + m[9] * v[1] + m[10] * v[2] + m[11] * v[3],
        m[12] * v[0] + m[13] * v[1] + m[14] * v[2] + m[15] * v[3],
    ]
}

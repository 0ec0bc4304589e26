//! 3-D lookup table operation.
//!
//! A 3-D LUT maps RGB input to RGB output through a cube of color values,
//! so every output channel depends on all three inputs. Entries are stored
//! red-fastest, matching the order used by the common text file formats:
//! `index = r + size * (g + size * b)`.

use std::sync::OnceLock;

use xform_core::{FormatMetadata, Interpolation, TransformDirection};

use crate::cacheid::hash_samples;
use crate::error::{OpError, OpResult};
use crate::op::Op;
use crate::range::RangeOpData;

/// Smallest supported grid edge.
pub const MIN_GRID_SIZE: usize = 2;
/// Largest supported grid edge.
pub const MAX_GRID_SIZE: usize = 129;

/// 3-D lookup table operation.
#[derive(Debug, Clone)]
pub struct Lut3DOpData {
    /// Grid entries, red-fastest.
    array: Vec<[f32; 3]>,
    size: usize,
    interpolation: Interpolation,
    direction: TransformDirection,
    metadata: FormatMetadata,
    cache_id: OnceLock<String>,
}

impl PartialEq for Lut3DOpData {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
            && self.size == other.size
            && self.interpolation == other.interpolation
            && self.direction == other.direction
            && self.metadata.id() == other.metadata.id()
    }
}

impl Lut3DOpData {
    /// Creates an identity (pass-through) cube.
    pub fn identity(size: usize) -> Self {
        let mut array = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    let n = (size - 1) as f32;
                    array.push([r as f32 / n, g as f32 / n, b as f32 / n]);
                }
            }
        }
        Self::with_array(array, size)
    }

    /// Creates a cube from red-fastest grid data.
    pub fn from_data(array: Vec<[f32; 3]>, size: usize) -> Self {
        Self::with_array(array, size)
    }

    fn with_array(array: Vec<[f32; 3]>, size: usize) -> Self {
        Self {
            array,
            size,
            interpolation: Interpolation::Linear,
            direction: TransformDirection::Forward,
            metadata: FormatMetadata::new("Lut3D"),
            cache_id: OnceLock::new(),
        }
    }

    /// Grid edge length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Grid entries, red-fastest.
    pub fn array(&self) -> &[[f32; 3]] {
        &self.array
    }

    /// Mutable grid access. Clears the cache identity; call `validate()`
    /// again afterward.
    pub fn array_mut(&mut self) -> &mut Vec<[f32; 3]> {
        self.cache_id = OnceLock::new();
        &mut self.array
    }

    /// Interpolation used between grid points.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Sets the interpolation.
    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
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

    /// Checks the cube invariants.
    pub fn validate(&self) -> OpResult<()> {
        if self.direction == TransformDirection::Unknown {
            return Err(OpError::validation("LUT 3D: invalid direction".to_string()));
        }
        if self.size < MIN_GRID_SIZE || self.size > MAX_GRID_SIZE {
            return Err(OpError::validation(format!(
                "LUT 3D: invalid grid size '{}', must be within [{MIN_GRID_SIZE}, {MAX_GRID_SIZE}]",
                self.size
            )));
        }
        let expected = self.size * self.size * self.size;
        if self.array.len() != expected {
            return Err(OpError::validation(format!(
                "LUT 3D: expected {expected} entries for grid size {}, found '{}'",
                self.size,
                self.array.len()
            )));
        }
        for rgb in &self.array {
            for v in rgb {
                if !v.is_finite() {
                    return Err(OpError::validation(format!(
                        "LUT 3D: sample '{v}' is not finite"
                    )));
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn get(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.array[r + self.size * (g + self.size * b)]
    }

    /// True when the cube reproduces its grid positions exactly.
    pub fn is_identity(&self) -> bool {
        let n = (self.size - 1) as f32;
        for b in 0..self.size {
            for g in 0..self.size {
                for r in 0..self.size {
                    let expected = [r as f32 / n, g as f32 / n, b as f32 / n];
                    if self.get(r, g, b) != expected {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// A 3-D LUT always clamps its domain, so even an identity cube is
    /// not a no-op.
    pub fn is_no_op(&self) -> bool {
        false
    }

    /// Every output channel reads all three inputs.
    pub fn has_channel_crosstalk(&self) -> bool {
        true
    }

    /// Minimal equivalent operation for an identity cube: its [0, 1]
    /// domain clamp.
    pub fn identity_replacement(&self) -> Op {
        let mut op = Op::Range(RangeOpData::clamp(0.0, 1.0));
        op.set_metadata(self.metadata.clone());
        op
    }

    /// Returns the direction-flipped cube.
    ///
    /// Fails when the grid is constant and the per-pixel inverse search
    /// has nothing to work with.
    pub fn inverse(&self) -> OpResult<Lut3DOpData> {
        if self.array.windows(2).all(|w| w[0] == w[1]) {
            return Err(OpError::inversion(
                "LUT 3D cannot be inverted: grid is constant".to_string(),
            ));
        }
        let mut inv = self.clone();
        inv.direction = self.direction.inverse();
        inv.cache_id = OnceLock::new();
        Ok(inv)
    }

    /// Conservative inverse detection: equal grids under flipped direction.
    pub fn is_inverse(&self, other: &Lut3DOpData) -> bool {
        self.direction.inverse() == other.direction
            && self.size == other.size
            && self.array == other.array
    }

    /// Applies the cube to one RGB pixel, honoring the direction.
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        match self.direction {
            TransformDirection::Inverse => *rgb = self.eval_inverse(*rgb),
            _ => *rgb = self.eval_forward(*rgb),
        }
    }

    fn eval_forward(&self, rgb: [f32; 3]) -> [f32; 3] {
        match self.interpolation {
            Interpolation::Nearest => self.eval_nearest(rgb),
            Interpolation::Linear => self.eval_trilinear(rgb),
            Interpolation::Tetrahedral => self.eval_tetrahedral(rgb),
        }
    }

    fn clamp01(v: f32) -> f32 {
        if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
    }

    fn eval_nearest(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = (self.size - 1) as f32;
        let ri = (Self::clamp01(rgb[0]) * n).round() as usize;
        let gi = (Self::clamp01(rgb[1]) * n).round() as usize;
        let bi = (Self::clamp01(rgb[2]) * n).round() as usize;
        self.get(
            ri.min(self.size - 1),
            gi.min(self.size - 1),
            bi.min(self.size - 1),
        )
    }

    fn eval_trilinear(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = (self.size - 1) as f32;
        let r = Self::clamp01(rgb[0]) * n;
        let g = Self::clamp01(rgb[1]) * n;
        let b = Self::clamp01(rgb[2]) * n;

        let ri = (r.floor() as usize).min(self.size - 2);
        let gi = (g.floor() as usize).min(self.size - 2);
        let bi = (b.floor() as usize).min(self.size - 2);

        let rf = r - ri as f32;
        let gf = g - gi as f32;
        let bf = b - bi as f32;

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let c00 = c000[i] * (1.0 - rf) + c100[i] * rf;
            let c01 = c001[i] * (1.0 - rf) + c101[i] * rf;
            let c10 = c010[i] * (1.0 - rf) + c110[i] * rf;
            let c11 = c011[i] * (1.0 - rf) + c111[i] * rf;

            let c0 = c00 * (1.0 - gf) + c10 * gf;
            let c1 = c01 * (1.0 - gf) + c11 * gf;

            out[i] = c0 * (1.0 - bf) + c1 * bf;
        }
        out
    }

    fn eval_tetrahedral(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = (self.size - 1) as f32;
        let r = Self::clamp01(rgb[0]) * n;
        let g = Self::clamp01(rgb[1]) * n;
        let b = Self::clamp01(rgb[2]) * n;

        let ri = (r.floor() as usize).min(self.size - 2);
        let gi = (g.floor() as usize).min(self.size - 2);
        let bi = (b.floor() as usize).min(self.size - 2);

        let rf = r - ri as f32;
        let gf = g - gi as f32;
        let bf = b - bi as f32;

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            out[i] = if rf > gf {
                if gf > bf {
                    c000[i]
                        + rf * (c100[i] - c000[i])
                        + gf * (c110[i] - c100[i])
                        + bf * (c111[i] - c110[i])
                } else if rf > bf {
                    c000[i]
                        + rf * (c100[i] - c000[i])
                        + bf * (c101[i] - c100[i])
                        + gf * (c111[i] - c101[i])
                } else {
                    c000[i]
                        + bf * (c001[i] - c000[i])
                        + rf * (c101[i] - c001[i])
                        + gf * (c111[i] - c101[i])
                }
            } else if gf > bf {
                if rf > bf {
                    c000[i]
                        + gf * (c010[i] - c000[i])
                        + rf * (c110[i] - c010[i])
                        + bf * (c111[i] - c110[i])
                } else {
                    c000[i]
                        + gf * (c010[i] - c000[i])
                        + bf * (c011[i] - c010[i])
                        + rf * (c111[i] - c011[i])
                }
            } else {
                c000[i]
                    + bf * (c001[i] - c000[i])
                    + gf * (c011[i] - c001[i])
                    + rf * (c111[i] - c011[i])
            };
        }
        out
    }

    /// Per-pixel inverse search: Newton-Raphson with a numeric Jacobian,
    /// solved with Cramer's rule. Best effort for monotonic cubes.
    fn eval_inverse(&self, target: [f32; 3]) -> [f32; 3] {
        const MAX_ITERS: usize = 30;
        const TOLERANCE: f32 = 1e-6;
        const DAMPING: f32 = 0.8;
        const DELTA: f32 = 1e-4;

        let mut guess = [
            Self::clamp01(target[0]),
            Self::clamp01(target[1]),
            Self::clamp01(target[2]),
        ];

        for _ in 0..MAX_ITERS {
            let eval = self.eval_tetrahedral(guess);
            let err = [
                eval[0] - target[0],
                eval[1] - target[1],
                eval[2] - target[2],
            ];
            let err_mag = (err[0] * err[0] + err[1] * err[1] + err[2] * err[2]).sqrt();
            if err_mag < TOLERANCE {
                break;
            }

            let mut jacobian = [[0.0f32; 3]; 3];
            for j in 0..3 {
                let mut plus = guess;
                plus[j] = (plus[j] + DELTA).min(1.0);
                let eval_plus = self.eval_tetrahedral(plus);
                for i in 0..3 {
                    jacobian[i][j] = (eval_plus[i] - eval[i]) / DELTA;
                }
            }

            let dx = solve_3x3(&jacobian, &[-err[0], -err[1], -err[2]]);
            for j in 0..3 {
                guess[j] = (guess[j] + DAMPING * dx[j]).clamp(0.0, 1.0);
            }
        }
        guess
    }

    /// Evaluates `a`'s grid through a set of following operations,
    /// producing one combined cube.
    pub fn compose(a: &Lut3DOpData, ops: &[Op]) -> OpResult<Lut3DOpData> {
        a.validate()?;
        if a.direction != TransformDirection::Forward {
            return Err(OpError::composition(
                "LUT 3D composition requires a forward-direction first operand".to_string(),
            ));
        }

        let mut array = Vec::with_capacity(a.array.len());
        for rgb in &a.array {
            let mut rgba = [rgb[0], rgb[1], rgb[2], 1.0];
            for op in ops {
                op.apply_rgba(&mut rgba);
            }
            array.push([rgba[0], rgba[1], rgba[2]]);
        }

        let mut out = Lut3DOpData::with_array(array, a.size);
        out.interpolation = a.interpolation;
        out.metadata = a.metadata.clone();
        for op in ops {
            out.metadata.combine(op.metadata());
        }
        Ok(out)
    }

    /// Validates, then computes the cache identity exactly once.
    pub fn finalize(&self) -> OpResult<&str> {
        self.validate()?;
        Ok(self.cache_id.get_or_init(|| {
            let flat: Vec<f32> = self.array.iter().flatten().copied().collect();
            format!(
                "{} {} Lut3D size {} {} data {:016x}",
                self.metadata.id(),
                self.direction.as_str(),
                self.size,
                self.interpolation.as_str(),
                hash_samples(&flat),
            )
        }))
    }

    /// Cache identity, if finalized.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.get().map(String::as_str)
    }
}

/// Solves a 3x3 linear system with Cramer's rule.
fn solve_3x3(a: &[[f32; 3]; 3], b: &[f32; 3]) -> [f32; 3] {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);

    if det.abs() < 1e-10 {
        return [0.0, 0.0, 0.0];
    }

    let det_x = b[0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (b[1] * a[2][2] - a[1][2] * b[2])
        + a[0][2] * (b[1] * a[2][1] - a[1][1] * b[2]);

    let det_y = a[0][0] * (b[1] * a[2][2] - a[1][2] * b[2])
        - b[0] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * b[2] - b[1] * a[2][0]);

    let det_z = a[0][0] * (a[1][1] * b[2] - b[1] * a[2][1])
        - a[0][1] * (a[1][0] * b[2] - b[1] * a[2][0])
        + b[0] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);

    [det_x / det, det_y / det, det_z / det]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let lut = Lut3DOpData::identity(17);
        assert!(lut.validate().is_ok());
        assert!(lut.is_identity());
        assert!(!lut.is_no_op());
        assert!(lut.has_channel_crosstalk());

        let mut rgb = [0.5_f32, 0.3, 0.8];
        lut.apply_rgb(&mut rgb);
        assert!((rgb[0] - 0.5).abs() < 0.01);
        assert!((rgb[1] - 0.3).abs() < 0.01);
        assert!((rgb[2] - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_corners() {
        let lut = Lut3DOpData::identity(33);

        let mut black = [0.0_f32, 0.0, 0.0];
        lut.apply_rgb(&mut black);
        assert!(black[0].abs() < 0.01);

        let mut red = [1.0_f32, 0.0, 0.0];
        lut.apply_rgb(&mut red);
        assert!((red[0] - 1.0).abs() < 0.01);
        assert!(red[1].abs() < 0.01);
    }

    #[test]
    fn test_tetrahedral() {
        let mut lut = Lut3DOpData::identity(33);
        lut.set_interpolation(Interpolation::Tetrahedral);
        let mut rgb = [0.5_f32, 0.3, 0.8];
        lut.apply_rgb(&mut rgb);
        assert!((rgb[0] - 0.5).abs() < 0.01);
        assert!((rgb[2] - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_validation() {
        let lut = Lut3DOpData::from_data(vec![[0.5; 3]; 8], 3);
        assert!(lut.validate().is_err()); // 27 entries expected

        let lut = Lut3DOpData::from_data(vec![[0.5; 3]; 1], 1);
        assert!(lut.validate().is_err()); // size below minimum

        let mut lut = Lut3DOpData::identity(2);
        lut.set_direction(TransformDirection::Unknown);
        assert!(lut.validate().is_err());
    }

    #[test]
    fn test_inverse_roundtrip() {
        // A gamma-ish cube: per-channel square, monotonic and invertible.
        let size = 17;
        let mut lut = Lut3DOpData::identity(size);
        for rgb in lut.array_mut() {
            for v in rgb {
                *v = *v * *v;
            }
        }
        let inv = lut.inverse().unwrap();
        assert!(lut.is_inverse(&inv));
        assert!(inv.is_inverse(&lut));

        let original = [0.5_f32, 0.3, 0.7];
        let mut rgb = original;
        lut.apply_rgb(&mut rgb);
        inv.apply_rgb(&mut rgb);
        for i in 0..3 {
            assert!(
                (rgb[i] - original[i]).abs() < 0.01,
                "roundtrip failed: {rgb:?} vs {original:?}"
            );
        }
    }

    #[test]
    fn test_constant_grid_inversion_fails() {
        let lut = Lut3DOpData::from_data(vec![[0.5; 3]; 27], 3);
        assert!(matches!(lut.inverse(), Err(OpError::Inversion(_))));
    }

    #[test]
    fn test_compose_with_identity_is_unchanged() {
        let size = 9;
        let mut lut = Lut3DOpData::identity(size);
        for rgb in lut.array_mut() {
            rgb[0] *= 0.5;
        }
        let composed = Lut3DOpData::compose(&lut, &[]).unwrap();
        assert_eq!(composed.array(), lut.array());
    }

    #[test]
    fn test_cache_id_changes_with_data() {
        let a = Lut3DOpData::identity(5);
        let mut b = Lut3DOpData::identity(5);
        assert_eq!(a.finalize().unwrap(), b.finalize().unwrap());
        b.array_mut()[0] = [0.1, 0.0, 0.0];
        assert_ne!(a.finalize().unwrap(), b.finalize().unwrap());
    }
}

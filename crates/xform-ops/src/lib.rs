//! # xform-ops
//!
//! The operation data model of the xform-rs color pipeline: elementary
//! pixel-value operations represented as data, plus the algorithms that
//! validate, finalize, optimize and invert sequences of them before they
//! are evaluated per pixel or translated into shader text.
//!
//! # Operation kinds
//!
//! - [`MatrixOpData`] - 4x4 matrix + offset (channel mixing, pass-through)
//! - [`RangeOpData`] - clamp and linear remap
//! - [`LogOpData`] - affine logarithmic curves
//! - [`GammaOpData`] - power-law and moncurve gamma curves
//! - [`Lut1DOpData`] - 1-D lookup tables with half-domain support
//! - [`Lut3DOpData`] - 3-D lookup cubes
//!
//! All kinds live in the closed [`Op`] sum type, so the concrete kind of
//! any result (an inverse, an identity replacement) stays queryable.
//!
//! # Lifecycle
//!
//! ```text
//! reader builds op -> validate() -> finalize() (cache identity, once)
//!        -> optimize() may rewrite the sequence
//!        -> inverse() per op or per sequence
//!        -> renderer / shader generator consumes the ops
//! ```
//!
//! Mutating setters return an op to the unfinalized state; callers
//! re-validate afterward. A finalized [`OpSequence`] is immutable and safe
//! to share across consumer threads.
//!
//! # Example
//!
//! ```rust
//! use xform_ops::{GammaOpData, GammaStyle, OpSequence, OptimizationFlags, optimize};
//! use xform_core::BitDepth;
//!
//! let mut seq = OpSequence::new();
//! seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![2.0]));
//! seq.push(GammaOpData::uniform(GammaStyle::BasicForward, vec![3.0]));
//!
//! optimize(&mut seq, OptimizationFlags::LOSSLESS, BitDepth::F32).unwrap();
//! assert_eq!(seq.len(), 1); // composed into gamma 6
//!
//! let mut rgb = [0.5_f32, 0.5, 0.5];
//! seq.apply_rgb(&mut rgb);
//! ```
//!
//! # Features
//!
//! - `parallel` (default) - rayon-backed buffer application

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cacheid;
mod error;
pub mod gamma;
pub mod log;
pub mod lut1d;
pub mod lut3d;
pub mod matrix;
pub mod op;
pub mod optimize;
pub mod range;
pub mod sequence;

pub use error::{OpError, OpResult};
pub use gamma::{GammaOpData, GammaParams, GammaStyle};
pub use log::{LogOpData, LogParams};
pub use lut1d::{
    ComponentProperties, ComposeMethod, HalfFlags, HueAdjust, Lut1DOpData, LutInversionQuality,
};
pub use lut3d::Lut3DOpData;
pub use matrix::MatrixOpData;
pub use op::{Op, OpType};
pub use optimize::{OptimizationFlags, optimize, optimize_default};
pub use range::RangeOpData;
pub use sequence::OpSequence;

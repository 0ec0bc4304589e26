//! # xform-core
//!
//! Core types shared by the color-transform operation pipeline crates.
//!
//! This crate provides the foundational vocabulary used throughout the
//! xform-rs workspace:
//!
//! - [`TransformDirection`] - forward/inverse orientation of an operation
//! - [`BitDepth`] - pixel encoding depths with ideal lookup-table sizing
//! - [`Interpolation`] - LUT interpolation methods
//! - [`FormatMetadata`] - descriptive metadata tree attached to operations
//! - [`halfs`] - half-float code-space helpers for half-domain LUTs
//!
//! # Crate Structure
//!
//! This crate is the foundation of xform-rs and has no internal
//! dependencies. The other workspace crates depend on it:
//!
//! ```text
//! xform-core (this crate)
//!    ^
//!    |
//!    +-- xform-ops (operation data model, optimizer, inversion)
//!    +-- xform-lut (LUT file formats)
//! ```
//!
//! # Dependencies
//!
//! - [`half`] - 16-bit float codes for half-domain LUT indexing

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod depth;
pub mod direction;
pub mod halfs;
pub mod interp;
pub mod metadata;

pub use depth::BitDepth;
pub use direction::TransformDirection;
pub use interp::Interpolation;
pub use metadata::FormatMetadata;

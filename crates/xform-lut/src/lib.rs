//! # xform-lut
//!
//! File-format boundary of the xform-rs color pipeline.
//!
//! Readers in this crate turn external LUT files into validated operation
//! data from [`xform_ops`]; writers serialize operation data back out for
//! baking and export tooling.
//!
//! # Supported Formats
//!
//! - `.cube` - Resolve/Adobe text LUTs, 1-D and/or 3-D ([`cube`] module)
//!
//! # Usage
//!
//! ```rust
//! use std::io::Cursor;
//! use xform_core::TransformDirection;
//! use xform_lut::cube;
//!
//! let data = "LUT_1D_SIZE 2\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
//! let file = cube::parse(Cursor::new(data), "identity.cube").unwrap();
//! let ops = file.build_ops(TransformDirection::Forward).unwrap();
//! assert_eq!(ops.len(), 1);
//! ```
//!
//! # Error Reporting
//!
//! Parse failures carry the file name, the 1-based line number and the
//! offending line text; whole-file consistency failures (e.g. a row-count
//! mismatch) carry the file name only. A failed parse discards the
//! partially built operations - there is no partial-success mode.
//!
//! # Dependencies
//!
//! - [`xform_ops`] - operation data model
//! - [`thiserror`] - error handling

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cube;
mod error;

pub use cube::{CubeFile, parse as parse_cube, read as read_cube, write as write_cube};
pub use error::{LutError, LutResult};

//! Resolve/Adobe .cube LUT format support.
//!
//! The .cube format is a simple text-based LUT format. A file can carry
//! 1-D data, 3-D data, or both (the 1-D table then acts as a shaper that
//! feeds the 3-D cube).
//!
//! # Format
//!
//! ```text
//! # Comment (only before the header)
//! LUT_1D_SIZE 6
//! LUT_1D_INPUT_RANGE 0.0 1.0
//! LUT_3D_SIZE 3
//! LUT_3D_INPUT_RANGE 0.0 1.0
//! <6 RGB rows of 1-D data>
//! <27 RGB rows of 3-D data, red fastest>
//! ```
//!
//! Comment lines are only legal before the first header or data line. An
//! unrecognized tag, a malformed numeric field, or a row-count mismatch
//! are all errors; `TITLE` is not part of this dialect and is rejected.
//!
//! # Example
//!
//! ```rust,ignore
//! use xform_lut::cube;
//! use xform_core::TransformDirection;
//!
//! let file = cube::read("grade.cube")?;
//! let ops = file.build_ops(TransformDirection::Forward)?;
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use xform_core::TransformDirection;
use xform_ops::{Lut1DOpData, Lut3DOpData, MatrixOpData, OpSequence};

use crate::error::{LutError, LutResult};

/// Parsed contents of a .cube file.
///
/// Input ranges default to [0, 1]; a non-default range becomes a matrix
/// remap in [`CubeFile::build_ops`].
#[derive(Debug, Clone)]
pub struct CubeFile {
    /// Source file name, kept for error reporting.
    pub file: String,
    /// 1-D (shaper) table, when present.
    pub lut1d: Option<Lut1DOpData>,
    /// Declared 1-D input range.
    pub range1d: (f32, f32),
    /// 3-D cube, when present.
    pub lut3d: Option<Lut3DOpData>,
    /// Declared 3-D input range.
    pub range3d: (f32, f32),
}

impl CubeFile {
    /// Builds the operation sequence this file describes.
    ///
    /// Forward order is: 1-D range remap, 1-D table, 3-D range remap,
    /// 3-D cube. The inverse direction inverts and reverses the same
    /// sequence.
    pub fn build_ops(&self, direction: TransformDirection) -> LutResult<OpSequence> {
        let mut seq = OpSequence::new();

        if let Some(lut) = &self.lut1d {
            self.push_range_remap(&mut seq, self.range1d)?;
            seq.push(lut.clone());
        }
        if let Some(lut) = &self.lut3d {
            self.push_range_remap(&mut seq, self.range3d)?;
            seq.push(lut.clone());
        }

        match direction {
            TransformDirection::Inverse => Ok(seq.inverse()?),
            _ => Ok(seq),
        }
    }

    fn push_range_remap(&self, seq: &mut OpSequence, range: (f32, f32)) -> LutResult<()> {
        let (min, max) = range;
        if (min, max) == (0.0, 1.0) {
            return Ok(());
        }
        if min >= max {
            return Err(LutError::consistency(
                &self.file,
                format!("invalid input range [{min}, {max}]"),
            ));
        }
        let scale = 1.0 / (max - min) as f64;
        seq.push(MatrixOpData::from_scale_offset(scale, -(min as f64) * scale));
        Ok(())
    }
}

/// Reads a .cube file from disk.
pub fn read<P: AsRef<Path>>(path: P) -> LutResult<CubeFile> {
    let name = path.as_ref().display().to_string();
    let file = File::open(path.as_ref())?;
    parse(BufReader::new(file), &name)
}

/// Parses .cube data from a reader.
pub fn parse<R: BufRead>(reader: R, file_name: &str) -> LutResult<CubeFile> {
    let mut size1d: Option<usize> = None;
    let mut size3d: Option<usize> = None;
    let mut range1d = (0.0_f32, 1.0_f32);
    let mut range3d = (0.0_f32, 1.0_f32);
    let mut raw1d: Vec<f32> = Vec::new();
    let mut raw3d: Vec<f32> = Vec::new();

    let mut header_started = false;
    let mut triplet_number = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            if header_started {
                return Err(LutError::parse(
                    file_name,
                    line_number,
                    trimmed,
                    "comments are only allowed before the header",
                ));
            }
            continue;
        }
        header_started = true;

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        match parts[0].to_ascii_lowercase().as_str() {
            "title" => {
                return Err(LutError::parse(
                    file_name,
                    line_number,
                    trimmed,
                    "unsupported tag: 'TITLE'",
                ));
            }
            "lut_2d_size" => {
                return Err(LutError::parse(
                    file_name,
                    line_number,
                    trimmed,
                    "unsupported tag: 'LUT_2D_SIZE'",
                ));
            }
            "lut_1d_size" => {
                size1d = Some(parse_size(&parts, file_name, line_number, trimmed, "LUT_1D_SIZE")?);
                raw1d.reserve(3 * size1d.unwrap());
            }
            "lut_3d_size" => {
                size3d = Some(parse_size(&parts, file_name, line_number, trimmed, "LUT_3D_SIZE")?);
                let n = size3d.unwrap();
                raw3d.reserve(3 * n * n * n);
            }
            "lut_1d_input_range" => {
                range1d = parse_range(&parts, file_name, line_number, trimmed, "LUT_1D_INPUT_RANGE")?;
            }
            "lut_3d_input_range" => {
                range3d = parse_range(&parts, file_name, line_number, trimmed, "LUT_3D_INPUT_RANGE")?;
            }
            _ => {
                // Must be a float triplet.
                let rgb = parse_rgb(&parts, file_name, line_number, trimmed)?;
                let into_1d = match size1d {
                    Some(n) => triplet_number < n,
                    None => false,
                };
                if into_1d {
                    raw1d.extend_from_slice(&rgb);
                } else {
                    raw3d.extend_from_slice(&rgb);
                }
                triplet_number += 1;
            }
        }
    }

    if size1d.is_none() && size3d.is_none() {
        return Err(LutError::consistency(file_name, "LUT size (1D/3D) unspecified"));
    }

    let lut1d = match size1d {
        Some(size) => {
            if raw1d.len() / 3 != size {
                return Err(LutError::consistency(
                    file_name,
                    format!(
                        "incorrect number of 1D entries, found {}, expected {size}",
                        raw1d.len() / 3
                    ),
                ));
            }
            let lut = Lut1DOpData::from_data(raw1d, 3);
            lut.validate()?;
            Some(lut)
        }
        None => None,
    };

    let lut3d = match size3d {
        Some(size) => {
            if raw3d.len() / 3 != size * size * size {
                return Err(LutError::consistency(
                    file_name,
                    format!(
                        "incorrect number of 3D entries, found {}, expected {}",
                        raw3d.len() / 3,
                        size * size * size
                    ),
                ));
            }
            // File order is red fastest, matching the op's storage.
            let entries: Vec<[f32; 3]> = raw3d.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
            let lut = Lut3DOpData::from_data(entries, size);
            lut.validate()?;
            Some(lut)
        }
        None => None,
    };

    Ok(CubeFile {
        file: file_name.to_string(),
        lut1d,
        range1d,
        lut3d,
        range3d,
    })
}

/// Writes a .cube file.
///
/// Header lines come first (1-D before 3-D), then 1-D data, then 3-D
/// data, mirroring the reader's expectations.
pub fn write<P: AsRef<Path>>(path: P, cube: &CubeFile) -> LutResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Generated by xform-lut")?;

    if let Some(lut) = &cube.lut1d {
        writeln!(writer, "LUT_1D_SIZE {}", lut.dimension())?;
        if cube.range1d != (0.0, 1.0) {
            writeln!(
                writer,
                "LUT_1D_INPUT_RANGE {} {}",
                cube.range1d.0, cube.range1d.1
            )?;
        }
    }
    if let Some(lut) = &cube.lut3d {
        writeln!(writer, "LUT_3D_SIZE {}", lut.size())?;
        if cube.range3d != (0.0, 1.0) {
            writeln!(
                writer,
                "LUT_3D_INPUT_RANGE {} {}",
                cube.range3d.0, cube.range3d.1
            )?;
        }
    }

    if let Some(lut) = &cube.lut1d {
        for i in 0..lut.dimension() {
            writeln!(
                writer,
                "{:.6} {:.6} {:.6}",
                lut.value(i, 0),
                lut.value(i, 1),
                lut.value(i, 2)
            )?;
        }
    }
    if let Some(lut) = &cube.lut3d {
        for rgb in lut.array() {
            writeln!(writer, "{:.6} {:.6} {:.6}", rgb[0], rgb[1], rgb[2])?;
        }
    }

    Ok(())
}

// Helper functions

fn parse_size(
    parts: &[&str],
    file: &str,
    line: usize,
    content: &str,
    tag: &str,
) -> LutResult<usize> {
    if parts.len() != 2 {
        return Err(LutError::parse(file, line, content, format!("malformed {tag} tag")));
    }
    parts[1]
        .parse()
        .map_err(|_| LutError::parse(file, line, content, format!("malformed {tag} tag")))
}

fn parse_range(
    parts: &[&str],
    file: &str,
    line: usize,
    content: &str,
    tag: &str,
) -> LutResult<(f32, f32)> {
    if parts.len() != 3 {
        return Err(LutError::parse(file, line, content, format!("malformed {tag} tag")));
    }
    let min = parts[1]
        .parse()
        .map_err(|_| LutError::parse(file, line, content, format!("malformed {tag} tag")))?;
    let max = parts[2]
        .parse()
        .map_err(|_| LutError::parse(file, line, content, format!("malformed {tag} tag")))?;
    Ok((min, max))
}

fn parse_rgb(parts: &[&str], file: &str, line: usize, content: &str) -> LutResult<[f32; 3]> {
    if parts.len() != 3 {
        return Err(LutError::parse(
            file,
            line,
            content,
            "malformed color triplet",
        ));
    }
    let mut rgb = [0.0_f32; 3];
    for (v, part) in rgb.iter_mut().zip(parts) {
        *v = part.parse().map_err(|_| {
            LutError::parse(file, line, content, "malformed color triplet")
        })?;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(data: &str) -> LutResult<CubeFile> {
        parse(Cursor::new(data), "test.cube")
    }

    #[test]
    fn parse_1d() {
        let cube = "LUT_1D_SIZE 2\nLUT_1D_INPUT_RANGE 0.0 1.0\n0.0 0.0 0.0\n1.0 0.0 0.0\n";
        let file = parse_str(cube).expect("parse failed");
        let lut = file.lut1d.expect("expected 1D data");
        assert_eq!(lut.dimension(), 2);
        assert_eq!(file.range1d, (0.0, 1.0));
        assert!(file.lut3d.is_none());
    }

    #[test]
    fn parse_3d() {
        let cube = "\
# a comment before the header is fine
LUT_3D_SIZE 2
LUT_3D_INPUT_RANGE 0.0 1.0
0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
";
        let file = parse_str(cube).expect("parse failed");
        let lut = file.lut3d.expect("expected 3D data");
        assert_eq!(lut.size(), 2);
        assert!(lut.is_identity());
    }

    #[test]
    fn parse_shaper_and_cube() {
        // 1-D data precedes 3-D data when both are present.
        let cube = "\
LUT_1D_SIZE 2
LUT_1D_INPUT_RANGE 0.0 2.0
LUT_3D_SIZE 2
1.0 1.0 1.0
0.0 0.0 0.0
0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
";
        let file = parse_str(cube).expect("parse failed");
        assert!(file.lut1d.is_some());
        assert!(file.lut3d.is_some());
        assert_eq!(file.range1d, (0.0, 2.0));

        // The shaper inverts the signal.
        let lut = file.lut1d.as_ref().unwrap();
        assert_eq!(lut.value(0, 0), 1.0);
        assert_eq!(lut.value(1, 0), 0.0);

        // Forward ops: remap, 1-D, 3-D.
        let ops = file
            .build_ops(xform_core::TransformDirection::Forward)
            .unwrap();
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn comment_after_header_fails() {
        let cube = "\
LUT_1D_SIZE 2
LUT_1D_INPUT_RANGE 0.0 1.0
# no longer allowed here
0.0 0.0 0.0
1.0 0.0 0.0
";
        let err = parse_str(cube).unwrap_err();
        assert!(matches!(err, LutError::Parse { line: 3, .. }), "{err}");
        assert!(err.to_string().contains("comments"), "{err}");
    }

    #[test]
    fn title_tag_fails() {
        let cube = "TITLE \"My Grade\"\nLUT_1D_SIZE 2\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let err = parse_str(cube).unwrap_err();
        assert!(err.to_string().contains("TITLE"), "{err}");
    }

    #[test]
    fn unknown_tag_fails_as_malformed_triplet() {
        let cube = "LUT_1D_SIZE 2\nGAMMA 2.2\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let err = parse_str(cube).unwrap_err();
        assert!(matches!(err, LutError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn malformed_numeric_field_fails() {
        let cube = "LUT_1D_SIZE two\n";
        let err = parse_str(cube).unwrap_err();
        assert!(err.to_string().contains("LUT_1D_SIZE"), "{err}");

        let cube = "LUT_1D_SIZE 2\n0.0 x 0.0\n1.0 1.0 1.0\n";
        let err = parse_str(cube).unwrap_err();
        assert!(err.to_string().contains("triplet"), "{err}");
    }

    #[test]
    fn triplet_count_mismatch_is_consistency_error() {
        let cube = "LUT_1D_SIZE 3\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let err = parse_str(cube).unwrap_err();
        assert!(matches!(err, LutError::Consistency { .. }), "{err}");
        assert!(err.to_string().contains("expected 3"), "{err}");
    }

    #[test]
    fn missing_size_fails() {
        let cube = "0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let err = parse_str(cube).unwrap_err();
        assert!(err.to_string().contains("unspecified"), "{err}");
    }

    #[test]
    fn range_remap_feeds_lut() {
        let cube = "LUT_1D_SIZE 2\nLUT_1D_INPUT_RANGE 0.0 2.0\n0.0 0.0 0.0\n1.0 1.0 1.0\n";
        let file = parse_str(cube).unwrap();
        let seq = file
            .build_ops(xform_core::TransformDirection::Forward)
            .unwrap();
        assert_eq!(seq.len(), 2);

        // 2.0 maps to the top of the table.
        let mut rgb = [2.0_f32, 1.0, 0.0];
        seq.apply_rgb(&mut rgb);
        assert!((rgb[0] - 1.0).abs() < 1e-5);
        assert!((rgb[1] - 0.5).abs() < 1e-5);
        assert!(rgb[2].abs() < 1e-5);
    }
}

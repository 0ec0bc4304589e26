//! Interpolation methods for LUT evaluation.

/// Interpolation method for LUT evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest neighbor (no interpolation).
    Nearest,

    /// Linear interpolation (1-D) / trilinear (3-D).
    ///
    /// Default method, good balance of quality and speed.
    #[default]
    Linear,

    /// Tetrahedral interpolation (3-D only).
    ///
    /// Higher quality than trilinear, especially for smooth gradients.
    Tetrahedral,
}

impl Interpolation {
    /// Stable name used in cache identities.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Tetrahedral => "tetrahedral",
        }
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

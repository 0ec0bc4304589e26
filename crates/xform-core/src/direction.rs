//! Transform direction.

/// Orientation of a transform operation.
///
/// Direction-sensitive operations (log, LUTs) carry a direction and must
/// reject `Unknown` when validated. `Unknown` only exists so that partially
/// built operations coming from file readers can be diagnosed with a clear
/// error instead of silently defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformDirection {
    /// Direction not yet specified. Invalid on a validated operation.
    Unknown,
    /// Forward transform.
    #[default]
    Forward,
    /// Inverse transform.
    Inverse,
}

impl TransformDirection {
    /// Returns the opposite direction. `Unknown` stays `Unknown`.
    #[inline]
    pub fn inverse(self) -> Self {
        match self {
            Self::Unknown => Self::Unknown,
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }

    /// Stable name used in cache identities.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Forward => "forward",
            Self::Inverse => "inverse",
        }
    }
}

impl std::fmt::Display for TransformDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Version ordinals and ranges.
//!
//! # Responsibilities
//! - Encode dotted version strings as comparable integers
//! - Represent inclusive `[min, max]` ranges over ordinals
//!
//! # Design Decisions
//! - Only the first three components carry weight (`100^2`, `100`, `1`)
//! - Missing or non-numeric components are 0; parsing never fails
//! - Ordinals are compared, never formatted back into strings

use std::fmt;

/// Weight of each of the three significant components.
const WEIGHTS: [u64; 3] = [10_000, 100, 1];

/// Integer-comparable encoding of a dotted version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionOrdinal(u64);

impl VersionOrdinal {
    /// The smallest ordinal (`""`, `"0"`, `"0.0.0"`).
    pub const ZERO: Self = Self(0);

    /// Upper bound used for open ranges and for a missing API level.
    pub const MAX: Self = Self(u64::MAX);

    /// Parse a dotted version string.
    ///
    /// `"1.2.3"` becomes `10203`. Components beyond the third are ignored and
    /// each component is read as its leading decimal digits, so `"2rc1"` is 2.
    pub fn parse(version: &str) -> Self {
        let ordinal = version
            .trim()
            .split('.')
            .zip(WEIGHTS)
            .map(|(component, weight)| leading_number(component).saturating_mul(weight))
            .fold(0u64, u64::saturating_add);
        Self(ordinal)
    }

    /// Raw integer value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for VersionOrdinal {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for VersionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn leading_number(component: &str) -> u64 {
    let component = component.trim();
    let digits = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    match &component[..digits] {
        "" => 0,
        number => number.parse().unwrap_or(u64::MAX),
    }
}

/// Inclusive range of version ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: VersionOrdinal,
    pub max: VersionOrdinal,
}

impl VersionRange {
    /// Matches every version.
    pub const ANY: Self = Self {
        min: VersionOrdinal::ZERO,
        max: VersionOrdinal::MAX,
    };

    pub fn new(min: VersionOrdinal, max: VersionOrdinal) -> Self {
        Self { min, max }
    }

    /// Range with the given minimum and no upper bound.
    pub fn at_least(min: VersionOrdinal) -> Self {
        Self {
            min,
            max: VersionOrdinal::MAX,
        }
    }

    /// Returns true if `version` lies inside the range (both ends inclusive).
    pub fn contains(&self, version: VersionOrdinal) -> bool {
        version >= self.min && version <= self.max
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::ANY
    }
}

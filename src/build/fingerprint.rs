//! Build fingerprints.
//!
//! An artifact is only reused when it was produced by the same build
//! settings. The fingerprint covers everything that shapes the output apart
//! from the source file itself (which is covered by modification times).

use std::fmt;

use xxhash_rust::xxh3::xxh3_128;

use crate::build::compiler::CompileRequest;

/// Suffix of the sidecar file storing an artifact's fingerprint.
pub const FINGERPRINT_SUFFIX: &str = "fingerprint";

/// 128-bit XXH3 hash of a build's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint of `request` compiled by the toolchain described as `toolchain`.
    pub fn of(request: &CompileRequest, toolchain: &str) -> Self {
        let mut data = Vec::new();
        for section in [
            &request.externals,
            &request.globals,
            &request.transforms,
        ] {
            for item in section {
                data.extend_from_slice(item.as_bytes());
                data.push(0x1f);
            }
            data.push(0x1e);
        }
        data.extend_from_slice(toolchain.as_bytes());
        Self(xxh3_128(&data))
    }

    /// Parse the hex form written by [`fmt::Display`].
    pub fn parse(text: &str) -> Option<Self> {
        u128::from_str_radix(text.trim(), 16).ok().map(Self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

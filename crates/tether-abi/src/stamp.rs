//! Build stamps tying proxy units to their dispatch table
//!
//! Both artifacts of one generation pass carry the same stamp; the
//! executor refuses to link a proxy unit against a table from a
//! different pass. Positional index convention alone is never
//! trusted across builds.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entry::NativeEntryPoint;

/// Identity of one generation pass.
///
/// A sha-256 digest over the canonical encoding of every entry the
/// pass produced, plus the generator version, so that any change to
/// indices, signatures, names, or targets yields a different stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildStamp {
    digest: String,
    generator_version: String,
}

impl BuildStamp {
    /// Compute the stamp for a set of entries.
    ///
    /// Entries must be passed in table order; the builder guarantees
    /// a deterministic order so both artifacts agree.
    pub fn compute(entries: &[NativeEntryPoint]) -> Self {
        let version = env!("CARGO_PKG_VERSION");
        let mut hasher = Sha256::new();
        hasher.update(version.as_bytes());
        hasher.update(b"\n");
        for entry in entries {
            hasher.update(entry.stamp_line().as_bytes());
            hasher.update(b"\n");
        }
        BuildStamp {
            digest: hex::encode(hasher.finalize()),
            generator_version: version.to_string(),
        }
    }

    /// Hex digest of this stamp.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Version of the generator that produced the pass.
    pub fn generator_version(&self) -> &str {
        &self.generator_version
    }
}

impl std::fmt::Display for BuildStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", &self.digest[..12], self.generator_version)
    }
}

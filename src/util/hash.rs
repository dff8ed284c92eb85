//! Job configuration fingerprints.

use sha2::{Digest, Sha256};

/// Incremental SHA256 fingerprint over a job's configuration.
///
/// Each component is terminated before hashing, so `["ab", "c"]` and
/// `["a", "bc"]` produce different fingerprints.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint::default()
    }

    /// Fold one string component into the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Fold a sequence of components into the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize into a full hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize into the 16-char prefix used for workspace names.
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}

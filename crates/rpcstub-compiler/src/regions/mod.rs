//! Round-trip preservation of hand-written code.
//!
//! A generated implementation file contains marker-delimited regions that
//! belong to the user. Before regenerating the file, the previous version is
//! scanned and each region's content is captured in a [`RegionMap`]; the
//! emitter splices the content back between freshly rendered markers.
//!
//! Everything outside the regions is owned by the compiler and regenerated
//! from the current IDL on every pass.

mod extract;
mod marker;

pub use marker::{Marker, MarkerSyntax, RegionKey};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::diagnostic::CompilerError;

/// Captured region contents of one prior artifact.
///
/// Built once per generation pass and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMap {
    regions: BTreeMap<RegionKey, String>,
}

impl RegionMap {
    /// A map for an artifact that does not exist yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extracts regions from the text of a prior artifact.
    ///
    /// `functions` is the set of function names the current pass emits;
    /// regions of functions outside that set are dropped.
    pub fn extract(
        text: &str,
        syntax: MarkerSyntax,
        functions: &[String],
        path: &Path,
    ) -> Result<Self, CompilerError> {
        let mut regions = extract::scan_regions(text, syntax, path)?;
        extract::check_required(&regions, path)?;

        let current: BTreeSet<&str> = functions.iter().map(String::as_str).collect();
        for name in extract::stale_functions(&regions, &current) {
            warn!(path = %path.display(), function = %name, "dropping region of removed function");
            regions.remove(&RegionKey::Function(name));
        }

        debug!(path = %path.display(), regions = regions.len(), "extracted regions");
        Ok(Self { regions })
    }

    /// Extracts regions from the file at `path`; a missing file yields an empty map.
    pub fn from_path(
        path: &Path,
        syntax: MarkerSyntax,
        functions: &[String],
    ) -> Result<Self, CompilerError> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| CompilerError::io(path, e.to_string()))?;
        Self::extract(&text, syntax, functions, path)
    }

    /// Captured content for `key`; empty when nothing was captured.
    pub fn get(&self, key: &RegionKey) -> &str {
        self.regions.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.regions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Renders `key`'s region: begin marker, captured content, end marker.
    /// Markers are indented by `indent`; the content is written untouched.
    pub fn render(&self, key: &RegionKey, syntax: MarkerSyntax, indent: &str) -> String {
        format!(
            "{indent}{}\n{}{indent}{}\n",
            syntax.begin(key),
            self.get(key),
            syntax.end(key),
        )
    }
}

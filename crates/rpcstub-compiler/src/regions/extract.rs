//! Line-oriented scanner that captures marker-delimited regions.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::diagnostic::CompilerError;
use super::marker::{Marker, MarkerSyntax, RegionKey};

enum ScanState {
    Outside,
    Inside {
        key: RegionKey,
        line: usize,
        content: String,
    },
}

/// Scans `text` and returns the content of every region, verbatim.
///
/// CRLF line endings are normalized to LF before scanning. `path` is only
/// used in error messages.
pub fn scan_regions(
    text: &str,
    syntax: MarkerSyntax,
    path: &Path,
) -> Result<BTreeMap<RegionKey, String>, CompilerError> {
    let normalized = text.replace("\r\n", "\n");
    let mut captured: BTreeMap<RegionKey, String> = BTreeMap::new();
    let mut state = ScanState::Outside;

    for (index, raw_line) in normalized.split_inclusive('\n').enumerate() {
        let line_no = index + 1;
        let marker = syntax.parse(raw_line.trim_end_matches('\n'));

        state = match (state, marker) {
            (ScanState::Outside, None) => ScanState::Outside,
            (ScanState::Outside, Some(Marker::Begin(key))) => {
                if captured.contains_key(&key) {
                    return Err(CompilerError::DuplicateRegion {
                        path: path.to_path_buf(),
                        region: key.to_string(),
                        line: line_no,
                    });
                }
                ScanState::Inside {
                    key,
                    line: line_no,
                    content: String::new(),
                }
            }
            (ScanState::Outside, Some(Marker::End(key))) => {
                return Err(CompilerError::UnmatchedRegionEnd {
                    path: path.to_path_buf(),
                    region: key.to_string(),
                    line: line_no,
                });
            }
            (ScanState::Inside { key, line, mut content }, None) => {
                content.push_str(raw_line);
                ScanState::Inside { key, line, content }
            }
            (ScanState::Inside { key, content, .. }, Some(Marker::End(end))) if end == key => {
                captured.insert(key, content);
                ScanState::Outside
            }
            (ScanState::Inside { .. }, Some(Marker::End(end))) => {
                return Err(CompilerError::UnmatchedRegionEnd {
                    path: path.to_path_buf(),
                    region: end.to_string(),
                    line: line_no,
                });
            }
            (ScanState::Inside { key, .. }, Some(Marker::Begin(inner))) => {
                return Err(CompilerError::NestedRegion {
                    path: path.to_path_buf(),
                    outer: key.to_string(),
                    inner: inner.to_string(),
                    line: line_no,
                });
            }
        };
    }

    if let ScanState::Inside { key, line, .. } = state {
        return Err(CompilerError::UnterminatedRegion {
            path: path.to_path_buf(),
            region: key.to_string(),
            line,
        });
    }

    Ok(captured)
}

/// Fails on the first required region that `captured` lacks.
pub fn check_required(
    captured: &BTreeMap<RegionKey, String>,
    path: &Path,
) -> Result<(), CompilerError> {
    match RegionKey::REQUIRED.iter().find(|key| !captured.contains_key(key)) {
        Some(missing) => Err(CompilerError::MissingRegion {
            path: path.to_path_buf(),
            region: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Function regions whose function is not in `functions`.
pub fn stale_functions(
    captured: &BTreeMap<RegionKey, String>,
    functions: &BTreeSet<&str>,
) -> Vec<String> {
    captured
        .keys()
        .filter_map(|key| match key {
            RegionKey::Function(name) if !functions.contains(name.as_str()) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

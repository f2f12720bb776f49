//! Stub emission from the resolved type graph and function signatures.
//!
//! For each target the emitter renders, per IDL module:
//! - a client exposing one callable per function, shaped by the calling convention
//! - an implementation skeleton with marker-delimited regions for hand-written code
//! - a server dispatcher (Python only, when enabled)
//!
//! plus one shared types file holding every generated class and one generic
//! container per tuple arity.
//!
//! Prior implementation files are read through the region extractor before
//! anything is rendered, and nothing is written here: the caller receives the
//! complete [`GeneratedCode`] and writes it only once every artifact rendered.

mod python;
mod typescript;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::config::{CallingConvention, CompilerConfig, PollConfig, ServiceInfo, Target};
use crate::diagnostic::CompilerError;
use crate::naming::{to_pascal_case, to_snake_case};
use crate::regions::{MarkerSyntax, RegionMap};
use crate::resolve::ResolvedDocument;

/// Generated source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Path relative to the output directory, and content.
    pub files: Vec<(String, String)>,
}

impl GeneratedCode {
    /// Content of the file at `filename`, if generated.
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, content)| content.as_str())
    }
}

/// Generation settings shared by all targets.
#[derive(Debug, Clone)]
pub struct EmitContext<'a> {
    pub document: &'a ResolvedDocument,
    pub convention: CallingConvention,
    /// Version pin baked into clients as their default.
    pub service_ver: Option<String>,
    pub url: Option<&'a str>,
    pub poll: PollConfig,
    pub emit_server: bool,
    pub service: &'a ServiceInfo,
}

impl<'a> EmitContext<'a> {
    pub fn new(document: &'a ResolvedDocument, config: &'a CompilerConfig) -> Self {
        Self {
            document,
            convention: config.convention,
            service_ver: config.effective_service_ver(),
            url: config.url.as_deref(),
            poll: config.poll,
            emit_server: config.emit_server,
            service: &config.service,
        }
    }
}

/// Path, relative to the output directory, of a module's implementation file.
pub fn impl_path(target: Target, module: &str) -> String {
    match target {
        Target::Python => format!("python/{}_impl.py", to_snake_case(module)),
        Target::TypeScript => format!("typescript/{}Impl.ts", to_pascal_case(module)),
    }
}

/// Region marker syntax of a target's implementation files.
pub fn marker_syntax(target: Target) -> MarkerSyntax {
    match target {
        Target::Python => MarkerSyntax::PYTHON,
        Target::TypeScript => MarkerSyntax::TYPESCRIPT,
    }
}

/// Extracts the regions of every module's prior implementation file.
pub fn load_prior_regions(
    document: &ResolvedDocument,
    target: Target,
    out_dir: &Path,
) -> Result<BTreeMap<String, RegionMap>, CompilerError> {
    let syntax = marker_syntax(target);
    document
        .modules
        .iter()
        .map(|module| {
            let path = out_dir.join(impl_path(target, &module.module));
            let regions = RegionMap::from_path(&path, syntax, &module.function_names())?;
            Ok((module.module.clone(), regions))
        })
        .collect()
}

/// Renders every artifact of every target.
pub fn generate(
    document: &ResolvedDocument,
    config: &CompilerConfig,
    targets: &[Target],
) -> Result<GeneratedCode, CompilerError> {
    let ctx = EmitContext::new(document, config);
    let mut files = Vec::new();

    for &target in targets {
        let regions = load_prior_regions(document, target, &config.out_dir)?;
        let rendered = render_target(&ctx, target, &regions);
        debug!(target = %target, files = rendered.len(), "rendered target");
        files.extend(rendered);
    }

    Ok(GeneratedCode { files })
}

/// Renders one target against already extracted regions.
pub fn render_target(
    ctx: &EmitContext<'_>,
    target: Target,
    regions: &BTreeMap<String, RegionMap>,
) -> Vec<(String, String)> {
    match target {
        Target::Python => python::generate(ctx, regions),
        Target::TypeScript => typescript::generate(ctx, regions),
    }
}

/// Member names of one generated class.
///
/// Seeded with the members the class always defines; every function method
/// is allocated against it so that no IDL name can shadow a helper.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemberNames {
    taken: BTreeSet<String>,
}

impl MemberNames {
    pub(crate) fn new(fixed: &[&str]) -> Self {
        Self {
            taken: fixed.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Returns `base`, with `_` appended until it names no other member.
    pub(crate) fn allocate(&mut self, base: String) -> String {
        let mut name = base;
        while self.taken.contains(&name) {
            name.push('_');
        }
        self.taken.insert(name.clone());
        name
    }
}

/// Non-empty comment lines with trailing whitespace removed.
fn comment_lines(comment: &str) -> Vec<&str> {
    let lines: Vec<&str> = comment.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).map_or(start, |i| i + 1);
    lines[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impl_paths() {
        assert_eq!(impl_path(Target::Python, "GenomeTools"), "python/genome_tools_impl.py");
        assert_eq!(impl_path(Target::TypeScript, "genome_tools"), "typescript/GenomeToolsImpl.ts");
    }

    #[test]
    fn test_member_names_skip_taken() {
        let mut members = MemberNames::new(&["call", "call_"]);
        assert_eq!(members.allocate("add".to_string()), "add");
        assert_eq!(members.allocate("call".to_string()), "call__");
        assert_eq!(members.allocate("add".to_string()), "add_");
    }

    #[test]
    fn test_comment_lines_trims_blank_edges() {
        assert_eq!(comment_lines("\n  \nAdds.\n\n  Two ints.  \n\n"), vec!["Adds.", "", "  Two ints."]);
        assert!(comment_lines("").is_empty());
    }
}

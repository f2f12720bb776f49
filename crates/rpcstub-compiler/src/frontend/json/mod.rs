//! JSON syntax tree frontend.

pub mod ast;
pub mod to_ir;

use std::path::Path;

use crate::diagnostic::CompilerError;
use crate::ir::IdlDocument;
use super::Frontend;
use ast::RawDocument;

/// Loads the JSON syntax tree written by the IDL parser.
#[derive(Debug, Default)]
pub struct JsonFrontend;

impl JsonFrontend {
    pub fn new() -> Self {
        Self
    }

    /// Parses a syntax tree held in memory. `path` is used for diagnostics only.
    pub fn load_str(&self, source: &str, path: &Path) -> Result<IdlDocument, CompilerError> {
        let raw: RawDocument =
            serde_json::from_str(source).map_err(|e| CompilerError::SyntaxTreeLoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        to_ir::to_ir(raw, path.to_path_buf())
    }
}

impl Frontend for JsonFrontend {
    fn format(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn load(&self, path: &Path) -> Result<IdlDocument, CompilerError> {
        let source = std::fs::read_to_string(path).map_err(|e| CompilerError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.load_str(&source, path)
    }
}

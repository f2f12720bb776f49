//! Frontends that load a parsed IDL syntax tree into IR.
//!
//! The IDL lexer and parser live outside this crate. A frontend reads the
//! parser's output in some interchange format and converts it into the
//! common IR, so the resolver and emitters never see the raw format.

pub mod json;

use std::path::Path;
use crate::diagnostic::CompilerError;
use crate::ir::IdlDocument;

/// Trait for syntax tree frontends.
pub trait Frontend {
    /// Returns the interchange format name (e.g., "json").
    fn format(&self) -> &str;

    /// Returns file extensions this frontend handles (e.g., ["json"]).
    fn extensions(&self) -> &[&str];

    /// Loads the syntax tree stored at `path`.
    fn load(&self, path: &Path) -> Result<IdlDocument, CompilerError>;
}

/// Creates a frontend for the given interchange format.
pub fn create_frontend(format: &str) -> Result<Box<dyn Frontend>, CompilerError> {
    match format {
        "json" => Ok(Box::new(json::JsonFrontend::new())),
        _ => Err(CompilerError::UnsupportedFormat {
            format: format.to_string(),
        }),
    }
}

//! # rpcstub Compiler
//!
//! This crate compiles a parsed IDL document describing a remote-procedure-call
//! service into client and server scaffolding for several target ecosystems,
//! and regenerates that scaffolding without destroying hand-written code.
//!
//! ## Supported Targets
//!
//! - Python
//! - TypeScript
//!
//! ## Architecture
//!
//! ```text
//! Syntax tree (JSON)
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Frontend   │  Interchange format loading
//! │ (JSON → IR)  │
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Resolve    │  Type graph + function signatures
//! │    (IR)      │
//! └──────┬───────┘
//!        │                ┌──────────────┐
//!        ▼                │   Regions    │  Hand-written code from
//! ┌──────────────┐ ◄──────│ (prior impl) │  the previous pass
//! │   Codegen    │        └──────────────┘
//! │ (→ targets)  │
//! └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpcstub_compiler::{Compiler, CompilerConfig};
//!
//! let config = CompilerConfig {
//!     idl_path: "calc.json".into(),
//!     out_dir: "lib".into(),
//!     targets: vec!["python".to_string(), "typescript".to_string()],
//!     ..CompilerConfig::default()
//! };
//!
//! let compiler = Compiler::new(config);
//! compiler.compile()?;
//! ```

pub mod config;
pub mod frontend;
pub mod ir;
pub mod naming;
pub mod resolve;
pub mod signature;
pub mod regions;
pub mod codegen;
pub mod diagnostic;

use tracing::{debug, info};

pub use config::{CallingConvention, CompilerConfig, PollConfig, ServiceInfo, Target};
pub use diagnostic::CompilerError;

/// The main compiler struct that orchestrates the compilation pipeline.
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Creates a new compiler with the given configuration.
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles the IDL document into stubs for every configured target.
    ///
    /// This runs the full pipeline:
    /// 1. Validate configuration and the output directory
    /// 2. Load the syntax tree through the configured frontend
    /// 3. Resolve the type graph and function signatures
    /// 4. Extract regions from prior implementation files and render all artifacts
    /// 5. Write output files
    ///
    /// Any error before step 5 leaves every existing file untouched.
    pub fn compile(&self) -> Result<CompileResult, CompilerError> {
        let targets = self.config.validate()?;
        self.config.check_output_writable()?;

        let (resolved, generated) = self.render(&targets)?;
        self.write_output(&generated)?;

        let result = CompileResult::new(&resolved, &generated);
        info!(
            modules = result.modules,
            functions = result.functions,
            types = result.types,
            files = result.files,
            "compiled"
        );
        Ok(result)
    }

    /// Runs every step of [`Compiler::compile`] except writing.
    ///
    /// Prior implementation files are still scanned, so an artifact that
    /// could not be merged is reported here too.
    pub fn check(&self) -> Result<CompileResult, CompilerError> {
        let targets = self.config.validate()?;
        let (resolved, generated) = self.render(&targets)?;
        Ok(CompileResult::new(&resolved, &generated))
    }

    fn render(
        &self,
        targets: &[Target],
    ) -> Result<(resolve::ResolvedDocument, codegen::GeneratedCode), CompilerError> {
        let frontend = frontend::create_frontend(&self.config.format)?;
        let document = frontend.load(&self.config.idl_path)?;
        debug!(
            path = %self.config.idl_path.display(),
            modules = document.modules.len(),
            "loaded syntax tree"
        );

        let resolved = resolve::resolve_document(&document)?;
        let generated = codegen::generate(&resolved, &self.config, targets)?;
        Ok((resolved, generated))
    }

    /// Writes generated code to the output directory.
    fn write_output(&self, generated: &codegen::GeneratedCode) -> Result<(), CompilerError> {
        for (filename, content) in &generated.files {
            let path = self.config.out_dir.join(filename);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CompilerError::UnwritableOutput {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
            std::fs::write(&path, content).map_err(|e| CompilerError::UnwritableOutput {
                path: path.clone(),
                message: e.to_string(),
            })?;
            debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
        }

        Ok(())
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    /// Number of IDL modules compiled.
    pub modules: usize,
    /// Number of remote functions across all modules.
    pub functions: usize,
    /// Number of generated classes.
    pub types: usize,
    /// Distinct tuple arities, ascending.
    pub tuple_arities: Vec<usize>,
    /// Number of files written (or that would be written).
    pub files: usize,
}

impl CompileResult {
    fn new(resolved: &resolve::ResolvedDocument, generated: &codegen::GeneratedCode) -> Self {
        Self {
            modules: resolved.modules.len(),
            functions: resolved.function_count(),
            types: resolved.graph.type_count(),
            tuple_arities: resolved.graph.tuple_arities().collect(),
            files: generated.files.len(),
        }
    }
}

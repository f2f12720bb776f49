//! Compiler error types.
#![allow(unused_assignments)]

use std::path::PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur during compilation.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug)]
pub enum CompilerError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to access '{}': {message}", path.display())]
    #[diagnostic(code(rpcstub::io::access_failed))]
    IoError {
        path: PathBuf,
        message: String,
    },

    // =========================================================================
    // Syntax Tree Errors
    // =========================================================================
    #[error("Failed to load syntax tree '{}': {message}", path.display())]
    #[diagnostic(
        code(rpcstub::frontend::load_failed),
        help("The input must be the JSON syntax tree produced by the IDL parser")
    )]
    SyntaxTreeLoadFailed {
        path: PathBuf,
        message: String,
    },

    #[error("Unknown type shape '{kind}' in {context}")]
    #[diagnostic(
        code(rpcstub::resolve::unknown_shape),
        help("Known shapes are: int, float, string, list, mapping, tuple, structure, typedef, UnspecifiedObject")
    )]
    UnknownTypeShape {
        kind: String,
        context: String,
    },

    #[error("Unknown type reference: {module}.{name} (used in {context})")]
    #[diagnostic(code(rpcstub::resolve::unknown_reference))]
    UnknownTypeReference {
        module: String,
        name: String,
        context: String,
    },

    #[error("Duplicate typedef {module}.{name}")]
    #[diagnostic(code(rpcstub::resolve::duplicate_typedef))]
    DuplicateTypedef {
        module: String,
        name: String,
    },

    #[error("Duplicate function {module}.{name}")]
    #[diagnostic(
        code(rpcstub::resolve::duplicate_function),
        help("Function names must be unique within a module; each one owns a region in the implementation file")
    )]
    DuplicateFunction {
        module: String,
        name: String,
    },

    // =========================================================================
    // Resolution Errors
    // =========================================================================
    #[error("Typedef cycle without a structure boundary: {chain}")]
    #[diagnostic(
        code(rpcstub::resolve::alias_cycle),
        help("A typedef may only refer back to itself through a structure field")
    )]
    AliasCycle {
        chain: String,
    },

    #[error("Invalid tuple arity {arity} in {context}")]
    #[diagnostic(
        code(rpcstub::resolve::invalid_arity),
        help("Tuples and multi-value returns must carry at least one element")
    )]
    InvalidTupleArity {
        arity: usize,
        context: String,
    },

    #[error("Ambiguous tuple element name '{name}' in {context}")]
    #[diagnostic(
        code(rpcstub::resolve::ambiguous_tuple_element),
        help("Tuple element names must be unique within one tuple")
    )]
    AmbiguousTupleElement {
        name: String,
        context: String,
    },

    #[error("Structure in {context} is not declared through a typedef")]
    #[diagnostic(
        code(rpcstub::resolve::anonymous_struct),
        help("Declare the structure with `typedef structure {{ ... }} Name;` and refer to it by name")
    )]
    AnonymousStruct {
        context: String,
    },

    #[error("Types {first} and {second} both derive the generated name '{name}'")]
    #[diagnostic(
        code(rpcstub::resolve::name_collision),
        help("Rename one of the typedefs so their generated class names differ")
    )]
    DerivedNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Typedef {typedef} derives the class name '{name}', which the generated stubs already define")]
    #[diagnostic(
        code(rpcstub::resolve::reserved_name),
        help("Rename the typedef; tuple containers, runtime types and module client/implementation classes share its namespace")
    )]
    ReservedClassName {
        name: String,
        typedef: String,
    },

    // =========================================================================
    // Round-trip Errors
    // =========================================================================
    #[error("Missing header in prior artifact '{}': region {region} not found", path.display())]
    #[diagnostic(
        code(rpcstub::regions::missing_region),
        help("Restore the BEGIN/END marker lines for this region; regeneration will not overwrite the file without them")
    )]
    MissingRegion {
        path: PathBuf,
        region: String,
    },

    #[error("Region {region} appears more than once in '{}' (line {line})", path.display())]
    #[diagnostic(
        code(rpcstub::regions::duplicate_region),
        help("Each marker-delimited region may occur only once per artifact")
    )]
    DuplicateRegion {
        path: PathBuf,
        region: String,
        line: usize,
    },

    #[error("Region {inner} starts inside region {outer} in '{}' (line {line})", path.display())]
    #[diagnostic(
        code(rpcstub::regions::nested_region),
        help("Regions cannot be nested; close the outer region first")
    )]
    NestedRegion {
        path: PathBuf,
        outer: String,
        inner: String,
        line: usize,
    },

    #[error("End marker for region {region} has no matching begin marker in '{}' (line {line})", path.display())]
    #[diagnostic(code(rpcstub::regions::unmatched_end))]
    UnmatchedRegionEnd {
        path: PathBuf,
        region: String,
        line: usize,
    },

    #[error("Region {region} opened at line {line} is never closed in '{}'", path.display())]
    #[diagnostic(code(rpcstub::regions::unterminated_region))]
    UnterminatedRegion {
        path: PathBuf,
        region: String,
        line: usize,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Unsupported target: {target}")]
    #[diagnostic(
        code(rpcstub::config::unsupported_target),
        help("Supported targets are: python, typescript")
    )]
    UnsupportedTarget {
        target: String,
    },

    #[error("Unsupported syntax tree format: {format}")]
    #[diagnostic(code(rpcstub::config::unsupported_format))]
    UnsupportedFormat {
        format: String,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(rpcstub::config::invalid))]
    InvalidConfig {
        message: String,
    },

    #[error("Output path '{}' is not writable: {message}", path.display())]
    #[diagnostic(code(rpcstub::config::unwritable_output))]
    UnwritableOutput {
        path: PathBuf,
        message: String,
    },
}

impl CompilerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from reading a prior artifact's regions.
    pub fn is_round_trip(&self) -> bool {
        matches!(
            self,
            Self::MissingRegion { .. }
                | Self::DuplicateRegion { .. }
                | Self::NestedRegion { .. }
                | Self::UnmatchedRegionEnd { .. }
                | Self::UnterminatedRegion { .. }
        )
    }
}

//! Type graph resolution for a whole IDL document.

mod graph;
mod resolver;

pub use graph::{
    GeneratedType, ResolvedField, ResolvedShape, ResolvedType, TupleSlot, TypeGraph, TypeId,
};
pub use resolver::Resolver;

use tracing::info;

use crate::diagnostic::CompilerError;
use crate::ir::IdlDocument;
use crate::naming::to_pascal_case;
use crate::signature::{build_signatures, ModuleSignatures};

/// Everything the emitters need: the type graph plus per-module signatures.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub graph: TypeGraph,
    pub modules: Vec<ModuleSignatures>,
}

impl ResolvedDocument {
    pub fn function_count(&self) -> usize {
        self.modules.iter().map(|m| m.functions.len()).sum()
    }
}

/// Resolves every typedef and every function signature in the document.
///
/// Any resolution error aborts the whole document.
pub fn resolve_document(document: &IdlDocument) -> Result<ResolvedDocument, CompilerError> {
    let table = document.typedef_table()?;
    let mut resolver = Resolver::new(&table);
    for module in &document.modules {
        let pascal = to_pascal_case(&module.name);
        resolver.reserve_class_name(module.name.clone());
        resolver.reserve_class_name(format!("{}Client", module.name));
        resolver.reserve_class_name(format!("{}Client", pascal));
        resolver.reserve_class_name(format!("{}Impl", pascal));
    }

    for module in &document.modules {
        for typedef in module.typedefs() {
            let context = format!("typedef {}", typedef.reference());
            resolver.resolve_typedef(&typedef.reference(), &context)?;
        }
    }

    let modules = document
        .modules
        .iter()
        .map(|module| build_signatures(module, &mut resolver))
        .collect::<Result<Vec<_>, _>>()?;

    let graph = resolver.finish();
    info!(
        modules = modules.len(),
        types = graph.type_count(),
        tuple_arities = graph.tuple_arities().count(),
        "resolved document"
    );

    Ok(ResolvedDocument { graph, modules })
}

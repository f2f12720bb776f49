//! Type resolution: IDL type nodes to canonical resolved types.
//!
//! Resolution unwinds typedef chains, resolves nested shapes, and collects
//! every structure into the [`TypeGraph`] exactly once. Structures are the
//! only recursion boundary: a structure that is already generated (or is
//! being generated further up the stack) is referenced by its [`TypeId`]
//! instead of being resolved again.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::diagnostic::CompilerError;
use crate::ir::{IdlType, StructType, TupleElement, TypedefDecl, TypedefRef, TypedefTable};
use crate::naming::to_pascal_case;
use super::graph::{
    GeneratedType, ResolvedField, ResolvedShape, ResolvedType, TupleSlot, TypeGraph, TypeId,
};

/// Names the emitters define next to the generated classes in the same
/// namespace: type and runtime names of the shared types files and clients,
/// and the typing imports they rely on.
const EMITTED_NAMES: &[&str] = &[
    "AbortSignal", "Any", "Array", "BaseHTTPRequestHandler", "Callable", "CallContext",
    "ClientOptions", "Dict", "Dispatcher", "Error", "Generic", "JSONRPCError", "JobCancelled",
    "JobCancelledError", "JobRegistry", "JobState", "List", "Optional", "Promise", "Record",
    "ServerError", "ServiceStatus", "ThreadingHTTPServer", "Tuple", "TypeVar",
];

/// Whether `name` is emitted by the stub generator itself: a fixed runtime
/// name, a `TupleN` container or a `TN` type variable.
fn is_emitted_name(name: &str) -> bool {
    let numbered = |prefix: &str| {
        name.strip_prefix(prefix)
            .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    };
    EMITTED_NAMES.contains(&name) || numbered("Tuple") || numbered("T")
}

/// Resolves IDL types against a typedef table, accumulating a [`TypeGraph`].
pub struct Resolver<'a> {
    table: &'a TypedefTable<'a>,
    graph: TypeGraph,
    /// Structures whose fields are currently being resolved.
    in_progress: BTreeSet<TypeId>,
    /// Typedefs entered since the last structure boundary.
    active: Vec<TypedefRef>,
    /// Derived class name to the typedef that claimed it.
    class_names: BTreeMap<String, TypedefRef>,
    /// Per-module class names (clients, implementations).
    reserved: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a TypedefTable<'a>) -> Self {
        Self {
            table,
            graph: TypeGraph::new(),
            in_progress: BTreeSet::new(),
            active: Vec::new(),
            class_names: BTreeMap::new(),
            reserved: BTreeSet::new(),
        }
    }

    /// Keeps `name` out of the derived class names.
    pub fn reserve_class_name(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Resolves one type node. `default_module` is the module the type
    /// belongs to when no typedef says otherwise; `context` names the place
    /// of use for error messages.
    pub fn resolve(
        &mut self,
        typ: &IdlType,
        default_module: &str,
        context: &str,
    ) -> Result<ResolvedType, CompilerError> {
        self.resolve_with_chain(typ, default_module, Vec::new(), context)
    }

    /// Resolves the typedef `reference` itself.
    pub fn resolve_typedef(
        &mut self,
        reference: &TypedefRef,
        context: &str,
    ) -> Result<ResolvedType, CompilerError> {
        self.resolve_with_chain(
            &IdlType::Typedef(reference.clone()),
            &reference.module,
            Vec::new(),
            context,
        )
    }

    /// Builds a tuple over already resolved values and registers its arity.
    pub fn synthesize_tuple(
        &mut self,
        slots: Vec<TupleSlot>,
        module: &str,
        context: &str,
    ) -> Result<ResolvedType, CompilerError> {
        self.graph.register_arity(slots.len(), context)?;
        Ok(ResolvedType {
            module: module.to_string(),
            alias_chain: Vec::new(),
            shape: ResolvedShape::Tuple(slots),
        })
    }

    /// Read access to what has been accumulated so far.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Consumes the resolver and returns the accumulated graph.
    pub fn finish(self) -> TypeGraph {
        self.graph
    }

    fn resolve_with_chain(
        &mut self,
        typ: &IdlType,
        module: &str,
        mut chain: Vec<TypedefRef>,
        context: &str,
    ) -> Result<ResolvedType, CompilerError> {
        let shape = match typ {
            IdlType::Typedef(reference) => {
                if self.active.contains(reference) {
                    let mut cycle: Vec<String> = self.active.iter().map(|r| r.to_string()).collect();
                    cycle.push(reference.to_string());
                    return Err(CompilerError::AliasCycle {
                        chain: cycle.join(" -> "),
                    });
                }
                let decl = self.lookup(reference, context)?;
                chain.push(reference.clone());

                if let IdlType::Struct(body) = &decl.alias {
                    return self.resolve_struct(decl, body, chain);
                }

                self.active.push(reference.clone());
                let resolved = self.resolve_with_chain(&decl.alias, &decl.module, chain, context);
                self.active.pop();
                return resolved;
            }
            IdlType::Struct(_) => {
                return Err(CompilerError::AnonymousStruct {
                    context: context.to_string(),
                });
            }
            IdlType::Scalar(kind) => ResolvedShape::Scalar(*kind),
            IdlType::UnspecifiedObject => ResolvedShape::UnspecifiedObject,
            IdlType::List(element) => {
                let element = self.resolve_with_chain(element, module, Vec::new(), context)?;
                ResolvedShape::List(Box::new(element))
            }
            IdlType::Mapping(key, value) => {
                let key = self.resolve_with_chain(key, module, Vec::new(), context)?;
                let value = self.resolve_with_chain(value, module, Vec::new(), context)?;
                ResolvedShape::Mapping(Box::new(key), Box::new(value))
            }
            IdlType::Tuple(elements) => {
                let slots = self.resolve_tuple(elements, module, context)?;
                self.graph.register_arity(slots.len(), context)?;
                ResolvedShape::Tuple(slots)
            }
        };

        Ok(ResolvedType {
            module: module.to_string(),
            alias_chain: chain,
            shape,
        })
    }

    fn resolve_tuple(
        &mut self,
        elements: &[TupleElement],
        module: &str,
        context: &str,
    ) -> Result<Vec<TupleSlot>, CompilerError> {
        let mut seen = HashSet::new();
        for name in elements.iter().filter_map(|e| e.name.as_deref()) {
            if !seen.insert(name) {
                return Err(CompilerError::AmbiguousTupleElement {
                    name: name.to_string(),
                    context: context.to_string(),
                });
            }
        }

        elements
            .iter()
            .map(|e| {
                Ok(TupleSlot {
                    name: e.name.clone(),
                    typ: self.resolve_with_chain(&e.typ, module, Vec::new(), context)?,
                })
            })
            .collect()
    }

    fn resolve_struct(
        &mut self,
        decl: &TypedefDecl,
        body: &StructType,
        chain: Vec<TypedefRef>,
    ) -> Result<ResolvedType, CompilerError> {
        let id = TypeId::new(&decl.module, to_pascal_case(&decl.name));
        self.claim_class_name(&id, decl.reference())?;

        if !self.graph.contains_type(&id) && !self.in_progress.contains(&id) {
            self.in_progress.insert(id.clone());
            let outer = std::mem::take(&mut self.active);
            let fields = self.resolve_fields(decl, body);
            self.active = outer;
            self.in_progress.remove(&id);

            debug!(class = %id, fields = body.fields.len(), "generated type");
            self.graph.insert_type(GeneratedType {
                id: id.clone(),
                source: decl.reference(),
                comment: decl.comment.clone(),
                fields: fields?,
            });
        }

        Ok(ResolvedType {
            module: decl.module.clone(),
            alias_chain: chain,
            shape: ResolvedShape::Struct(id),
        })
    }

    fn resolve_fields(
        &mut self,
        decl: &TypedefDecl,
        body: &StructType,
    ) -> Result<Vec<ResolvedField>, CompilerError> {
        body.fields
            .iter()
            .map(|field| {
                let context = format!("{}.{} field {}", decl.module, decl.name, field.name);
                Ok(ResolvedField {
                    name: field.name.clone(),
                    typ: self.resolve_with_chain(&field.typ, &decl.module, Vec::new(), &context)?,
                })
            })
            .collect()
    }

    /// Generated classes share one namespace per target, so two typedefs
    /// may not derive the same class name, even from different modules.
    fn claim_class_name(&mut self, id: &TypeId, source: TypedefRef) -> Result<(), CompilerError> {
        if is_emitted_name(&id.name) || self.reserved.contains(&id.name) {
            return Err(CompilerError::ReservedClassName {
                name: id.name.clone(),
                typedef: source.to_string(),
            });
        }
        match self.class_names.get(&id.name) {
            Some(owner) if *owner != source => Err(CompilerError::DerivedNameCollision {
                name: id.name.clone(),
                first: owner.to_string(),
                second: source.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.class_names.insert(id.name.clone(), source);
                Ok(())
            }
        }
    }

    fn lookup(&self, reference: &TypedefRef, context: &str) -> Result<&'a TypedefDecl, CompilerError> {
        self.table
            .get(reference)
            .ok_or_else(|| CompilerError::UnknownTypeReference {
                module: reference.module.clone(),
                name: reference.name.clone(),
                context: context.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Declaration, ModuleIR, ScalarKind, StructField};

    fn typedef(module: &str, name: &str, alias: IdlType) -> Declaration {
        Declaration::Typedef(TypedefDecl {
            module: module.to_string(),
            name: name.to_string(),
            comment: String::new(),
            alias,
        })
    }

    fn reference(module: &str, name: &str) -> IdlType {
        IdlType::Typedef(TypedefRef::new(module, name))
    }

    fn structure(fields: Vec<(&str, IdlType)>) -> IdlType {
        IdlType::Struct(StructType {
            fields: fields
                .into_iter()
                .map(|(name, typ)| StructField {
                    name: name.to_string(),
                    typ,
                })
                .collect(),
        })
    }

    fn int() -> IdlType {
        IdlType::Scalar(ScalarKind::Int)
    }

    fn string() -> IdlType {
        IdlType::Scalar(ScalarKind::String)
    }

    fn module(name: &str, declarations: Vec<Declaration>) -> ModuleIR {
        let mut module = ModuleIR::new(name);
        module.declarations = declarations;
        module
    }

    #[test]
    fn test_scalars_need_no_class() {
        let modules = vec![module("M", vec![])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let resolved = resolver.resolve(&int(), "M", "test").unwrap();
        assert!(!resolved.needs_class());
        assert!(resolved.internal_types().is_empty());

        let list = resolver
            .resolve(&IdlType::List(Box::new(string())), "M", "test")
            .unwrap();
        assert!(!list.needs_class());
        assert_eq!(list.internal_types().len(), 1);
        assert_eq!(resolver.finish().type_count(), 0);
    }

    #[test]
    fn test_struct_through_alias_chain() {
        let modules = vec![
            module(
                "Genomes",
                vec![typedef("Genomes", "genome", structure(vec![("id", string())]))],
            ),
            module("Tools", vec![typedef("Tools", "input", reference("Genomes", "genome"))]),
        ];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let resolved = resolver
            .resolve(&reference("Tools", "input"), "Tools", "test")
            .unwrap();
        assert!(resolved.needs_class());
        assert_eq!(resolved.module, "Genomes");
        assert_eq!(resolved.class_id(), Some(&TypeId::new("Genomes", "Genome")));
        assert_eq!(
            resolved.describe_aliases().unwrap(),
            "Tools.input -> Genomes.genome"
        );

        let graph = resolver.finish();
        assert_eq!(graph.type_count(), 1);
        let generated = graph.get(&TypeId::new("Genomes", "Genome")).unwrap();
        assert_eq!(generated.fields.len(), 1);
    }

    #[test]
    fn test_struct_deduplicated_across_uses() {
        let modules = vec![module(
            "M",
            vec![typedef("M", "Point", structure(vec![("x", int()), ("y", int())]))],
        )];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        for i in 0..5 {
            let context = format!("use {}", i);
            resolver.resolve(&reference("M", "Point"), "M", &context).unwrap();
            resolver
                .resolve(&IdlType::List(Box::new(reference("M", "Point"))), "M", &context)
                .unwrap();
            resolver
                .resolve(
                    &IdlType::Tuple(vec![
                        TupleElement { name: None, typ: reference("M", "Point") },
                        TupleElement { name: None, typ: string() },
                    ]),
                    "M",
                    &context,
                )
                .unwrap();
        }

        let graph = resolver.finish();
        assert_eq!(graph.type_count(), 1);
        assert_eq!(graph.tuple_arities().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_recursive_struct_resolves_once() {
        let modules = vec![module(
            "Trees",
            vec![typedef(
                "Trees",
                "Node",
                structure(vec![
                    ("label", string()),
                    ("children", IdlType::List(Box::new(reference("Trees", "Node")))),
                ]),
            )],
        )];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        resolver.resolve(&reference("Trees", "Node"), "Trees", "test").unwrap();
        let graph = resolver.finish();

        let node = graph.get(&TypeId::new("Trees", "Node")).unwrap();
        match &node.fields[1].typ.shape {
            ResolvedShape::List(element) => {
                assert_eq!(element.class_id(), Some(&TypeId::new("Trees", "Node")));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let modules = vec![module(
            "M",
            vec![
                typedef("M", "a", reference("M", "b")),
                typedef("M", "b", IdlType::List(Box::new(reference("M", "a")))),
            ],
        )];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let err = resolver.resolve(&reference("M", "a"), "M", "test").unwrap_err();
        match err {
            CompilerError::AliasCycle { chain } => assert_eq!(chain, "M.a -> M.b -> M.a"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_reference() {
        let modules = vec![module("M", vec![])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let err = resolver
            .resolve(&reference("M", "missing"), "M", "function M.f parameter 1")
            .unwrap_err();
        assert!(matches!(err, CompilerError::UnknownTypeReference { .. }));
    }

    #[test]
    fn test_empty_tuple_rejected() {
        let modules = vec![module("M", vec![])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let err = resolver.resolve(&IdlType::Tuple(vec![]), "M", "test").unwrap_err();
        assert!(matches!(err, CompilerError::InvalidTupleArity { arity: 0, .. }));
    }

    #[test]
    fn test_duplicate_tuple_names_rejected() {
        let modules = vec![module("M", vec![])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let tuple = IdlType::Tuple(vec![
            TupleElement { name: Some("x".to_string()), typ: int() },
            TupleElement { name: Some("x".to_string()), typ: int() },
        ]);
        let err = resolver.resolve(&tuple, "M", "test").unwrap_err();
        assert!(matches!(err, CompilerError::AmbiguousTupleElement { .. }));
    }

    #[test]
    fn test_anonymous_struct_rejected() {
        let modules = vec![module("M", vec![])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        let err = resolver
            .resolve(&structure(vec![("x", int())]), "M", "function M.f parameter 1")
            .unwrap_err();
        assert!(matches!(err, CompilerError::AnonymousStruct { .. }));
    }

    #[test]
    fn test_derived_name_collision_across_modules() {
        let modules = vec![
            module("A", vec![typedef("A", "Result", structure(vec![("x", int())]))]),
            module("B", vec![typedef("B", "result", structure(vec![("y", int())]))]),
        ];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);

        resolver.resolve(&reference("A", "Result"), "A", "test").unwrap();
        let err = resolver.resolve(&reference("B", "result"), "B", "test").unwrap_err();
        match err {
            CompilerError::DerivedNameCollision { name, first, second } => {
                assert_eq!(name, "Result");
                assert_eq!(first, "A.Result");
                assert_eq!(second, "B.result");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_emitted_names_are_not_claimable() {
        for (name, class) in [("tuple2", "Tuple2"), ("service_status", "ServiceStatus"), ("t1", "T1")] {
            let modules = vec![module("M", vec![typedef("M", name, structure(vec![("x", int())]))])];
            let table = TypedefTable::build(&modules).unwrap();
            let mut resolver = Resolver::new(&table);

            match resolver.resolve(&reference("M", name), "M", "test").unwrap_err() {
                CompilerError::ReservedClassName { name: claimed, typedef } => {
                    assert_eq!(claimed, class);
                    assert_eq!(typedef, format!("M.{}", name));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(!is_emitted_name("Tuple"));
        assert!(!is_emitted_name("Tuplet"));
        assert!(is_emitted_name("Tuple12"));
    }

    #[test]
    fn test_reserved_module_class_name() {
        let modules = vec![module("Calc", vec![typedef("Calc", "calc_client", structure(vec![("x", int())]))])];
        let table = TypedefTable::build(&modules).unwrap();
        let mut resolver = Resolver::new(&table);
        resolver.reserve_class_name("CalcClient");

        let err = resolver.resolve(&reference("Calc", "calc_client"), "Calc", "test").unwrap_err();
        assert!(matches!(err, CompilerError::ReservedClassName { .. }));
    }
}

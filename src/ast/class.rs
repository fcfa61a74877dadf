//! Class and module nodes, and the per-class queue of pending transforms.

use super::{
    AnnotationId, ClassId, FieldId, MethodId, ModuleId, Modifiers, PropertyId, SourcePos, Stmt,
    TypeRef,
};
use crate::compiler::CompilePhase;
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, HashSet};

/// The top-level AST of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub name: String,
    pub package: Option<String>,
    /// Insertion order is significant: classes added by transformations are
    /// appended and become visible to later phases.
    pub classes: Vec<ClassId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub fields: Vec<FieldId>,
    pub properties: Vec<PropertyId>,
    pub methods: Vec<MethodId>,
    pub constructors: Vec<MethodId>,
    pub annotations: Vec<AnnotationId>,
    pub object_initializers: Vec<Stmt>,
    pub static_initializers: Vec<Stmt>,
    pub outer: Option<ClassId>,
    pub module: ModuleId,
    pub script: bool,
    pub pos: SourcePos,
    pub transforms: PendingTransforms,
}

impl ClassNode {
    pub fn new(name: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            name: name.into(),
            modifiers,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            annotations: Vec::new(),
            object_initializers: Vec::new(),
            static_initializers: Vec::new(),
            outer: None,
            module: ModuleId(0),
            script: false,
            pos: SourcePos::default(),
            transforms: PendingTransforms::default(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.modifiers.is_interface()
    }

    pub fn is_annotation_type(&self) -> bool {
        self.modifiers.contains(Modifiers::ANNOTATION)
    }

    pub fn is_enum(&self) -> bool {
        self.modifiers.contains(Modifiers::ENUM)
    }

    pub fn simple_name(&self) -> &str {
        super::types::simple_name(&self.name)
    }

    /// Name with `$` separators turned into `_`, package dots too.
    pub fn mangled_name(&self) -> String {
        self.name.replace(['.', '$'], "_")
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.name.clone())
    }

    pub fn implements(&self, ty: &TypeRef) -> bool {
        self.interfaces.iter().any(|i| i.is(ty))
    }
}

/// Phase → (transformation class → annotation uses) queue attached to a class.
///
/// The dispatcher for a phase drains that phase's entry with
/// [`PendingTransforms::take_phase`]; every drained pair is remembered so it
/// cannot be registered, and therefore dispatched, again for that phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingTransforms {
    pending: BTreeMap<CompilePhase, IndexMap<String, IndexSet<AnnotationId>>>,
    dispatched: HashSet<(CompilePhase, String, AnnotationId)>,
}

impl PendingTransforms {
    /// Queues a pair. Returns false if it was already queued or already
    /// dispatched for that phase.
    pub fn register(&mut self, phase: CompilePhase, transform: &str, annotation: AnnotationId) -> bool {
        if self
            .dispatched
            .contains(&(phase, transform.to_string(), annotation))
        {
            return false;
        }
        self.pending
            .entry(phase)
            .or_default()
            .entry(transform.to_string())
            .or_default()
            .insert(annotation)
    }

    pub fn for_phase(&self, phase: CompilePhase) -> Option<&IndexMap<String, IndexSet<AnnotationId>>> {
        self.pending.get(&phase)
    }

    pub fn is_empty_for(&self, phase: CompilePhase) -> bool {
        self.pending.get(&phase).map_or(true, |m| m.is_empty())
    }

    /// Removes and returns the phase's queue, marking every pair dispatched.
    pub fn take_phase(&mut self, phase: CompilePhase) -> IndexMap<String, IndexSet<AnnotationId>> {
        let taken = self.pending.remove(&phase).unwrap_or_default();
        for (transform, annotations) in &taken {
            for annotation in annotations {
                self.dispatched
                    .insert((phase, transform.clone(), *annotation));
            }
        }
        taken
    }

    pub fn was_dispatched(&self, phase: CompilePhase, transform: &str, annotation: AnnotationId) -> bool {
        self.dispatched
            .contains(&(phase, transform.to_string(), annotation))
    }

    /// Phases with queued work.
    pub fn phases(&self) -> impl Iterator<Item = CompilePhase> + '_ {
        self.pending
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(p, _)| *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_phase_drains_and_blocks_reregistration() {
        let mut pending = PendingTransforms::default();
        let anno = AnnotationId(3);
        assert!(pending.register(CompilePhase::Canonicalization, "a.B", anno));
        assert!(!pending.register(CompilePhase::Canonicalization, "a.B", anno));

        let taken = pending.take_phase(CompilePhase::Canonicalization);
        assert_eq!(taken.len(), 1);
        assert!(pending.is_empty_for(CompilePhase::Canonicalization));
        assert!(!pending.register(CompilePhase::Canonicalization, "a.B", anno));
        assert!(pending.register(CompilePhase::ClassGeneration, "a.B", anno));
    }
}

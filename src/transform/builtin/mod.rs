//! # Built-in Transformations
//!
//! Each annotation type `canopy.transform.<Name>` triggers the transformation
//! class `canopy.transform.impl.<Name>Transformation`, registered here with
//! the phase it runs in.

use super::names;
use super::{AnnotationType, AstTransformation, TransformLoader};
use crate::compiler::CompilePhase;

pub mod auto_clone;
pub mod builder;
pub mod canonical;
pub mod delegate;
pub mod equals_hashcode;
pub mod immutable;
pub mod indexed_property;
pub mod interrupt;
pub mod lazy;
pub mod log;
pub mod map_constructor;
pub mod null_check;
pub mod singleton;
pub mod sortable;
pub mod synchronized;
pub mod to_string;
pub mod trait_;
pub mod tuple_constructor;

use CompilePhase::{Canonicalization, SemanticAnalysis};

/// Registers every built-in annotation type and transformation class.
pub fn register_builtin_transforms(loader: &mut TransformLoader) {
    register::<equals_hashcode::EqualsAndHashCodeTransformation>(
        loader,
        names::EQUALS_AND_HASH_CODE,
        Canonicalization,
    );
    register::<to_string::ToStringTransformation>(loader, names::TO_STRING, Canonicalization);
    register::<tuple_constructor::TupleConstructorTransformation>(
        loader,
        names::TUPLE_CONSTRUCTOR,
        Canonicalization,
    );
    register::<map_constructor::MapConstructorTransformation>(
        loader,
        names::MAP_CONSTRUCTOR,
        Canonicalization,
    );
    register::<canonical::CanonicalTransformation>(loader, names::CANONICAL, Canonicalization);
    register::<immutable::ImmutableTransformation>(loader, names::IMMUTABLE, Canonicalization);
    register::<singleton::SingletonTransformation>(loader, names::SINGLETON, Canonicalization);
    register::<builder::BuilderTransformation>(loader, names::BUILDER, SemanticAnalysis);
    register::<trait_::TraitTransformation>(loader, names::TRAIT, SemanticAnalysis);
    register::<interrupt::ThreadInterruptTransformation>(
        loader,
        names::THREAD_INTERRUPT,
        Canonicalization,
    );
    register::<interrupt::TimedInterruptTransformation>(
        loader,
        names::TIMED_INTERRUPT,
        Canonicalization,
    );
    register::<interrupt::ConditionalInterruptTransformation>(
        loader,
        names::CONDITIONAL_INTERRUPT,
        Canonicalization,
    );
    register::<auto_clone::AutoCloneTransformation>(loader, names::AUTO_CLONE, Canonicalization);
    register::<delegate::DelegateTransformation>(loader, names::DELEGATE, Canonicalization);
    register::<log::LogTransformation>(loader, names::LOG, SemanticAnalysis);
    register::<lazy::LazyTransformation>(loader, names::LAZY, SemanticAnalysis);
    register::<synchronized::SynchronizedTransformation>(
        loader,
        names::SYNCHRONIZED,
        SemanticAnalysis,
    );
    register::<indexed_property::IndexedPropertyTransformation>(
        loader,
        names::INDEXED_PROPERTY,
        Canonicalization,
    );
    register::<sortable::SortableTransformation>(loader, names::SORTABLE, Canonicalization);
    register::<null_check::NullCheckTransformation>(loader, names::NULL_CHECK, Canonicalization);

    // Meta-annotations are loadable classes, never transformations.
    loader.register_plain_class(names::AST_TRANSFORMATION_CLASS);
    loader.register_plain_class(names::ANNOTATION_COLLECTOR);
}

fn register<T>(loader: &mut TransformLoader, annotation: &str, phase: CompilePhase)
where
    T: AstTransformation + Default + 'static,
{
    let class = names::transform_class(annotation);
    loader.register_annotation_type(AnnotationType::transforming(annotation, &[&class]));
    loader.register::<T>(&class, phase);
}

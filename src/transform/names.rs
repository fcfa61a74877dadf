//! Well-known class names.

/// Resource path of global transformation service files.
pub const SERVICE_PATH: &str = "META-INF/services/canopy.transform.AstTransformation";

/// Meta-annotation declaring which transformations an annotation type triggers.
pub const AST_TRANSFORMATION_CLASS: &str = "canopy.transform.AstTransformationClass";
/// Meta-annotation marking an annotation type as an alias for others.
pub const ANNOTATION_COLLECTOR: &str = "canopy.transform.AnnotationCollector";

pub const EQUALS_AND_HASH_CODE: &str = "canopy.transform.EqualsAndHashCode";
pub const TO_STRING: &str = "canopy.transform.ToString";
pub const TUPLE_CONSTRUCTOR: &str = "canopy.transform.TupleConstructor";
pub const MAP_CONSTRUCTOR: &str = "canopy.transform.MapConstructor";
pub const CANONICAL: &str = "canopy.transform.Canonical";
pub const IMMUTABLE: &str = "canopy.transform.Immutable";
pub const SINGLETON: &str = "canopy.transform.Singleton";
pub const BUILDER: &str = "canopy.transform.Builder";
pub const TRAIT: &str = "canopy.transform.Trait";
pub const THREAD_INTERRUPT: &str = "canopy.transform.ThreadInterrupt";
pub const TIMED_INTERRUPT: &str = "canopy.transform.TimedInterrupt";
pub const CONDITIONAL_INTERRUPT: &str = "canopy.transform.ConditionalInterrupt";
pub const AUTO_CLONE: &str = "canopy.transform.AutoClone";
pub const DELEGATE: &str = "canopy.transform.Delegate";
pub const LOG: &str = "canopy.transform.Log";
pub const LAZY: &str = "canopy.transform.Lazy";
pub const SYNCHRONIZED: &str = "canopy.transform.Synchronized";
pub const INDEXED_PROPERTY: &str = "canopy.transform.IndexedProperty";
pub const SORTABLE: &str = "canopy.transform.Sortable";
pub const NULL_CHECK: &str = "canopy.transform.NullCheck";

pub const HASH_CODE_HELPER: &str = "canopy.runtime.HashCodeHelper";
pub const INVOKER_HELPER: &str = "canopy.runtime.InvokerHelper";

/// Transformation class implementing the annotation type `annotation`.
pub fn transform_class(annotation: &str) -> String {
    let simple = crate::ast::types::simple_name(annotation);
    format!("canopy.transform.impl.{}Transformation", simple)
}

/// `@Simple` form of an annotation type name, as used in messages.
pub fn at_name(annotation: &str) -> String {
    format!("@{}", crate::ast::types::simple_name(annotation))
}

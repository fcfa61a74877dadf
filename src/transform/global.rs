//! Global transformation discovery.
//!
//! Service files list one transformation class name per line. Each surviving
//! name becomes a unit-wide operation that visits every module at the phase
//! the class declares.

use super::{names, AstTransformation, ClassLoader, LoadError, ResourceLocation};
use crate::ast::SourcePos;
use crate::compiler::CompilePhase;
use crate::config::CompilerConfiguration;
use crate::errors::{ErrorCollector, ErrorKind, WarningCategory};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*(\.[A-Za-z_$][\w$]*)*$").expect("valid regex")
});

/// A discovered, instantiated global transformation.
pub struct GlobalTransform {
    pub name: String,
    pub phase: CompilePhase,
    pub location: ResourceLocation,
    pub transform: Box<dyn AstTransformation>,
}

impl std::fmt::Debug for GlobalTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalTransform")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Class names declared in one service file, comments and blanks removed.
pub fn parse_service_file(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scans every service resource the loader can see.
///
/// Names already in `known` are skipped, so a second scan only picks up
/// additions. Every name examined is added to `known`, whatever the outcome.
pub fn discover(
    loader: &dyn ClassLoader,
    config: &CompilerConfiguration,
    known: &mut IndexSet<String>,
    errors: &mut ErrorCollector,
) -> Vec<GlobalTransform> {
    let mut declared: IndexMap<String, ResourceLocation> = IndexMap::new();
    for location in loader.resources(names::SERVICE_PATH) {
        let text = match loader.read_resource(&location) {
            Ok(text) => text,
            Err(e) => {
                errors.add_error(
                    ErrorKind::ResourceIo {
                        location: location.to_string(),
                        reason: e.to_string(),
                    },
                    SourcePos::default(),
                );
                continue;
            }
        };
        for name in parse_service_file(&text) {
            if !CLASS_NAME.is_match(&name) {
                errors.add_error(
                    ErrorKind::InvalidServiceEntry {
                        entry: name,
                        location: location.to_string(),
                    },
                    SourcePos::default(),
                );
                continue;
            }
            match declared.get(&name) {
                Some(first) if *first != location => {
                    tracing::warn!(transform = %name, first = %first, second = %location, "duplicate global transform");
                    errors.add_warning(
                        WarningCategory::PossibleErrors,
                        ErrorKind::GlobalDuplicate {
                            transform: name,
                            first: first.to_string(),
                            second: location.to_string(),
                        },
                        SourcePos::default(),
                    );
                }
                Some(_) => {}
                None => {
                    declared.insert(name, location.clone());
                }
            }
        }
    }

    let mut found = Vec::new();
    for (name, location) in declared {
        if known.contains(&name) {
            continue;
        }
        known.insert(name.clone());
        if config.is_global_disabled(&name) {
            tracing::debug!(transform = %name, "global transform disabled");
            continue;
        }
        if let Some(global) = instantiate(loader, name, location, errors) {
            found.push(global);
        }
    }
    found
}

fn instantiate(
    loader: &dyn ClassLoader,
    name: String,
    location: ResourceLocation,
    errors: &mut ErrorCollector,
) -> Option<GlobalTransform> {
    let at = location.to_string();
    let resolved = loader.resolve_transformation(&name);
    if let Err(LoadError::NotFound(_)) = resolved {
        errors.add_error(
            ErrorKind::TransformNotFound {
                transform: name,
                declared_by: at,
            },
            SourcePos::default(),
        );
        return None;
    }
    let Some(phase) = loader.declared_phase(&name) else {
        errors.add_error(
            ErrorKind::GlobalMissingPhase {
                transform: name,
                location: at,
            },
            SourcePos::default(),
        );
        return None;
    };
    let Ok(handle) = resolved else {
        errors.add_error(
            ErrorKind::GlobalNotATransformation {
                transform: name,
                location: at,
            },
            SourcePos::default(),
        );
        return None;
    };
    match handle.instantiate() {
        Ok(transform) => Some(GlobalTransform {
            name,
            phase,
            location,
            transform,
        }),
        Err(reason) => {
            errors.add_error(
                ErrorKind::GlobalInstantiationFailed {
                    transform: name,
                    location: at,
                    reason,
                },
                SourcePos::default(),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeRef;
    use crate::errors::InternalError;
    use crate::transform::{AnnotationType, TransformContext, TransformHandle, TransformLoader};

    #[derive(Default)]
    struct Noop;

    impl AstTransformation for Noop {
        fn visit(&mut self, _: &[NodeRef], _: &mut TransformContext<'_>) -> Result<(), InternalError> {
            Ok(())
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let names = parse_service_file("# header\n\n a.B # trailing\nc.D\n   \n");
        assert_eq!(names, ["a.B", "c.D"]);
    }

    #[test]
    fn duplicates_keep_first_location_and_warn() {
        let mut loader = TransformLoader::new();
        loader.register::<Noop>("demo.Global", CompilePhase::Conversion);
        loader.add_resource("one.jar", names::SERVICE_PATH, "demo.Global\n");
        loader.add_resource("two.jar", names::SERVICE_PATH, "demo.Global\n");
        let mut errors = ErrorCollector::new("").with_warning_level(WarningCategory::Paranoia);
        let mut known = IndexSet::new();
        let found = discover(&loader, &CompilerConfiguration::default(), &mut known, &mut errors);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.to_string(), "memory:one.jar!/".to_string() + names::SERVICE_PATH);
        assert!(!errors.has_errors());
        assert_eq!(errors.warnings().len(), 1);

        let again = discover(&loader, &CompilerConfiguration::default(), &mut known, &mut errors);
        assert!(again.is_empty());
    }

    #[test]
    fn missing_phase_and_plain_classes_are_errors() {
        let mut loader = TransformLoader::new();
        loader.register_transform("demo.NoPhase", None, || {
            Ok(Box::new(Noop) as Box<dyn AstTransformation>)
        });
        loader.register_plain_class("demo.Plain");
        loader.register_phased_class("demo.Marked", CompilePhase::Conversion);
        loader.add_resource(
            "lib",
            names::SERVICE_PATH,
            "demo.NoPhase\ndemo.Plain\ndemo.Marked\n9bad\n",
        );
        let mut errors = ErrorCollector::new("");
        let found = discover(
            &loader,
            &CompilerConfiguration::default(),
            &mut IndexSet::new(),
            &mut errors,
        );
        assert!(found.is_empty());
        let messages: Vec<String> = errors.errors().iter().map(|e| e.message()).collect();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].starts_with("Invalid transform class name '9bad'"));
        assert!(messages[1].contains("demo.NoPhase"));
        assert!(messages[1].contains("does not declare a compile phase"));
        // A plain class is missing its phase before it is missing the capability.
        assert!(messages[2].contains("demo.Plain"));
        assert!(messages[2].contains("does not declare a compile phase"));
        assert!(messages[3].contains("demo.Marked"));
        assert!(messages[3].ends_with("is not an ASTTransformation."));
    }

    /// Serves resources from an inner loader but fails to read one root.
    struct FailingRoot {
        inner: TransformLoader,
        broken: &'static str,
    }

    impl ClassLoader for FailingRoot {
        fn resolve_transformation(&self, name: &str) -> Result<TransformHandle, LoadError> {
            self.inner.resolve_transformation(name)
        }

        fn annotation_type(&self, name: &str) -> Option<AnnotationType> {
            self.inner.annotation_type(name)
        }

        fn resources(&self, path: &str) -> Vec<ResourceLocation> {
            self.inner.resources(path)
        }

        fn read_resource(&self, location: &ResourceLocation) -> std::io::Result<String> {
            match location {
                ResourceLocation::Memory { root, .. } if root == self.broken => Err(
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied"),
                ),
                _ => self.inner.read_resource(location),
            }
        }
    }

    #[test]
    fn unreadable_service_file_is_reported_and_others_still_load() {
        let mut inner = TransformLoader::new();
        inner.register::<Noop>("demo.Global", CompilePhase::Conversion);
        inner.add_resource("locked.jar", names::SERVICE_PATH, "demo.Other\n");
        inner.add_resource("good.jar", names::SERVICE_PATH, "demo.Global\n");
        let loader = FailingRoot {
            inner,
            broken: "locked.jar",
        };
        let mut errors = ErrorCollector::new("");
        let found = discover(
            &loader,
            &CompilerConfiguration::default(),
            &mut IndexSet::new(),
            &mut errors,
        );

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "demo.Global");
        let messages: Vec<String> = errors.errors().iter().map(|e| e.message()).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(&format!(
            "IOException reading the service definition at memory:locked.jar!/{} because of exception",
            names::SERVICE_PATH
        )));
        assert!(messages[0].contains("access denied"));
    }

    #[test]
    fn disabled_names_are_not_instantiated() {
        let mut loader = TransformLoader::new();
        loader.register::<Noop>("demo.Global", CompilePhase::Conversion);
        loader.add_resource("lib", names::SERVICE_PATH, "demo.Global");
        let config = CompilerConfiguration {
            disabled_global_transforms: vec!["demo.Global".into()],
            ..Default::default()
        };
        let mut errors = ErrorCollector::new("");
        let found = discover(&loader, &config, &mut IndexSet::new(), &mut errors);
        assert!(found.is_empty());
        assert!(!errors.has_errors());
    }
}

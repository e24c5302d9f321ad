use crate::context::DefinitionOrigin;
use crate::instance::ErrorPtr;
use crate::key::{ComponentKey, ScopeId, TypeInfo};
use thiserror::Error;

fn origin_list(origins: &[DefinitionOrigin]) -> String {
    origins
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn cycle_message(key: &ComponentKey, implicated: &Option<ComponentKey>) -> String {
    match implicated {
        Some(implicated) if implicated == key => {
            format!("cyclic dependency while provisioning '{key}': the component depends on itself")
        }
        Some(implicated) => format!(
            "cyclic dependency while provisioning '{key}': dependency '{implicated}' re-enters it"
        ),
        None => format!(
            "cyclic dependency while provisioning '{key}': cycle members could not be fully attributed"
        ),
    }
}

/// Errors raised while building the dependency graph or otherwise configuring the
/// engine. These are fatal - a partially-usable graph is never produced.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum GraphBuildError {
    #[error("multiple non-collection bindings compete for '{key}' at priority {priority}: {}", origin_list(.origins))]
    AmbiguousDependency {
        key: ComponentKey,
        priority: i32,
        origins: Vec<DefinitionOrigin>,
    },
    #[error("a provider is already registered for scope '{0}'")]
    DuplicateScope(ScopeId),
    #[error(transparent)]
    Resolution(#[from] DependencyResolutionError),
}

/// Errors raised when declared dependencies cannot be associated with known
/// declarations.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DependencyResolutionError {
    #[error("no declaration is known for implementation type '{ty}' backing '{required_by}'")]
    UnknownDeclaration {
        ty: TypeInfo,
        required_by: ComponentKey,
    },
}

/// Errors raised while resolving a key to an instantiation strategy.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ComponentResolutionError {
    #[error("no binding exists for '{0}'")]
    NoBinding(ComponentKey),
    #[error("multiple non-collection strategies are bound for '{key}' at priority {priority}")]
    AmbiguousBinding { key: ComponentKey, priority: i32 },
    #[error("instance bound for '{key}' cannot be downcast to '{expected}'")]
    IncompatibleInstance {
        key: ComponentKey,
        expected: TypeInfo,
    },
}

/// A resolution chain re-entered a key it was already constructing. Cycles of
/// length one or two name the implicated peer precisely; longer cycles are
/// reported without full attribution.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
#[error("{}", cycle_message(.key, .implicated))]
pub struct CyclicComponentError {
    pub key: ComponentKey,
    pub implicated: Option<ComponentKey>,
}

/// A dependency marked required could not be satisfied while populating or
/// constructing a component.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
#[error("required dependency '{key}' for member '{member}' of '{owner}' cannot be satisfied")]
pub struct ComponentRequiredError {
    pub owner: TypeInfo,
    pub member: String,
    pub key: ComponentKey,
}

/// Umbrella error for a single resolution call. Failures stay scoped to the call -
/// they never poison singleton caches or abort unrelated resolutions.
#[derive(Error, Clone, Debug)]
pub enum ComponentError {
    #[error(transparent)]
    Resolution(#[from] ComponentResolutionError),
    #[error(transparent)]
    Cycle(#[from] CyclicComponentError),
    #[error(transparent)]
    Required(#[from] ComponentRequiredError),
    #[error("configuration error: {0}")]
    Configuration(#[from] GraphBuildError),
    #[error("instantiation of '{key}' failed: {cause}")]
    Instantiation { key: ComponentKey, cause: ErrorPtr },
}

#[cfg(test)]
mod tests {
    use crate::error::CyclicComponentError;
    use crate::key::ComponentKey;

    struct A;
    struct B;

    #[test]
    fn should_name_self_dependency() {
        let error = CyclicComponentError {
            key: ComponentKey::of::<A>(),
            implicated: Some(ComponentKey::of::<A>()),
        };

        assert!(error.to_string().contains("depends on itself"));
    }

    #[test]
    fn should_name_implicated_peer() {
        let error = CyclicComponentError {
            key: ComponentKey::of::<A>(),
            implicated: Some(ComponentKey::of::<B>()),
        };

        let message = error.to_string();
        assert!(message.contains("re-enters"));
        assert!(message.contains("B"));
    }

    #[test]
    fn should_admit_unattributed_cycles() {
        let error = CyclicComponentError {
            key: ComponentKey::of::<A>(),
            implicated: None,
        };

        assert!(error.to_string().contains("not be fully attributed"));
    }
}

//! Resolvers discover dependency contexts implied by the declared ones - most
//! importantly, the implementation-level context behind an interface-level
//! binding. Multiple resolver strategies can be composed; results are unioned and
//! deduplicated by structural equality, since orthogonal resolvers are expected to
//! occasionally discover the same context.

use crate::context::DependencyContext;
use crate::error::DependencyResolutionError;
use crate::key::TypeInfo;
use fxhash::{FxHashMap, FxHashSet};
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[cfg_attr(test, automock)]
pub trait DependencyResolver {
    /// Discovers contexts implied by the given declarations. Pure over declaration
    /// metadata - no instances are constructed.
    fn resolve(
        &self,
        declared: &[Arc<DependencyContext>],
    ) -> Result<Vec<Arc<DependencyContext>>, DependencyResolutionError>;

    /// Looks up the declaration context backing the given implementation type.
    fn declaration_of(&self, ty: &TypeInfo) -> Option<Arc<DependencyContext>>;
}

/// Runs a set of resolvers and unions their results. Duplicate contexts coming
/// from different resolvers are deduplicated, not rejected as conflicts.
#[derive(Default)]
pub struct CompositeDependencyResolver {
    resolvers: Vec<Box<dyn DependencyResolver + Send + Sync>>,
}

impl CompositeDependencyResolver {
    pub fn new(resolvers: Vec<Box<dyn DependencyResolver + Send + Sync>>) -> Self {
        Self { resolvers }
    }

    pub fn with(mut self, resolver: Box<dyn DependencyResolver + Send + Sync>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl DependencyResolver for CompositeDependencyResolver {
    fn resolve(
        &self,
        declared: &[Arc<DependencyContext>],
    ) -> Result<Vec<Arc<DependencyContext>>, DependencyResolutionError> {
        let mut seen = FxHashSet::default();
        let mut resolved = vec![];

        for resolver in &self.resolvers {
            for context in resolver.resolve(declared)? {
                if seen.insert(context.clone()) {
                    resolved.push(context);
                }
            }
        }

        Ok(resolved)
    }

    fn declaration_of(&self, ty: &TypeInfo) -> Option<Arc<DependencyContext>> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.declaration_of(ty))
    }
}

/// Explicit store of declaration contexts, keyed by the declared type. Insertion
/// order is preserved so graph builds are deterministic.
#[derive(Default)]
pub struct DeclarationRegistry {
    declarations: RwLock<DeclarationMap>,
}

#[derive(Default)]
struct DeclarationMap {
    ordered: Vec<Arc<DependencyContext>>,
    by_type: FxHashMap<TypeInfo, Vec<usize>>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a declaration context under its own key's type.
    pub fn declare(&self, context: Arc<DependencyContext>) {
        let mut declarations = self.declarations.write();
        let index = declarations.ordered.len();
        let ty = *context.key().ty();

        declarations.ordered.push(context);
        declarations.by_type.entry(ty).or_default().push(index);
    }

    /// All declarations in registration order.
    pub fn all(&self) -> Vec<Arc<DependencyContext>> {
        self.declarations.read().ordered.clone()
    }

    /// The highest-priority declaration for the given type.
    pub fn declaration(&self, ty: &TypeInfo) -> Option<Arc<DependencyContext>> {
        let declarations = self.declarations.read();
        declarations
            .by_type
            .get(ty)?
            .iter()
            .map(|index| &declarations.ordered[*index])
            .max_by_key(|context| context.priority())
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.read().ordered.is_empty()
    }
}

/// Resolver backed by a [DeclarationRegistry]. For every declaration whose
/// strategy is type-aware, the implementation type's own declaration is resolved,
/// transitively, until no new contexts are discovered.
pub struct RegistryDependencyResolver {
    registry: Arc<DeclarationRegistry>,
    strict: bool,
}

impl RegistryDependencyResolver {
    pub fn new(registry: Arc<DeclarationRegistry>) -> Self {
        Self {
            registry,
            strict: false,
        }
    }

    /// In strict mode, a type-aware strategy whose implementation type has no
    /// registered declaration is an error instead of a skipped wiring.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl DependencyResolver for RegistryDependencyResolver {
    fn resolve(
        &self,
        declared: &[Arc<DependencyContext>],
    ) -> Result<Vec<Arc<DependencyContext>>, DependencyResolutionError> {
        let mut seen: FxHashSet<Arc<DependencyContext>> = declared.iter().cloned().collect();
        let mut resolved = vec![];
        let mut pending = declared.to_vec();

        while let Some(context) = pending.pop() {
            let Some(target) = context.strategy().target_type() else {
                continue;
            };

            if target == *context.key().ty() {
                continue;
            }

            match self.registry.declaration(&target) {
                Some(implementation) => {
                    if seen.insert(implementation.clone()) {
                        pending.push(implementation.clone());
                        resolved.push(implementation);
                    }
                }
                None if self.strict => {
                    return Err(DependencyResolutionError::UnknownDeclaration {
                        ty: target,
                        required_by: context.key().clone(),
                    });
                }
                None => {
                    debug!("No declaration known for implementation type '{target}' backing '{}'; skipping.", context.key());
                }
            }
        }

        Ok(resolved)
    }

    fn declaration_of(&self, ty: &TypeInfo) -> Option<Arc<DependencyContext>> {
        self.registry.declaration(ty)
    }
}

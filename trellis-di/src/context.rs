//! Dependency contexts wrap a component's declared metadata - its key, the keys it
//! depends on, its priority and whether it is a standalone declaration or a member
//! of a composite (collection) binding - together with the strategy used to
//! construct it.

use crate::binding::StrategyPtr;
use crate::key::{ComponentKey, ScopeId};
use derivative::Derivative;
use fxhash::FxHashSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Whether a declaration stands alone or also contributes to the implicit
/// collection slot for its key.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ComponentMemberType {
    #[default]
    Standalone,
    Composite,
}

/// Source location of a declaration. Conflict diagnostics list the origins of
/// every contributing declaration instead of silently picking one.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum DefinitionOrigin {
    Source { file: &'static str, line: u32 },
    Named(String),
}

impl DefinitionOrigin {
    /// Captures the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::Source {
            file: location.file(),
            line: location.line(),
        }
    }

    /// Labels a declaration which has no meaningful source location, e.g. one
    /// synthesized from external metadata.
    pub fn named<T: Into<String>>(label: T) -> Self {
        Self::Named(label.into())
    }
}

impl Display for DefinitionOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionOrigin::Source { file, line } => write!(f, "{file}:{line}"),
            DefinitionOrigin::Named(label) => f.write_str(label),
        }
    }
}

/// One declared unit of construction. Immutable once built; consumed by the graph
/// builder.
///
/// Equality and hashing are structural over `(key, priority, member type, origin)`
/// and deliberately ignore the strategy and the dependency set - strategies are
/// opaque trait objects, and two declarations from the same origin for the same
/// slot are the same declaration. This is what resolver deduplication relies on.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DependencyContext {
    key: ComponentKey,
    dependencies: FxHashSet<ComponentKey>,
    priority: i32,
    member_type: ComponentMemberType,
    origin: DefinitionOrigin,
    #[derivative(Debug = "ignore")]
    strategy: StrategyPtr,
}

impl DependencyContext {
    /// Starts building a context for the given key and strategy. The origin
    /// defaults to the caller's source location.
    #[track_caller]
    pub fn builder(key: ComponentKey, strategy: StrategyPtr) -> DependencyContextBuilder {
        DependencyContextBuilder {
            key,
            dependencies: FxHashSet::default(),
            priority: 0,
            member_type: ComponentMemberType::Standalone,
            origin: DefinitionOrigin::caller(),
            strategy,
        }
    }

    #[inline]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    #[inline]
    pub fn scope(&self) -> &ScopeId {
        self.key.scope()
    }

    #[inline]
    pub fn dependencies(&self) -> &FxHashSet<ComponentKey> {
        &self.dependencies
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn member_type(&self) -> ComponentMemberType {
        self.member_type
    }

    #[inline]
    pub fn origin(&self) -> &DefinitionOrigin {
        &self.origin
    }

    #[inline]
    pub fn strategy(&self) -> &StrategyPtr {
        &self.strategy
    }
}

impl PartialEq for DependencyContext {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.priority == other.priority
            && self.member_type == other.member_type
            && self.origin == other.origin
    }
}

impl Eq for DependencyContext {}

impl Hash for DependencyContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.priority.hash(state);
        self.member_type.hash(state);
        self.origin.hash(state);
    }
}

pub struct DependencyContextBuilder {
    key: ComponentKey,
    dependencies: FxHashSet<ComponentKey>,
    priority: i32,
    member_type: ComponentMemberType,
    origin: DefinitionOrigin,
    strategy: StrategyPtr,
}

impl DependencyContextBuilder {
    pub fn depends_on(mut self, key: ComponentKey) -> Self {
        self.dependencies.insert(key);
        self
    }

    pub fn dependencies<T: IntoIterator<Item = ComponentKey>>(mut self, keys: T) -> Self {
        self.dependencies.extend(keys);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks this declaration as a collection member contributing to the implicit
    /// collector slot in addition to its own standalone slot.
    pub fn composite(mut self) -> Self {
        self.member_type = ComponentMemberType::Composite;
        self
    }

    pub fn origin(mut self, origin: DefinitionOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn build(self) -> Arc<DependencyContext> {
        Arc::new(DependencyContext {
            key: self.key,
            dependencies: self.dependencies,
            priority: self.priority,
            member_type: self.member_type,
            origin: self.origin,
            strategy: self.strategy,
        })
    }
}

/// Pairs a resolved implementation's declaration context with the interface-level
/// context it satisfies. Ordering decisions use the declaring context's priority.
#[derive(Clone, Debug)]
pub struct ImplementationDependencyContext {
    implementation: Arc<DependencyContext>,
    declaring: Arc<DependencyContext>,
}

impl ImplementationDependencyContext {
    pub fn new(implementation: Arc<DependencyContext>, declaring: Arc<DependencyContext>) -> Self {
        Self {
            implementation,
            declaring,
        }
    }

    #[inline]
    pub fn implementation(&self) -> &Arc<DependencyContext> {
        &self.implementation
    }

    #[inline]
    pub fn declaring(&self) -> &Arc<DependencyContext> {
        &self.declaring
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.declaring.priority()
    }
}

/// A single inflated item in the graph builder's working set: either a declared
/// context as-is, or a declared context enriched with the implementation its
/// binding resolved to.
#[derive(Clone, Debug)]
pub enum ContextEntry {
    Declared(Arc<DependencyContext>),
    Implementation(ImplementationDependencyContext),
}

impl ContextEntry {
    /// The requestable slot this entry answers for - the declared key, or the
    /// declaring (interface-level) key of an implementation pairing.
    pub fn slot_key(&self) -> &ComponentKey {
        match self {
            ContextEntry::Declared(context) => context.key(),
            ContextEntry::Implementation(pairing) => pairing.declaring().key(),
        }
    }

    /// The key of the concrete implementation, where one was resolved.
    pub fn implementation_key(&self) -> Option<&ComponentKey> {
        match self {
            ContextEntry::Declared(_) => None,
            ContextEntry::Implementation(pairing) => Some(pairing.implementation().key()),
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            ContextEntry::Declared(context) => context.priority(),
            ContextEntry::Implementation(pairing) => pairing.priority(),
        }
    }

    pub fn member_type(&self) -> ComponentMemberType {
        match self {
            ContextEntry::Declared(context) => context.member_type(),
            ContextEntry::Implementation(pairing) => pairing.declaring().member_type(),
        }
    }

    pub fn origin(&self) -> &DefinitionOrigin {
        match self {
            ContextEntry::Declared(context) => context.origin(),
            ContextEntry::Implementation(pairing) => pairing.declaring().origin(),
        }
    }

    /// The context whose strategy actually constructs the component.
    pub fn construction_context(&self) -> &Arc<DependencyContext> {
        match self {
            ContextEntry::Declared(context) => context,
            ContextEntry::Implementation(pairing) => pairing.implementation(),
        }
    }
}

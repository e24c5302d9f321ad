//! Bindings associate a [ComponentKey] with one or more [InstantiationStrategy]s
//! able to produce an instance. Strategies for a single slot are kept in a
//! [BindingHierarchy] ordered by priority; higher priorities override lower ones
//! for scalar resolution, while collection resolution aggregates members across
//! all priorities.

use crate::error::{ComponentError, ComponentResolutionError};
use crate::instance::ComponentInstanceAnyPtr;
use crate::key::{ComponentKey, TypeInfo};
use crate::provider::ComponentAccessor;
use fxhash::FxHashMap;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type StrategyPtr = Arc<dyn InstantiationStrategy + Send + Sync>;

type FactoryFn =
    dyn Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
        + Send
        + Sync;

/// Caching axis of an instantiation strategy, applied per scope provider.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Lifecycle {
    /// The strategy is re-invoked on every request.
    #[default]
    Transient,
    /// The first successfully constructed instance is cached; eligible for eager
    /// warm-up.
    Singleton,
    /// Like [Lifecycle::Singleton], but the underlying supplier is only invoked on
    /// first access, never eagerly.
    LazySingleton,
}

/// Executable recipe producing a component instance. Strategies resolve their own
/// dependencies through the [ComponentAccessor] they are handed, which shares the
/// caller's cycle-detection state.
pub trait InstantiationStrategy {
    fn instantiate(
        &self,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError>;

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Transient
    }

    /// The concrete implementation type backing this strategy, if it is
    /// type-aware. The graph builder uses this to inflate implementation-level
    /// dependency contexts for interface-level bindings.
    fn target_type(&self) -> Option<TypeInfo> {
        None
    }

    /// Collection members jointly satisfy a "many of T" slot and are exempt from
    /// scalar ambiguity checks.
    fn is_collection_member(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn InstantiationStrategy + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantiationStrategy")
            .field("lifecycle", &self.lifecycle())
            .field("is_collection_member", &self.is_collection_member())
            .finish_non_exhaustive()
    }
}

/// Closure-backed strategy.
pub struct FactoryStrategy {
    factory: Box<FactoryFn>,
    lifecycle: Lifecycle,
}

impl FactoryStrategy {
    pub fn new<F>(lifecycle: Lifecycle, factory: F) -> Self
    where
        F: Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            factory: Box::new(factory),
            lifecycle,
        }
    }

    pub fn transient<F>(factory: F) -> Self
    where
        F: Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Lifecycle::Transient, factory)
    }

    pub fn singleton<F>(factory: F) -> Self
    where
        F: Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Lifecycle::Singleton, factory)
    }

    pub fn lazy_singleton<F>(factory: F) -> Self
    where
        F: Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Lifecycle::LazySingleton, factory)
    }
}

impl InstantiationStrategy for FactoryStrategy {
    fn instantiate(
        &self,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        (self.factory)(accessor)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

/// Strategy wrapping an instance constructed ahead of binding time.
pub struct ConstantStrategy {
    instance: ComponentInstanceAnyPtr,
}

impl ConstantStrategy {
    pub fn new(instance: ComponentInstanceAnyPtr) -> Self {
        Self { instance }
    }
}

impl InstantiationStrategy for ConstantStrategy {
    fn instantiate(
        &self,
        _accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        Ok(self.instance.clone())
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Singleton
    }
}

/// Type-aware strategy - a factory which knows the concrete implementation type it
/// produces, rather than being an opaque recipe.
pub struct TypeStrategy {
    target: TypeInfo,
    factory: Box<FactoryFn>,
    lifecycle: Lifecycle,
}

impl TypeStrategy {
    pub fn new<T: ?Sized + 'static, F>(lifecycle: Lifecycle, factory: F) -> Self
    where
        F: Fn(&mut ComponentAccessor<'_>) -> Result<ComponentInstanceAnyPtr, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            target: TypeInfo::of::<T>(),
            factory: Box::new(factory),
            lifecycle,
        }
    }
}

impl InstantiationStrategy for TypeStrategy {
    fn instantiate(
        &self,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        (self.factory)(accessor)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn target_type(&self) -> Option<TypeInfo> {
        Some(self.target)
    }
}

/// Decorator marking its inner strategy as a collection member. Instantiation
/// delegates to the inner strategy; collection resolution enumerates members
/// while scalar resolution treats them as exempt from ambiguity checks.
pub struct CollectionStrategy {
    inner: StrategyPtr,
}

impl CollectionStrategy {
    pub fn new(inner: StrategyPtr) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &StrategyPtr {
        &self.inner
    }
}

impl InstantiationStrategy for CollectionStrategy {
    fn instantiate(
        &self,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        self.inner.instantiate(accessor)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle()
    }

    fn target_type(&self) -> Option<TypeInfo> {
        self.inner.target_type()
    }

    fn is_collection_member(&self) -> bool {
        true
    }
}

/// Ordered multimap from priority to instantiation strategies for a single
/// component slot. Iteration order is deterministic - ascending priority, then
/// insertion order within a bucket.
#[derive(Clone)]
pub struct BindingHierarchy {
    key: ComponentKey,
    strategies: BTreeMap<i32, Vec<StrategyPtr>>,
}

impl BindingHierarchy {
    pub fn new(key: ComponentKey) -> Self {
        Self {
            key,
            strategies: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn add(&mut self, priority: i32, strategy: StrategyPtr) {
        self.strategies.entry(priority).or_default().push(strategy);
    }

    pub fn highest_priority(&self) -> Option<i32> {
        self.strategies.keys().next_back().copied()
    }

    /// Highest populated priority strictly below the given limit. This is how a
    /// higher-priority binding reaches the binding it overrides.
    pub fn highest_priority_below(&self, limit: i32) -> Option<i32> {
        self.strategies.range(..limit).next_back().map(|(priority, _)| *priority)
    }

    pub fn get(&self, priority: i32) -> Option<&[StrategyPtr]> {
        self.strategies
            .get(&priority)
            .map(|strategies| strategies.as_slice())
    }

    /// Resolves the strategy for a single-value request: the highest-priority
    /// bucket wins. A sole collection member occupying the top bucket satisfies
    /// the request through its inner strategy; more than one non-collection
    /// candidate (or more than one collection member with no scalar candidate) is
    /// ambiguous.
    pub fn single_strategy(&self) -> Result<StrategyPtr, ComponentResolutionError> {
        let priority = self
            .highest_priority()
            .ok_or_else(|| ComponentResolutionError::NoBinding(self.key.clone()))?;

        self.single_strategy_at(priority)
    }

    /// Resolves the single-value strategy within one priority bucket.
    pub fn single_strategy_at(&self, priority: i32) -> Result<StrategyPtr, ComponentResolutionError> {
        let bucket = self
            .strategies
            .get(&priority)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| ComponentResolutionError::NoBinding(self.key.clone()))?;

        let scalar = bucket
            .iter()
            .filter(|strategy| !strategy.is_collection_member())
            .collect_vec();

        match scalar.len() {
            1 => Ok(scalar[0].clone()),
            0 if bucket.len() == 1 => Ok(bucket[0].clone()),
            _ => Err(ComponentResolutionError::AmbiguousBinding {
                key: self.key.clone(),
                priority,
            }),
        }
    }

    /// All collection members across buckets, highest priority first, with the
    /// `(priority, slot)` coordinates identifying each member within the
    /// hierarchy.
    pub fn members(&self) -> Vec<(i32, usize, StrategyPtr)> {
        self.strategies
            .iter()
            .rev()
            .flat_map(|(priority, bucket)| {
                bucket
                    .iter()
                    .enumerate()
                    .filter(|(_, strategy)| strategy.is_collection_member())
                    .map(|(slot, strategy)| (*priority, slot, strategy.clone()))
            })
            .collect()
    }

    /// Ascending-priority iteration over every strategy in the hierarchy.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &StrategyPtr)> + '_ {
        self.strategies
            .iter()
            .flat_map(|(priority, bucket)| bucket.iter().map(|strategy| (*priority, strategy)))
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.values().map(Vec::len).sum()
    }
}

/// Read/write access to per-key binding hierarchies. The graph builder and
/// providers query this; they do not own it.
#[cfg_attr(test, automock)]
pub trait HierarchicalBinder {
    /// Returns an immutable snapshot of the hierarchy bound for the given key.
    fn hierarchy(&self, key: &ComponentKey) -> Option<Arc<BindingHierarchy>>;

    /// Installs a strategy for the given key at the given priority.
    fn bind_strategy(&self, key: &ComponentKey, priority: i32, strategy: StrategyPtr);
}

/// Default binder. Hierarchies are copy-on-write: mutation clones the bound
/// hierarchy, mutates the clone and swaps it in, so an in-flight resolution keeps
/// iterating the snapshot it already took.
#[derive(Default)]
pub struct ComponentBinder {
    hierarchies: RwLock<FxHashMap<ComponentKey, Arc<BindingHierarchy>>>,
}

impl ComponentBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a strategy at the default priority 0.
    pub fn bind(&self, key: &ComponentKey, strategy: StrategyPtr) {
        self.bind_strategy(key, 0, strategy);
    }

    /// Binds a strategy at an explicit priority.
    pub fn bind_at(&self, key: &ComponentKey, priority: i32, strategy: StrategyPtr) {
        self.bind_strategy(key, priority, strategy);
    }

    /// Binds an instance constructed ahead of time.
    pub fn bind_constant(&self, key: &ComponentKey, instance: ComponentInstanceAnyPtr) {
        self.bind_strategy(key, 0, Arc::new(ConstantStrategy::new(instance)));
    }

    /// Registers a collection member for the given key. The member is installed
    /// under the key's collector slot; the scalar slot is left untouched, so a
    /// component bound only as a collection member is addressable solely through
    /// its collector key.
    pub fn add_collection_member(
        &self,
        key: &ComponentKey,
        priority: i32,
        strategy: StrategyPtr,
    ) {
        let collector = if key.is_collector() {
            key.clone()
        } else {
            key.collector_key()
        };

        self.bind_strategy(
            &collector,
            priority,
            Arc::new(CollectionStrategy::new(strategy)),
        );
    }
}

impl HierarchicalBinder for ComponentBinder {
    fn hierarchy(&self, key: &ComponentKey) -> Option<Arc<BindingHierarchy>> {
        self.hierarchies.read().get(key).cloned()
    }

    fn bind_strategy(&self, key: &ComponentKey, priority: i32, strategy: StrategyPtr) {
        let mut hierarchies = self.hierarchies.write();
        let mut hierarchy = hierarchies
            .get(key)
            .map(|hierarchy| BindingHierarchy::clone(hierarchy))
            .unwrap_or_else(|| BindingHierarchy::new(key.clone()));

        hierarchy.add(priority, strategy);
        hierarchies.insert(key.clone(), Arc::new(hierarchy));
    }
}

//! Component provisioning. A [ComponentProvider] resolves keys to instances by
//! walking the binding hierarchy, applying each strategy's lifecycle within its
//! own scope, detecting cycles, and routing every constructed instance through
//! the population and processor pipeline. Providers are looked up per scope in a
//! [ProviderRegistry]; scopes never share a singleton cache.

use crate::binding::{ComponentBinder, HierarchicalBinder, Lifecycle, StrategyPtr};
use crate::error::{
    ComponentError, ComponentResolutionError, CyclicComponentError, GraphBuildError,
};
use crate::graph::builder::DependencyGraphBuilder;
use crate::graph::DependencyGraph;
use crate::instance::{ComponentInstanceAnyPtr, ComponentInstancePtr};
use crate::introspect::{EmptyIntrospector, Introspector};
use crate::key::{ComponentKey, ScopeId, TypeInfo};
use crate::populate::{ComponentPopulator, ContextStore};
use crate::processor::{ProcessorPhase, ProcessorRegistry};
use crate::resolver::{DeclarationRegistry, DependencyResolver, RegistryDependencyResolver};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call-chain resolution state. The stack of slots currently under
/// construction detects re-entry before the call stack is exhausted. Entries
/// carry the priority bucket alongside the key: a higher-priority binding
/// depending on the same key at a lower priority is the override pattern, not a
/// cycle.
#[derive(Default)]
struct ResolutionContext {
    stack: Vec<(ComponentKey, i32)>,
}

/// A singleton cache entry is identified by the key together with the hierarchy
/// coordinates of the strategy which produced it, so a rebind at a higher
/// priority naturally produces a fresh instance.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
struct SingletonSlot {
    key: ComponentKey,
    priority: i32,
    member: usize,
}

/// Handle passed to instantiation strategies, processors and the populator.
/// Recursive `get` calls made through an accessor share the originating call's
/// cycle-detection stack.
pub struct ComponentAccessor<'a> {
    provider: &'a ComponentProvider,
    ctx: &'a mut ResolutionContext,
}

impl ComponentAccessor<'_> {
    pub fn get(&mut self, key: &ComponentKey) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        self.provider.resolve(key, self.ctx)
    }

    pub fn get_typed<T: Send + Sync + 'static>(
        &mut self,
        key: &ComponentKey,
    ) -> Result<ComponentInstancePtr<T>, ComponentError> {
        self.get(key).and_then(|instance| downcast(key, instance))
    }

    pub fn get_optional(
        &mut self,
        key: &ComponentKey,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ComponentError> {
        downgrade_missing(self.get(key))
    }

    pub fn get_all(
        &mut self,
        key: &ComponentKey,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentError> {
        self.provider.resolve_all(key, self.ctx)
    }

    /// Resolves the given key using only bindings strictly below the given
    /// priority. A strategy overriding a lower-priority binding of its own key
    /// uses this to obtain the instance it decorates.
    pub fn get_below(
        &mut self,
        key: &ComponentKey,
        priority: i32,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        self.provider.resolve_below(key, priority, self.ctx)
    }

    pub fn scope(&self) -> &ScopeId {
        self.provider.scope()
    }
}

fn downcast<T: Send + Sync + 'static>(
    key: &ComponentKey,
    instance: ComponentInstanceAnyPtr,
) -> Result<ComponentInstancePtr<T>, ComponentError> {
    instance.downcast().map_err(|_| {
        ComponentResolutionError::IncompatibleInstance {
            key: key.clone(),
            expected: TypeInfo::of::<T>(),
        }
        .into()
    })
}

fn downgrade_missing(
    result: Result<ComponentInstanceAnyPtr, ComponentError>,
) -> Result<Option<ComponentInstanceAnyPtr>, ComponentError> {
    match result {
        Ok(instance) => Ok(Some(instance)),
        Err(ComponentError::Resolution(ComponentResolutionError::NoBinding(_))) => Ok(None),
        Err(error) => Err(error),
    }
}

/// Resolves component keys to instances within a single scope.
pub struct ComponentProvider {
    scope: ScopeId,
    binder: Arc<dyn HierarchicalBinder + Send + Sync>,
    populator: Arc<ComponentPopulator>,
    processors: Arc<ProcessorRegistry>,
    singletons: RwLock<FxHashMap<SingletonSlot, ComponentInstanceAnyPtr>>,
}

impl ComponentProvider {
    pub fn new(
        scope: ScopeId,
        binder: Arc<dyn HierarchicalBinder + Send + Sync>,
        populator: Arc<ComponentPopulator>,
        processors: Arc<ProcessorRegistry>,
    ) -> Self {
        Self {
            scope,
            binder,
            populator,
            processors,
            singletons: RwLock::default(),
        }
    }

    #[inline]
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Resolves a single instance for the given key.
    pub fn get(&self, key: &ComponentKey) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let mut ctx = ResolutionContext::default();
        self.resolve(key, &mut ctx)
    }

    /// Typesafe version of [ComponentProvider::get].
    pub fn get_typed<T: Send + Sync + 'static>(
        &self,
        key: &ComponentKey,
    ) -> Result<ComponentInstancePtr<T>, ComponentError> {
        self.get(key).and_then(|instance| downcast(key, instance))
    }

    /// Like [ComponentProvider::get], but a missing binding yields `None` instead
    /// of an error.
    pub fn get_optional(
        &self,
        key: &ComponentKey,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ComponentError> {
        downgrade_missing(self.get(key))
    }

    /// Resolves every collection member bound for the given key. A scalar key is
    /// normalized to its collector; a slot with no members yields an empty
    /// collection.
    pub fn get_all(
        &self,
        key: &ComponentKey,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentError> {
        let mut ctx = ResolutionContext::default();
        self.resolve_all(key, &mut ctx)
    }

    /// Eagerly constructs every singleton belonging to this provider's scope, in
    /// dependency order. Lazy singletons and transients are skipped.
    pub fn warm_up(&self, graph: &DependencyGraph) -> Result<(), ComponentError> {
        for id in graph.resolution_order()? {
            let entry = graph.node(id).entry();
            let key = entry.slot_key();

            if key.scope() != &self.scope || !key.enable() {
                continue;
            }

            let Some(hierarchy) = self.binder.hierarchy(key) else {
                continue;
            };
            let Ok(strategy) = hierarchy.single_strategy() else {
                continue;
            };

            if strategy.lifecycle() == Lifecycle::Singleton {
                debug!("Warming up singleton '{key}'.");
                self.get(key)?;
            }
        }

        Ok(())
    }

    fn resolve(
        &self,
        key: &ComponentKey,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let hierarchy = self
            .binder
            .hierarchy(key)
            .filter(|hierarchy| !hierarchy.is_empty())
            .ok_or_else(|| ComponentResolutionError::NoBinding(key.clone()))?;

        let strategy = hierarchy
            .single_strategy()
            .map_err(ComponentError::Resolution)?;
        let priority = hierarchy.highest_priority().unwrap_or_default();

        self.provide(key, priority, 0, &strategy, ctx)
    }

    fn resolve_below(
        &self,
        key: &ComponentKey,
        limit: i32,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let hierarchy = self
            .binder
            .hierarchy(key)
            .ok_or_else(|| ComponentResolutionError::NoBinding(key.clone()))?;

        let priority = hierarchy
            .highest_priority_below(limit)
            .ok_or_else(|| ComponentResolutionError::NoBinding(key.clone()))?;
        let strategy = hierarchy
            .single_strategy_at(priority)
            .map_err(ComponentError::Resolution)?;

        self.provide(key, priority, 0, &strategy, ctx)
    }

    fn resolve_all(
        &self,
        key: &ComponentKey,
        ctx: &mut ResolutionContext,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentError> {
        let collector = if key.is_collector() {
            key.clone()
        } else {
            key.collector_key()
        };

        let Some(hierarchy) = self.binder.hierarchy(&collector) else {
            debug!("No members bound for '{collector}'; yielding an empty collection.");
            return Ok(vec![]);
        };

        hierarchy
            .members()
            .into_iter()
            .map(|(priority, member, strategy)| {
                self.provide(&collector, priority, member, &strategy, ctx)
            })
            .collect()
    }

    fn provide(
        &self,
        key: &ComponentKey,
        priority: i32,
        member: usize,
        strategy: &StrategyPtr,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        match strategy.lifecycle() {
            Lifecycle::Transient => self.construct(key, priority, strategy, ctx),
            Lifecycle::Singleton | Lifecycle::LazySingleton => {
                let slot = SingletonSlot {
                    key: key.clone(),
                    priority,
                    member,
                };

                if let Some(instance) = self.singletons.read().get(&slot) {
                    debug!("Returning cached singleton for '{key}'.");
                    return Ok(instance.clone());
                }

                // No lock is held during construction; concurrent first-access may
                // race, in which case the first writer wins and the loser's
                // instance is discarded. A failed construction caches nothing.
                let instance = self.construct(key, priority, strategy, ctx)?;
                Ok(self
                    .singletons
                    .write()
                    .entry(slot)
                    .or_insert(instance)
                    .clone())
            }
        }
    }

    fn construct(
        &self,
        key: &ComponentKey,
        priority: i32,
        strategy: &StrategyPtr,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let position = ctx
            .stack
            .iter()
            .position(|(entry, bucket)| entry == key && *bucket == priority);
        if let Some(position) = position {
            let chain = &ctx.stack[position..];
            // cycles spanning more than one intermediate are not uniquely
            // attributed
            let implicated = match chain.len() {
                1 => Some(key.clone()),
                2 => Some(chain[1].0.clone()),
                _ => None,
            };

            return Err(CyclicComponentError {
                key: key.clone(),
                implicated,
            }
            .into());
        }

        ctx.stack.push((key.clone(), priority));
        let result = self.construct_unchecked(key, strategy, ctx);
        ctx.stack.pop();

        result
    }

    fn construct_unchecked(
        &self,
        key: &ComponentKey,
        strategy: &StrategyPtr,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let instance = {
            let mut accessor = ComponentAccessor {
                provider: self,
                ctx: &mut *ctx,
            };
            strategy.instantiate(&mut accessor)?
        };

        let instance = self.process(ProcessorPhase::Pre, key, instance, ctx)?;

        let population_type = strategy
            .target_type()
            .or_else(|| key.collected().copied())
            .unwrap_or_else(|| *key.ty());
        {
            let mut accessor = ComponentAccessor {
                provider: self,
                ctx: &mut *ctx,
            };
            self.populator
                .populate(&population_type, &instance, &mut accessor)?;
        }

        self.process(ProcessorPhase::Post, key, instance, ctx)
    }

    fn process(
        &self,
        phase: ProcessorPhase,
        key: &ComponentKey,
        mut instance: ComponentInstanceAnyPtr,
        ctx: &mut ResolutionContext,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        for processor in self.processors.snapshot(phase) {
            let mut accessor = ComponentAccessor {
                provider: self,
                ctx: &mut *ctx,
            };
            instance = processor.process(key, instance, &mut accessor)?;
        }

        Ok(instance)
    }
}

/// Registry of scope providers plus the shared collaborators they resolve
/// against. Providers are created lazily, one per scope; explicitly registering a
/// provider for an occupied scope is a fatal configuration error.
pub struct ProviderRegistry {
    binder: Arc<ComponentBinder>,
    declarations: Arc<DeclarationRegistry>,
    resolver: Arc<dyn DependencyResolver + Send + Sync>,
    populator: Arc<ComponentPopulator>,
    processors: Arc<ProcessorRegistry>,
    graph: RwLock<Option<Arc<DependencyGraph>>>,
    providers: RwLock<FxHashMap<ScopeId, Arc<ComponentProvider>>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    #[inline]
    pub fn binder(&self) -> &Arc<ComponentBinder> {
        &self.binder
    }

    #[inline]
    pub fn declarations(&self) -> &Arc<DeclarationRegistry> {
        &self.declarations
    }

    #[inline]
    pub fn processors(&self) -> &Arc<ProcessorRegistry> {
        &self.processors
    }

    #[inline]
    pub fn contexts(&self) -> &Arc<ContextStore> {
        self.populator.contexts()
    }

    /// Returns the provider for the given scope, creating it lazily.
    pub fn provider(&self, scope: &ScopeId) -> Arc<ComponentProvider> {
        if let Some(provider) = self.providers.read().get(scope) {
            return provider.clone();
        }

        self.providers
            .write()
            .entry(scope.clone())
            .or_insert_with(|| {
                debug!("Creating component provider for scope '{scope}'.");
                Arc::new(ComponentProvider::new(
                    scope.clone(),
                    self.binder.clone(),
                    self.populator.clone(),
                    self.processors.clone(),
                ))
            })
            .clone()
    }

    /// Installs a custom provider for its scope. The scope must not be occupied.
    pub fn register_provider(
        &self,
        provider: Arc<ComponentProvider>,
    ) -> Result<(), GraphBuildError> {
        let mut providers = self.providers.write();
        if providers.contains_key(provider.scope()) {
            return Err(GraphBuildError::DuplicateScope(provider.scope().clone()));
        }

        providers.insert(provider.scope().clone(), provider);
        Ok(())
    }

    /// Builds a fresh dependency graph from the current declarations and swaps it
    /// in. The previously built graph, if any, is left untouched for readers
    /// still holding it.
    pub fn rebuild_graph(&self) -> Result<Arc<DependencyGraph>, GraphBuildError> {
        let mut contexts = self.declarations.all();
        let implied = self.resolver.resolve(&contexts)?;
        contexts.extend(implied);

        let builder = DependencyGraphBuilder::new(self.binder.as_ref(), self.resolver.as_ref());
        let graph = Arc::new(builder.build(&contexts)?);

        info!("Dependency graph rebuilt with {} nodes.", graph.len());
        *self.graph.write() = Some(graph.clone());

        Ok(graph)
    }

    /// The most recently built graph.
    pub fn graph(&self) -> Option<Arc<DependencyGraph>> {
        self.graph.read().clone()
    }

    /// Eagerly constructs singletons in every known scope, building the graph
    /// first if no pass has run yet.
    pub fn warm_up(&self) -> Result<(), ComponentError> {
        let graph = match self.graph() {
            Some(graph) => graph,
            None => self.rebuild_graph()?,
        };

        self.provider(&ScopeId::Default);
        let providers: Vec<_> = self.providers.read().values().cloned().collect();
        for provider in providers {
            provider.warm_up(&graph)?;
        }

        Ok(())
    }
}

/// Builder for [ProviderRegistry] with sensible defaults, for easy construction.
pub struct ProviderRegistryBuilder {
    binder: Arc<ComponentBinder>,
    declarations: Arc<DeclarationRegistry>,
    resolver: Option<Arc<dyn DependencyResolver + Send + Sync>>,
    introspector: Arc<dyn Introspector + Send + Sync>,
    processors: Arc<ProcessorRegistry>,
    contexts: Arc<ContextStore>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            binder: Arc::new(ComponentBinder::new()),
            declarations: Arc::new(DeclarationRegistry::new()),
            resolver: None,
            introspector: Arc::new(EmptyIntrospector),
            processors: Arc::new(ProcessorRegistry::new()),
            contexts: Arc::new(ContextStore::new()),
        }
    }

    pub fn with_binder(mut self, binder: Arc<ComponentBinder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn with_declarations(mut self, declarations: Arc<DeclarationRegistry>) -> Self {
        self.declarations = declarations;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver + Send + Sync>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn Introspector + Send + Sync>) -> Self {
        self.introspector = introspector;
        self
    }

    pub fn with_processors(mut self, processors: Arc<ProcessorRegistry>) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_context_store(mut self, contexts: Arc<ContextStore>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn build(self) -> ProviderRegistry {
        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(RegistryDependencyResolver::new(self.declarations.clone()))
        });

        ProviderRegistry {
            binder: self.binder,
            declarations: self.declarations,
            resolver,
            populator: Arc::new(ComponentPopulator::new(self.introspector, self.contexts)),
            processors: self.processors,
            graph: RwLock::new(None),
            providers: RwLock::default(),
        }
    }
}

impl Default for ProviderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::{
        BindingHierarchy, ComponentBinder, FactoryStrategy, Lifecycle, MockHierarchicalBinder,
        StrategyPtr,
    };
    use crate::error::{ComponentError, ComponentResolutionError};
    use crate::instance::{ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr};
    use crate::introspect::{EmptyIntrospector, MockIntrospector};
    use crate::key::{ComponentKey, ScopeId};
    use crate::populate::{ComponentPopulator, ContextStore};
    use crate::processor::ProcessorRegistry;
    use crate::provider::{ComponentProvider, ProviderRegistry};
    use mockall::predicate::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct A;
    struct B;
    struct C;

    fn counting(counter: Arc<AtomicUsize>, lifecycle: Lifecycle) -> StrategyPtr {
        Arc::new(FactoryStrategy::new(lifecycle, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ComponentInstancePtr::new(0) as ComponentInstanceAnyPtr)
        }))
    }

    fn populator() -> Arc<ComponentPopulator> {
        Arc::new(ComponentPopulator::new(
            Arc::new(EmptyIntrospector),
            Arc::new(ContextStore::new()),
        ))
    }

    fn provider_for(binder: Arc<ComponentBinder>) -> ComponentProvider {
        ComponentProvider::new(
            ScopeId::Default,
            binder,
            populator(),
            Arc::new(ProcessorRegistry::new()),
        )
    }

    #[test]
    fn should_report_missing_binding() {
        let provider = provider_for(Arc::new(ComponentBinder::new()));

        assert!(matches!(
            provider.get(&ComponentKey::of::<A>()).unwrap_err(),
            ComponentError::Resolution(ComponentResolutionError::NoBinding(..))
        ));
        assert!(provider
            .get_optional(&ComponentKey::of::<A>())
            .unwrap()
            .is_none());
    }

    #[test]
    fn should_reinvoke_transient_strategies() {
        let counter = Arc::new(AtomicUsize::new(0));
        let binder = Arc::new(ComponentBinder::new());
        let key = ComponentKey::of::<A>();
        binder.bind(&key, counting(counter.clone(), Lifecycle::Transient));

        let provider = provider_for(binder);
        provider.get(&key).unwrap();
        provider.get(&key).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_cache_singletons_per_slot() {
        let counter = Arc::new(AtomicUsize::new(0));
        let binder = Arc::new(ComponentBinder::new());
        let key = ComponentKey::of::<A>();
        binder.bind(&key, counting(counter.clone(), Lifecycle::Singleton));

        let provider = provider_for(binder);
        let first = provider.get(&key).unwrap();
        let second = provider.get(&key).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn should_not_cache_failed_singleton_builds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let attempts = counter.clone();
        let binder = Arc::new(ComponentBinder::new());
        let key = ComponentKey::of::<A>();
        let failing_key = key.clone();
        binder.bind(
            &key,
            Arc::new(FactoryStrategy::singleton(move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ComponentError::Instantiation {
                        key: failing_key.clone(),
                        cause: Arc::new(std::fmt::Error) as ErrorPtr,
                    })
                } else {
                    Ok(ComponentInstancePtr::new(0) as ComponentInstanceAnyPtr)
                }
            })),
        );

        let provider = provider_for(binder);
        assert!(provider.get(&key).is_err());
        assert!(provider.get(&key).is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_name_peer_in_two_component_cycles() {
        let binder = Arc::new(ComponentBinder::new());
        let a = ComponentKey::of::<A>();
        let b = ComponentKey::of::<B>();

        let b_for_a = b.clone();
        binder.bind(
            &a,
            Arc::new(FactoryStrategy::transient(move |accessor| {
                accessor.get(&b_for_a)
            })),
        );
        let a_for_b = a.clone();
        binder.bind(
            &b,
            Arc::new(FactoryStrategy::transient(move |accessor| {
                accessor.get(&a_for_b)
            })),
        );

        let provider = provider_for(binder);
        match provider.get(&a).unwrap_err() {
            ComponentError::Cycle(error) => {
                assert_eq!(error.key, a);
                assert_eq!(error.implicated, Some(b));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn should_not_attribute_deep_cycles() {
        let binder = Arc::new(ComponentBinder::new());
        let a = ComponentKey::of::<A>();
        let b = ComponentKey::of::<B>();
        let c = ComponentKey::of::<C>();

        for (from, to) in [(&a, &b), (&b, &c), (&c, &a)] {
            let target = to.clone();
            binder.bind(
                from,
                Arc::new(FactoryStrategy::transient(move |accessor| {
                    accessor.get(&target)
                })),
            );
        }

        let provider = provider_for(binder);
        match provider.get(&a).unwrap_err() {
            ComponentError::Cycle(error) => {
                assert_eq!(error.key, a);
                assert_eq!(error.implicated, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn should_query_binder_for_each_request() {
        let key = ComponentKey::of::<A>();
        let mut hierarchy = BindingHierarchy::new(key.clone());
        hierarchy.add(
            0,
            counting(Arc::new(AtomicUsize::new(0)), Lifecycle::Transient),
        );
        let hierarchy = Arc::new(hierarchy);

        let mut binder = MockHierarchicalBinder::new();
        binder
            .expect_hierarchy()
            .with(eq(key.clone()))
            .times(2)
            .returning(move |_| Some(hierarchy.clone()));

        let provider = ComponentProvider::new(
            ScopeId::Default,
            Arc::new(binder),
            populator(),
            Arc::new(ProcessorRegistry::new()),
        );
        provider.get(&key).unwrap();
        provider.get(&key).unwrap();
    }

    #[test]
    fn should_skip_population_for_types_without_views() {
        let key = ComponentKey::of::<A>();
        let binder = Arc::new(ComponentBinder::new());
        binder.bind(
            &key,
            counting(Arc::new(AtomicUsize::new(0)), Lifecycle::Transient),
        );

        let mut introspector = MockIntrospector::new();
        introspector
            .expect_type_view()
            .with(eq(*key.ty()))
            .times(1)
            .returning(|_| None);

        let provider = ComponentProvider::new(
            ScopeId::Default,
            binder,
            Arc::new(ComponentPopulator::new(
                Arc::new(introspector),
                Arc::new(ContextStore::new()),
            )),
            Arc::new(ProcessorRegistry::new()),
        );
        provider.get(&key).unwrap();
    }

    #[test]
    fn should_create_providers_lazily_and_reject_duplicates() {
        let registry = ProviderRegistry::builder().build();
        let scope = ScopeId::named("request");

        let first = registry.provider(&scope);
        let second = registry.provider(&scope);
        assert!(Arc::ptr_eq(&first, &second));

        let duplicate = Arc::new(ComponentProvider::new(
            scope,
            registry.binder().clone(),
            populator(),
            Arc::new(ProcessorRegistry::new()),
        ));
        assert!(registry.register_provider(duplicate).is_err());
    }
}

//! Transforms a flat set of dependency contexts into a [DependencyGraph] with
//! correct parent/child edges and no duplicate-priority ambiguity.
//!
//! Ambiguity is surfaced at build time on purpose: binding conflicts fail fast
//! with every contributing origin listed, instead of producing non-deterministic
//! runtime behavior.

use crate::binding::HierarchicalBinder;
use crate::context::{
    ComponentMemberType, ContextEntry, DependencyContext, ImplementationDependencyContext,
};
use crate::error::GraphBuildError;
use crate::graph::{DependencyGraph, NodeId};
use crate::key::ComponentKey;
use crate::resolver::DependencyResolver;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Grouping key of the builder's intermediate node index. Keys compete per slot,
/// so nodes are bucketed by `(priority, key)` and the highest populated priority
/// wins a lookup.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
struct PriorityComponentKey {
    priority: i32,
    key: ComponentKey,
}

impl PriorityComponentKey {
    fn new(priority: i32, key: ComponentKey) -> Self {
        Self { priority, key }
    }
}

#[derive(Default)]
struct NodeIndex {
    /// Slot registrations: a declared context under its own key (and collector
    /// slot when composite), an implementation pairing under its declaring key.
    claims: FxHashMap<PriorityComponentKey, Vec<NodeId>>,
    /// Implementation-type registrations of implementation pairings, reachable
    /// when no declared context claims the bucket.
    aliases: FxHashMap<PriorityComponentKey, Vec<NodeId>>,
    priorities: FxHashMap<ComponentKey, BTreeSet<i32>>,
}

impl NodeIndex {
    fn claim(&mut self, bucket: PriorityComponentKey, id: NodeId) {
        self.priorities
            .entry(bucket.key.clone())
            .or_default()
            .insert(bucket.priority);
        self.claims.entry(bucket).or_default().push(id);
    }

    fn alias(&mut self, bucket: PriorityComponentKey, id: NodeId) {
        self.priorities
            .entry(bucket.key.clone())
            .or_default()
            .insert(bucket.priority);
        self.aliases.entry(bucket).or_default().push(id);
    }

    fn nodes(&self, bucket: &PriorityComponentKey) -> &[NodeId] {
        self.claims
            .get(bucket)
            .or_else(|| self.aliases.get(bucket))
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }
}

/// Builds [DependencyGraph]s from dependency contexts, using the binder to
/// resolve each context's effective strategy and the resolver to discover the
/// declarations backing type-aware strategies.
pub struct DependencyGraphBuilder<'a> {
    binder: &'a dyn HierarchicalBinder,
    resolver: &'a dyn DependencyResolver,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(binder: &'a dyn HierarchicalBinder, resolver: &'a dyn DependencyResolver) -> Self {
        Self { binder, resolver }
    }

    pub fn build(
        &self,
        contexts: &[Arc<DependencyContext>],
    ) -> Result<DependencyGraph, GraphBuildError> {
        let entries = contexts
            .iter()
            .map(|context| self.inflate(context))
            .collect_vec();

        let mut graph = DependencyGraph::default();
        let mut index = NodeIndex::default();

        for entry in &entries {
            let id = graph.add_node(entry.clone());
            Self::index_entry(&mut index, entry, id);
        }

        Self::check_slot_ambiguity(&graph, &index)?;

        for (entry_index, context) in contexts.iter().enumerate() {
            let own = NodeId(entry_index);
            graph.add_root(own);

            for dependency in context
                .dependencies()
                .iter()
                .sorted_by_cached_key(|key| key.to_string())
            {
                let selected = Self::select_dependency_nodes(&graph, &index, dependency, context)?;
                if selected.is_empty() {
                    debug!(
                        "No graph node found for dependency '{dependency}' of '{}'; deferring to resolution time.",
                        context.key()
                    );
                    continue;
                }

                for parent in selected {
                    graph.add_edge(own, parent);
                    graph.add_root(parent);
                }
            }
        }

        Ok(graph)
    }

    /// Resolves the effective strategy for a declared context and, when it is
    /// type-aware, pairs the context with the implementation's own declaration.
    fn inflate(&self, context: &Arc<DependencyContext>) -> ContextEntry {
        let strategy = self
            .binder
            .hierarchy(context.key())
            .and_then(|hierarchy| hierarchy.single_strategy().ok())
            .unwrap_or_else(|| context.strategy().clone());

        let Some(target) = strategy.target_type() else {
            return ContextEntry::Declared(context.clone());
        };

        if target == *context.key().ty() {
            return ContextEntry::Declared(context.clone());
        }

        match self.resolver.declaration_of(&target) {
            Some(implementation) => {
                debug!(
                    "Resolved implementation '{}' for '{}'.",
                    implementation.key(),
                    context.key()
                );

                ContextEntry::Implementation(ImplementationDependencyContext::new(
                    implementation,
                    context.clone(),
                ))
            }
            None => {
                debug!(
                    "No declaration known for implementation type '{target}' backing '{}'; keeping the declared context.",
                    context.key()
                );

                ContextEntry::Declared(context.clone())
            }
        }
    }

    fn index_entry(index: &mut NodeIndex, entry: &ContextEntry, id: NodeId) {
        let priority = entry.priority();
        let slot = entry.slot_key().clone();

        if entry.member_type() == ComponentMemberType::Composite {
            index.claim(
                PriorityComponentKey::new(priority, slot.collector_key()),
                id,
            );
        }
        index.claim(PriorityComponentKey::new(priority, slot), id);

        if let Some(implementation) = entry.implementation_key() {
            index.alias(
                PriorityComponentKey::new(priority, implementation.clone()),
                id,
            );
        }
    }

    /// More than one non-collection contributor in a single `(priority, key)`
    /// bucket cannot coexist; collections aggregate many equally-prioritized
    /// members and are exempt.
    fn check_slot_ambiguity(
        graph: &DependencyGraph,
        index: &NodeIndex,
    ) -> Result<(), GraphBuildError> {
        for (bucket, ids) in index
            .claims
            .iter()
            .sorted_by_cached_key(|(bucket, _)| bucket.key.to_string())
        {
            if ids.len() > 1 && !Self::all_collection_members(graph, ids) {
                return Err(Self::ambiguity_error(graph, bucket, ids));
            }
        }

        Ok(())
    }

    fn select_dependency_nodes(
        graph: &DependencyGraph,
        index: &NodeIndex,
        dependency: &ComponentKey,
        context: &DependencyContext,
    ) -> Result<Vec<NodeId>, GraphBuildError> {
        let Some(available) = index.priorities.get(dependency) else {
            return Ok(vec![]);
        };

        // A higher-priority binding may depend on the same key at a lower
        // priority - the override pattern, not a cycle.
        let priority = if dependency == context.key() {
            available.range(..context.priority()).next_back().copied()
        } else {
            available.iter().next_back().copied()
        };

        let Some(priority) = priority else {
            return Ok(vec![]);
        };

        let bucket = PriorityComponentKey::new(priority, dependency.clone());
        let selected = index.nodes(&bucket).to_vec();

        if selected.len() > 1 && !Self::all_collection_members(graph, &selected) {
            return Err(Self::ambiguity_error(graph, &bucket, &selected));
        }

        Ok(selected)
    }

    fn all_collection_members(graph: &DependencyGraph, ids: &[NodeId]) -> bool {
        ids.iter()
            .all(|id| graph.node(*id).entry().member_type() == ComponentMemberType::Composite)
    }

    fn ambiguity_error(
        graph: &DependencyGraph,
        bucket: &PriorityComponentKey,
        ids: &[NodeId],
    ) -> GraphBuildError {
        GraphBuildError::AmbiguousDependency {
            key: bucket.key.clone(),
            priority: bucket.priority,
            origins: ids
                .iter()
                .map(|id| graph.node(*id).entry().origin().clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::{ComponentBinder, ConstantStrategy, Lifecycle, StrategyPtr, TypeStrategy};
    use crate::context::{ContextEntry, DefinitionOrigin, DependencyContext};
    use crate::error::GraphBuildError;
    use crate::graph::builder::DependencyGraphBuilder;
    use crate::instance::{ComponentInstanceAnyPtr, ComponentInstancePtr};
    use crate::key::ComponentKey;
    use crate::resolver::{DeclarationRegistry, RegistryDependencyResolver};
    use std::sync::Arc;

    struct ServiceInterface;
    struct ServiceImplementation;
    struct Consumer;
    struct Handler;

    fn opaque() -> StrategyPtr {
        Arc::new(ConstantStrategy::new(
            ComponentInstancePtr::new(0) as ComponentInstanceAnyPtr
        ))
    }

    fn type_aware<T: 'static>() -> StrategyPtr {
        Arc::new(TypeStrategy::new::<T, _>(Lifecycle::Transient, |_| {
            Ok(ComponentInstancePtr::new(0) as ComponentInstanceAnyPtr)
        }))
    }

    fn harness() -> (ComponentBinder, Arc<DeclarationRegistry>) {
        (ComponentBinder::new(), Arc::new(DeclarationRegistry::new()))
    }

    #[test]
    fn should_fail_on_same_priority_non_collection_duplicates() {
        let (binder, registry) = harness();
        let key = ComponentKey::of::<Handler>();
        let first = DependencyContext::builder(key.clone(), opaque())
            .origin(DefinitionOrigin::named("module a"))
            .build();
        let second = DependencyContext::builder(key, opaque())
            .origin(DefinitionOrigin::named("module b"))
            .build();

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let error = builder.build(&[first, second]).unwrap_err();

        match error {
            GraphBuildError::AmbiguousDependency { origins, .. } => {
                assert_eq!(origins.len(), 2);
                assert!(origins.contains(&DefinitionOrigin::named("module a")));
                assert!(origins.contains(&DefinitionOrigin::named("module b")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn should_select_highest_priority_binding() {
        let (binder, registry) = harness();
        let key = ComponentKey::of::<Handler>();
        let low = DependencyContext::builder(key.clone(), opaque())
            .priority(0)
            .build();
        let high = DependencyContext::builder(key.clone(), opaque())
            .priority(1)
            .build();
        let consumer = DependencyContext::builder(ComponentKey::of::<Consumer>(), opaque())
            .depends_on(key)
            .build();

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let graph = builder.build(&[low, high, consumer.clone()]).unwrap();

        let consumer_node = graph
            .nodes()
            .find(|(_, node)| node.entry().slot_key() == consumer.key())
            .map(|(id, _)| id)
            .unwrap();
        let parents = graph.node(consumer_node).parents();

        assert_eq!(parents.len(), 1);
        assert_eq!(graph.node(parents[0]).entry().priority(), 1);
    }

    #[test]
    fn should_aggregate_collection_members_without_conflict() {
        let (binder, registry) = harness();
        let key = ComponentKey::of::<Handler>();
        let members = (0..3)
            .map(|index| {
                DependencyContext::builder(key.clone(), opaque())
                    .composite()
                    .origin(DefinitionOrigin::named(format!("member {index}")))
                    .build()
            })
            .collect::<Vec<_>>();
        let consumer = DependencyContext::builder(ComponentKey::of::<Consumer>(), opaque())
            .depends_on(key.collector_key())
            .build();

        let mut contexts = members;
        contexts.push(consumer.clone());

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let graph = builder.build(&contexts).unwrap();

        let consumer_node = graph
            .nodes()
            .find(|(_, node)| node.entry().slot_key() == consumer.key())
            .map(|(id, _)| id)
            .unwrap();

        assert_eq!(graph.node(consumer_node).parents().len(), 3);
    }

    #[test]
    fn should_allow_override_by_priority_self_dependency() {
        let (binder, registry) = harness();
        let key = ComponentKey::of::<Handler>();
        let base = DependencyContext::builder(key.clone(), opaque())
            .priority(0)
            .build();
        let decorator = DependencyContext::builder(key.clone(), opaque())
            .priority(1)
            .depends_on(key)
            .build();

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let graph = builder.build(&[base, decorator]).unwrap();

        // the decorator depends strictly on the lower-priority node
        let decorator_node = graph
            .nodes()
            .find(|(_, node)| node.entry().priority() == 1)
            .map(|(id, _)| id)
            .unwrap();
        let parents = graph.node(decorator_node).parents();

        assert_eq!(parents.len(), 1);
        assert_eq!(graph.node(parents[0]).entry().priority(), 0);
        assert!(graph.resolution_order().is_ok());
    }

    #[test]
    fn should_inflate_interface_bindings_to_implementation_pairings() {
        let (binder, registry) = harness();
        let implementation = DependencyContext::builder(
            ComponentKey::of::<ServiceImplementation>(),
            opaque(),
        )
        .build();
        registry.declare(implementation);

        let interface_key = ComponentKey::of::<ServiceInterface>();
        binder.bind(&interface_key, type_aware::<ServiceImplementation>());
        let interface =
            DependencyContext::builder(interface_key.clone(), type_aware::<ServiceImplementation>())
                .build();

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let graph = builder.build(&[interface]).unwrap();

        assert_eq!(graph.len(), 1);
        let (_, node) = graph.nodes().next().unwrap();
        assert!(matches!(node.entry(), ContextEntry::Implementation(..)));
        assert_eq!(node.entry().slot_key(), &interface_key);
        assert_eq!(
            node.entry().implementation_key(),
            Some(&ComponentKey::of::<ServiceImplementation>())
        );
    }

    #[test]
    fn should_defer_unknown_dependencies_to_resolution_time() {
        let (binder, registry) = harness();
        let consumer = DependencyContext::builder(ComponentKey::of::<Consumer>(), opaque())
            .depends_on(ComponentKey::of::<Handler>())
            .build();

        let resolver = RegistryDependencyResolver::new(registry);
        let builder = DependencyGraphBuilder::new(&binder, &resolver);
        let graph = builder.build(&[consumer]).unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.node(graph.roots()[0]).parents().is_empty());
    }
}

//! Priority-aware dependency graph resolution and component provisioning.
//!
//! Components are declared as bindings from a [key](key::ComponentKey) to one or
//! more [instantiation strategies](binding::InstantiationStrategy) competing by
//! priority. Declared [dependency contexts](context::DependencyContext) are
//! inflated and wired into a [dependency graph](graph::DependencyGraph), which
//! fails fast on ambiguous same-priority bindings and drives eager singleton
//! warm-up. At request time a per-scope [provider](provider::ComponentProvider)
//! resolves the winning strategy, applies its lifecycle, detects cycles, and
//! routes the instance through population and processors before handing it out.
//!
//! ```
//! use std::sync::Arc;
//! use trellis_di::binding::FactoryStrategy;
//! use trellis_di::instance::{ComponentInstanceAnyPtr, ComponentInstancePtr};
//! use trellis_di::key::{ComponentKey, ScopeId};
//! use trellis_di::provider::ProviderRegistry;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let registry = ProviderRegistry::builder().build();
//! let key = ComponentKey::of::<Greeter>();
//! registry.binder().bind(
//!     &key,
//!     Arc::new(FactoryStrategy::singleton(|_| {
//!         Ok(ComponentInstancePtr::new(Greeter {
//!             greeting: "hello".to_string(),
//!         }) as ComponentInstanceAnyPtr)
//!     })),
//! );
//!
//! let provider = registry.provider(&ScopeId::Default);
//! let greeter = provider.get_typed::<Greeter>(&key).unwrap();
//! assert_eq!(greeter.greeting, "hello");
//! ```

pub mod binding;
pub mod context;
pub mod error;
pub mod graph;
pub mod instance;
pub mod introspect;
pub mod key;
pub mod populate;
pub mod processor;
pub mod provider;
pub mod proxy;
pub mod resolver;

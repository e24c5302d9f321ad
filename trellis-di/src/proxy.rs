//! Proxying seam. The engine ships no proxy mechanism of its own - a
//! [ProxyFactory] capability produces an object standing in for the target, and
//! the [ProxyProcessor] adapter runs any factory as a post-population processor.
//! Delegation, interception and pass-through semantics belong to the factory
//! implementation.

use crate::error::ComponentError;
use crate::instance::ComponentInstanceAnyPtr;
use crate::key::ComponentKey;
use crate::processor::ComponentProcessor;
use crate::provider::ComponentAccessor;
use std::sync::Arc;

/// Produces proxies wrapping behavior around a component.
pub trait ProxyFactory {
    fn proxy(
        &self,
        key: &ComponentKey,
        target: ComponentInstanceAnyPtr,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError>;
}

/// Adapter running a [ProxyFactory] in the post-population processor phase, so
/// callers receive the proxy instead of the raw component.
pub struct ProxyProcessor {
    factory: Arc<dyn ProxyFactory + Send + Sync>,
}

impl ProxyProcessor {
    pub fn new(factory: Arc<dyn ProxyFactory + Send + Sync>) -> Self {
        Self { factory }
    }
}

impl ComponentProcessor for ProxyProcessor {
    fn process(
        &self,
        key: &ComponentKey,
        instance: ComponentInstanceAnyPtr,
        _accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        self.factory.proxy(key, instance)
    }
}

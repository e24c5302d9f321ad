//! Pre- and post-processors transform components around population, letting
//! cross-cutting behavior attach to components without the components knowing
//! about it. Processors run in ascending priority order, deterministically.

use crate::error::ComponentError;
use crate::instance::ComponentInstanceAnyPtr;
use crate::key::ComponentKey;
use crate::provider::ComponentAccessor;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ProcessorPtr = Arc<dyn ComponentProcessor + Send + Sync>;

/// Pipeline stage a processor runs in, relative to population.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ProcessorPhase {
    Pre,
    Post,
}

/// Transforms a component during provisioning. A processor may return the
/// instance it was given, a decorated view of it, or a replacement (e.g. a
/// proxy).
pub trait ComponentProcessor {
    fn process(
        &self,
        key: &ComponentKey,
        instance: ComponentInstanceAnyPtr,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError>;
}

/// Priority-ordered registry of processors. Registration is safe between
/// resolution passes; a pass iterates over a snapshot taken under a read lock.
#[derive(Default)]
pub struct ProcessorRegistry {
    pre: RwLock<BTreeMap<i32, Vec<ProcessorPtr>>>,
    post: RwLock<BTreeMap<i32, Vec<ProcessorPtr>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, phase: ProcessorPhase, priority: i32, processor: ProcessorPtr) {
        let processors = match phase {
            ProcessorPhase::Pre => &self.pre,
            ProcessorPhase::Post => &self.post,
        };

        processors
            .write()
            .entry(priority)
            .or_default()
            .push(processor);
    }

    /// Processors of the given phase in ascending priority order.
    pub fn snapshot(&self, phase: ProcessorPhase) -> Vec<ProcessorPtr> {
        let processors = match phase {
            ProcessorPhase::Pre => &self.pre,
            ProcessorPhase::Post => &self.post,
        };

        processors
            .read()
            .values()
            .flat_map(|bucket| bucket.iter().cloned())
            .collect()
    }
}

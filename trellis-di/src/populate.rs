//! Post-construction population. Freshly constructed instances are decorated in
//! place: declared fields receive resolved dependencies, then declared methods are
//! invoked with resolved parameters. Required members escalate resolution
//! failures; optional members log and stay unset.

use crate::error::{ComponentError, ComponentRequiredError, ComponentResolutionError};
use crate::instance::ComponentInstanceAnyPtr;
use crate::introspect::{Introspector, MemberSource, ResolvedValue};
use crate::key::{ComponentKey, TypeInfo};
use crate::provider::ComponentAccessor;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Store of context objects, keyed by type and optional name. Context-typed
/// members resolve against this store, independent of the component graph.
#[derive(Default)]
pub struct ContextStore {
    contexts: RwLock<FxHashMap<(TypeInfo, Option<String>), ComponentInstanceAnyPtr>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        ty: TypeInfo,
        name: Option<String>,
        instance: ComponentInstanceAnyPtr,
    ) {
        self.contexts.write().insert((ty, name), instance);
    }

    pub fn lookup(&self, ty: &TypeInfo, name: Option<&str>) -> Option<ComponentInstanceAnyPtr> {
        self.contexts
            .read()
            .get(&(*ty, name.map(str::to_string)))
            .cloned()
    }
}

/// Injects declared fields and methods into constructed instances, using
/// injection metadata supplied by the [Introspector].
pub struct ComponentPopulator {
    introspector: Arc<dyn Introspector + Send + Sync>,
    contexts: Arc<ContextStore>,
}

impl ComponentPopulator {
    pub fn new(
        introspector: Arc<dyn Introspector + Send + Sync>,
        contexts: Arc<ContextStore>,
    ) -> Self {
        Self {
            introspector,
            contexts,
        }
    }

    #[inline]
    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    /// Populates the instance in place and returns without cloning it; the caller
    /// keeps its reference.
    pub fn populate(
        &self,
        ty: &TypeInfo,
        instance: &ComponentInstanceAnyPtr,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<(), ComponentError> {
        let Some(view) = self.introspector.type_view(ty) else {
            return Ok(());
        };

        if view.populate_fields() {
            for field in view.fields() {
                if let Some(value) = self.resolve_member(
                    ty,
                    field.name(),
                    field.key(),
                    field.source(),
                    field.required(),
                    accessor,
                )? {
                    field.apply(instance, value)?;
                }
            }
        }

        if view.populate_methods() {
            for method in view.methods() {
                let mut values = Vec::with_capacity(method.parameters().len());

                for (index, parameter) in method.parameters().iter().enumerate() {
                    let member = format!("{}[{index}]", method.name());
                    values.push(self.resolve_member(
                        ty,
                        &member,
                        parameter.key(),
                        parameter.source(),
                        parameter.required(),
                        accessor,
                    )?);
                }

                method.invoke(instance, values)?;
            }
        }

        Ok(())
    }

    fn resolve_member(
        &self,
        owner: &TypeInfo,
        member: &str,
        key: &ComponentKey,
        source: MemberSource,
        required: bool,
        accessor: &mut ComponentAccessor<'_>,
    ) -> Result<Option<ResolvedValue>, ComponentError> {
        match source {
            MemberSource::Context => match self.contexts.lookup(key.ty(), key.name()) {
                Some(instance) => Ok(Some(ResolvedValue::Instance(instance))),
                None if required => Err(Self::required_error(owner, member, key)),
                None => {
                    warn!("No context object for optional member '{member}' of '{owner}'; leaving it unset.");
                    Ok(None)
                }
            },
            MemberSource::Component if key.is_collector() => Ok(Some(ResolvedValue::Collection(
                accessor.get_all(key)?,
            ))),
            MemberSource::Component => match accessor.get(key) {
                Ok(instance) => Ok(Some(ResolvedValue::Instance(instance))),
                Err(ComponentError::Resolution(ComponentResolutionError::NoBinding(_))) => {
                    if required {
                        Err(Self::required_error(owner, member, key))
                    } else {
                        warn!("No binding for optional member '{member}' of '{owner}'; leaving it unset.");
                        Ok(None)
                    }
                }
                Err(other) => Err(other),
            },
        }
    }

    fn required_error(owner: &TypeInfo, member: &str, key: &ComponentKey) -> ComponentError {
        ComponentRequiredError {
            owner: *owner,
            member: member.to_string(),
            key: key.clone(),
        }
        .into()
    }
}

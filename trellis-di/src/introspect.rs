//! Introspection contract. The engine never reads type metadata itself - a
//! collaborating [Introspector] supplies, per type, the declared injection points
//! as [TypeView]s. How that metadata is produced (code generation, manual
//! registration, an external scanner) is outside the engine.

use crate::error::ComponentError;
use crate::instance::ComponentInstanceAnyPtr;
use crate::key::{ComponentKey, TypeInfo};
use derivative::Derivative;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;
use std::sync::Arc;

/// Supplies injection metadata for types. Returning `None` means the type has no
/// declared injection points and population is a no-op.
#[cfg_attr(test, automock)]
pub trait Introspector {
    fn type_view(&self, ty: &TypeInfo) -> Option<Arc<TypeView>>;
}

/// Introspector which knows no types.
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub struct EmptyIntrospector;

impl Introspector for EmptyIntrospector {
    fn type_view(&self, _ty: &TypeInfo) -> Option<Arc<TypeView>> {
        None
    }
}

/// Where a member's value is resolved from.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum MemberSource {
    /// Through the active component provider.
    #[default]
    Component,
    /// Through the context store, independent of the component graph.
    Context,
}

/// A value resolved for an injection point.
#[derive(Clone)]
pub enum ResolvedValue {
    Instance(ComponentInstanceAnyPtr),
    Collection(Vec<ComponentInstanceAnyPtr>),
}

type ApplyFn =
    dyn Fn(&ComponentInstanceAnyPtr, ResolvedValue) -> Result<(), ComponentError> + Send + Sync;

type InvokeFn = dyn Fn(&ComponentInstanceAnyPtr, Vec<Option<ResolvedValue>>) -> Result<(), ComponentError>
    + Send
    + Sync;

/// An injectable field. The apply closure stores the resolved value into the
/// component instance; interior mutability is the component author's concern.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct FieldView {
    name: String,
    key: ComponentKey,
    source: MemberSource,
    required: bool,
    #[derivative(Debug = "ignore")]
    apply: Arc<ApplyFn>,
}

impl FieldView {
    /// Creates a required component-sourced field. A collector key makes the
    /// field collection-typed, resolved against the implicit collection slot.
    pub fn new<N, F>(name: N, key: ComponentKey, apply: F) -> Self
    where
        N: Into<String>,
        F: Fn(&ComponentInstanceAnyPtr, ResolvedValue) -> Result<(), ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            key,
            source: MemberSource::Component,
            required: true,
            apply: Arc::new(apply),
        }
    }

    /// Missing bindings for optional fields are logged and left unset instead of
    /// escalating.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn from_context(mut self) -> Self {
        self.source = MemberSource::Context;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    #[inline]
    pub fn source(&self) -> MemberSource {
        self.source
    }

    #[inline]
    pub fn required(&self) -> bool {
        self.required
    }

    pub fn apply(
        &self,
        instance: &ComponentInstanceAnyPtr,
        value: ResolvedValue,
    ) -> Result<(), ComponentError> {
        (self.apply)(instance, value)
    }
}

/// A single parameter of an injectable method.
#[derive(Clone, Debug)]
pub struct ParameterView {
    key: ComponentKey,
    source: MemberSource,
    required: bool,
}

impl ParameterView {
    pub fn new(key: ComponentKey) -> Self {
        Self {
            key,
            source: MemberSource::Component,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn from_context(mut self) -> Self {
        self.source = MemberSource::Context;
        self
    }

    #[inline]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    #[inline]
    pub fn source(&self) -> MemberSource {
        self.source
    }

    #[inline]
    pub fn required(&self) -> bool {
        self.required
    }
}

/// An injectable method, invoked with every parameter resolved like a field
/// value. Optional parameters which cannot be resolved are passed as `None`.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct MethodView {
    name: String,
    parameters: Vec<ParameterView>,
    #[derivative(Debug = "ignore")]
    invoke: Arc<InvokeFn>,
}

impl MethodView {
    pub fn new<N, F>(name: N, parameters: Vec<ParameterView>, invoke: F) -> Self
    where
        N: Into<String>,
        F: Fn(&ComponentInstanceAnyPtr, Vec<Option<ResolvedValue>>) -> Result<(), ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            parameters,
            invoke: Arc::new(invoke),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters(&self) -> &[ParameterView] {
        &self.parameters
    }

    pub fn invoke(
        &self,
        instance: &ComponentInstanceAnyPtr,
        values: Vec<Option<ResolvedValue>>,
    ) -> Result<(), ComponentError> {
        (self.invoke)(instance, values)
    }
}

/// Injection metadata for a single type. By default both fields and methods are
/// populated; a type can opt out of either.
#[derive(Clone, Debug)]
pub struct TypeView {
    ty: TypeInfo,
    populate_fields: bool,
    populate_methods: bool,
    fields: Vec<FieldView>,
    methods: Vec<MethodView>,
}

impl TypeView {
    pub fn builder(ty: TypeInfo) -> TypeViewBuilder {
        TypeViewBuilder {
            ty,
            populate_fields: true,
            populate_methods: true,
            fields: vec![],
            methods: vec![],
        }
    }

    #[inline]
    pub fn ty(&self) -> &TypeInfo {
        &self.ty
    }

    #[inline]
    pub fn populate_fields(&self) -> bool {
        self.populate_fields
    }

    #[inline]
    pub fn populate_methods(&self) -> bool {
        self.populate_methods
    }

    #[inline]
    pub fn fields(&self) -> &[FieldView] {
        &self.fields
    }

    #[inline]
    pub fn methods(&self) -> &[MethodView] {
        &self.methods
    }
}

pub struct TypeViewBuilder {
    ty: TypeInfo,
    populate_fields: bool,
    populate_methods: bool,
    fields: Vec<FieldView>,
    methods: Vec<MethodView>,
}

impl TypeViewBuilder {
    pub fn field(mut self, field: FieldView) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodView) -> Self {
        self.methods.push(method);
        self
    }

    pub fn skip_fields(mut self) -> Self {
        self.populate_fields = false;
        self
    }

    pub fn skip_methods(mut self) -> Self {
        self.populate_methods = false;
        self
    }

    pub fn build(self) -> Arc<TypeView> {
        Arc::new(TypeView {
            ty: self.ty,
            populate_fields: self.populate_fields,
            populate_methods: self.populate_methods,
            fields: self.fields,
            methods: self.methods,
        })
    }
}

/// Introspector backed by explicitly registered type views.
#[derive(Default)]
pub struct StaticIntrospector {
    views: FxHashMap<TypeId, Arc<TypeView>>,
}

impl StaticIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, view: Arc<TypeView>) -> Self {
        self.views.insert(view.ty().id(), view);
        self
    }
}

impl Introspector for StaticIntrospector {
    fn type_view(&self, ty: &TypeInfo) -> Option<Arc<TypeView>> {
        self.views.get(&ty.id()).cloned()
    }
}

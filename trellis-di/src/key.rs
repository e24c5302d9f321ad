//! Component identity. A [ComponentKey] is the immutable identity of a requested
//! component - its type, optional parameterization, optional name qualifier, scope
//! and enable flag. Keys are used as map keys throughout the engine; priority is
//! deliberately not part of identity, since priorities break ties among providers
//! competing for the same slot.

use std::any::{type_name, TypeId};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Reified type identity, detached from any live reflection. Equality and hashing
/// consider only the [TypeId]; the name is carried for diagnostics.
#[derive(Copy, Clone, Debug)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Marker type for the implicit "many of T" container slot. A collector key is a
/// key whose type is `ComponentCollection` parameterized with the element type; it
/// aggregates all collection-member bindings registered for that element.
pub struct ComponentCollection;

/// Identifier of an isolation boundary under which singleton instances are cached
/// independently. Each scope gets its own component provider.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ScopeId {
    #[default]
    Default,
    Named(String),
}

impl ScopeId {
    pub fn named<T: Into<String>>(name: T) -> Self {
        Self::Named(name.into())
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeId::Default => f.write_str("default"),
            ScopeId::Named(name) => f.write_str(name),
        }
    }
}

/// Immutable identity of a requested component. Two keys built from identical
/// `(type, parameters, name, scope, enable)` tuples are equal and hash identically;
/// changing any one field breaks equality. Note keys differing only in the enable
/// flag are distinct bindable slots.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ComponentKey {
    ty: TypeInfo,
    parameters: Vec<TypeInfo>,
    name: Option<String>,
    scope: ScopeId,
    enable: bool,
}

impl ComponentKey {
    /// Starts building a key for the given type with default scope, no name and
    /// enable set.
    pub fn builder<T: ?Sized + 'static>() -> ComponentKeyBuilder {
        ComponentKeyBuilder::new(TypeInfo::of::<T>())
    }

    /// Shorthand for `builder::<T>().build()`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::builder::<T>().build()
    }

    /// Seeds a new builder with this key's field values, for deriving a named or
    /// rescoped variant without touching the original.
    pub fn mutable(&self) -> ComponentKeyBuilder {
        ComponentKeyBuilder {
            ty: self.ty,
            parameters: self.parameters.clone(),
            name: self.name.clone(),
            scope: self.scope.clone(),
            enable: self.enable,
        }
    }

    /// Reduced key usable for bucketing the same logical component across scopes.
    pub fn view(&self) -> KeyView {
        KeyView {
            ty: self.ty,
            parameters: self.parameters.clone(),
            name: self.name.clone(),
        }
    }

    /// The collector variant of this key - shorthand for
    /// `mutable().collector().build()`.
    pub fn collector_key(&self) -> ComponentKey {
        self.mutable().collector().build()
    }

    #[inline]
    pub fn ty(&self) -> &TypeInfo {
        &self.ty
    }

    #[inline]
    pub fn parameters(&self) -> &[TypeInfo] {
        &self.parameters
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    #[inline]
    pub fn enable(&self) -> bool {
        self.enable
    }

    /// Checks whether this key addresses the implicit collection slot.
    pub fn is_collector(&self) -> bool {
        self.ty == TypeInfo::of::<ComponentCollection>()
    }

    /// Element type of a collector key.
    pub fn collected(&self) -> Option<&TypeInfo> {
        if self.is_collector() {
            self.parameters.first()
        } else {
            None
        }
    }
}

impl Display for ComponentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(element) = self.collected() {
            write!(f, "collection of {element}")?;
        } else {
            write!(f, "{}", self.ty)?;

            if !self.parameters.is_empty() {
                let parameters = self
                    .parameters
                    .iter()
                    .map(|parameter| parameter.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "<{parameters}>")?;
            }
        }

        if let Some(name) = &self.name {
            write!(f, " (named \"{name}\")")?;
        }

        if self.scope != ScopeId::Default {
            write!(f, " in scope {}", self.scope)?;
        }

        if !self.enable {
            f.write_str(" [disabled]")?;
        }

        Ok(())
    }
}

/// Scope-independent view of a key - type and name only. Used purely for map
/// bucketing where scope independence is required.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyView {
    ty: TypeInfo,
    parameters: Vec<TypeInfo>,
    name: Option<String>,
}

impl KeyView {
    #[inline]
    pub fn ty(&self) -> &TypeInfo {
        &self.ty
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Mutable builder for [ComponentKey]s. Building never fails; every field has a
/// sensible default.
pub struct ComponentKeyBuilder {
    ty: TypeInfo,
    parameters: Vec<TypeInfo>,
    name: Option<String>,
    scope: ScopeId,
    enable: bool,
}

impl ComponentKeyBuilder {
    fn new(ty: TypeInfo) -> Self {
        Self {
            ty,
            parameters: vec![],
            name: None,
            scope: ScopeId::Default,
            enable: true,
        }
    }

    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scope(mut self, scope: ScopeId) -> Self {
        self.scope = scope;
        self
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn parameter_types<T: IntoIterator<Item = TypeInfo>>(mut self, parameters: T) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    /// Rewrites the key under construction into the collector slot for its current
    /// type. The element type already identifies a concrete parameterized type, so
    /// previous explicit parameters are replaced by the element itself. Calling
    /// this on an already-collector key is a no-op.
    pub fn collector(mut self) -> Self {
        let marker = TypeInfo::of::<ComponentCollection>();
        if self.ty != marker {
            self.parameters = vec![self.ty];
            self.ty = marker;
        }

        self
    }

    pub fn build(self) -> ComponentKey {
        ComponentKey {
            ty: self.ty,
            parameters: self.parameters,
            name: self.name,
            scope: self.scope,
            enable: self.enable,
        }
    }
}

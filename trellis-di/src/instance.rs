//! Pointer types for component instances. Instances are shared, type-erased and
//! thread-safe, since provisioning must be safe under concurrent first-access.

use std::any::Any;
use std::error::Error;
use std::sync::Arc;

/// Shared pointer to a concrete component instance.
pub type ComponentInstancePtr<T> = Arc<T>;

/// Type-erased shared pointer to a component instance.
pub type ComponentInstanceAnyPtr = Arc<dyn Any + Send + Sync + 'static>;

/// Shared pointer to a dynamic error, used when carrying construction failures
/// across type-erased boundaries.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

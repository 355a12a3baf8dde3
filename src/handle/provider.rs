//! The CastProvider Capability
//!
//! The type-erased face of a handle. The boundary layer only ever sees
//! `&dyn CastProvider`; everything it can learn or do goes through here.

use core::any::Any;
use core::ptr::NonNull;

use super::typed::TypedHandle;
use crate::types::TypeIdentity;

/// Capability exposed by every handle.
pub trait CastProvider: Any + Send + Sync {
    /// Identity of the wrapped object's declared type.
    fn type_identity(&self) -> TypeIdentity;

    /// Address of the wrapped object, type-erased.
    fn opaque_ptr(&self) -> NonNull<()>;

    /// Number of other live handles sharing this one's ownership record.
    fn count(&self) -> usize;

    /// Walk the declared cast targets for `target`.
    ///
    /// Does not consider the handle's own type; see `cast_to_identity`.
    fn project_to(&self, target: TypeIdentity) -> Option<NonNull<()>>;

    /// Check if `target` appears among the declared cast targets.
    fn declares_target(&self, target: TypeIdentity) -> bool;

    /// Name of the concrete handle type, e.g. `TypedHandle<app::Circle>`.
    fn handle_type_name(&self) -> &'static str;

    /// Upcast for concrete-type recovery.
    fn as_any(&self) -> &dyn Any;

    /// A new boxed handle sharing this one's ownership.
    fn clone_provider(&self) -> Box<dyn CastProvider>;

    /// Resolve a pointer to `target`: exact identity first, then the
    /// declared targets in order.
    fn cast_to_identity(&self, target: TypeIdentity) -> Option<NonNull<()>> {
        if self.type_identity() == target {
            return Some(self.opaque_ptr());
        }
        self.project_to(target)
    }
}

impl<'a> dyn CastProvider + 'a {
    /// Typed view of the wrapped object as a `U`, if reachable.
    pub fn dynamic_cast_to<U: 'static>(&self) -> Option<NonNull<U>> {
        self.cast_to_identity(TypeIdentity::of::<U>()).map(NonNull::cast)
    }

    /// Check if `dynamic_cast_to::<U>` would succeed.
    pub fn can_cast_to<U: 'static>(&self) -> bool {
        self.dynamic_cast_to::<U>().is_some()
    }

    /// Recover the concrete handle, if this provider is a `TypedHandle<T>`.
    pub fn downcast_handle<T: 'static>(&self) -> Option<&TypedHandle<T>> {
        self.as_any().downcast_ref::<TypedHandle<T>>()
    }

    /// Check if this provider is exactly a `TypedHandle<T>`.
    pub fn is_handle_of<T: 'static>(&self) -> bool {
        self.as_any().is::<TypedHandle<T>>()
    }
}

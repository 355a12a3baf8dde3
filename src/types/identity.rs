//! Runtime Type Identity
//!
//! A comparable token standing in for "the true concrete type" of a
//! wrapped object. Built on `core::any::TypeId`, which is stable for the
//! lifetime of the process, and paired with the type's name for
//! diagnostics.

use core::any::{type_name, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};

/// Identity of a concrete type.
///
/// Two identities are equal iff they were produced for the same type.
/// The name is carried only for error messages and never takes part in
/// comparisons.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    /// Identity of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this is the identity of `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIdentity({})", self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

//! Cast Target Lists
//!
//! The explicit, author-declared set of types a handle may be viewed as,
//! besides its own. Each entry pairs a target `TypeIdentity` with a
//! projection from the wrapped object to that target.
//!
//! Entries are tried in declaration order; the first projection that
//! yields a pointer wins. Lists are expected to name distinct types.

use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::types::TypeIdentity;

type Projection = Box<dyn Fn(NonNull<()>) -> Option<NonNull<()>> + Send + Sync>;

struct CastTarget {
    target: TypeIdentity,
    project: Projection,
}

/// Declared cast targets for handles wrapping a `T`.
pub struct CastTargetList<T: ?Sized> {
    targets: Vec<CastTarget>,
    _phantom: PhantomData<fn(&T)>,
}

impl<T: 'static> CastTargetList<T> {
    /// Create an empty list: only exact-type casts succeed.
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Declare `U` reachable through `project`.
    ///
    /// `project` is handed the handle's own pointer to the live `T`, which
    /// carries read and write provenance. Derive the result from it without
    /// going through a shared reference (e.g. `addr_of_mut!`) so the
    /// boundary may write through the returned pointer.
    ///
    /// The projection may decline by returning None; the walk then moves
    /// on to later entries.
    pub fn with<U: 'static>(mut self, project: fn(NonNull<T>) -> Option<NonNull<U>>) -> Self {
        self.targets.push(CastTarget {
            target: TypeIdentity::of::<U>(),
            project: Box::new(move |ptr: NonNull<()>| project(ptr.cast()).map(NonNull::cast)),
        });
        self
    }

    /// Declare `U` reachable by reinterpreting the object's address.
    ///
    /// # Safety
    /// A `T` must be usable as a `U` at the same address, e.g. `U` is the
    /// first field of a `#[repr(C)]` `T`, or `T` is `#[repr(transparent)]`
    /// over `U`.
    pub unsafe fn with_reinterpret<U: 'static>(mut self) -> Self {
        self.targets.push(CastTarget {
            target: TypeIdentity::of::<U>(),
            project: Box::new(Some::<NonNull<()>>),
        });
        self
    }

    /// Project a pointer to the wrapped `T` onto `target`.
    ///
    /// `object` must point to a live `T`.
    pub(crate) fn project(&self, object: NonNull<T>, target: TypeIdentity) -> Option<NonNull<()>> {
        self.targets
            .iter()
            .filter(|c| c.target == target)
            .find_map(|c| (c.project)(object.cast()))
    }
}

impl<T: ?Sized> CastTargetList<T> {
    /// Number of declared targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if no targets are declared.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Check if `target` is declared.
    pub fn contains(&self, target: TypeIdentity) -> bool {
        self.targets.iter().any(|c| c.target == target)
    }

    /// Declared targets, in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = TypeIdentity> + '_ {
        self.targets.iter().map(|c| c.target)
    }
}

impl<T: 'static> Default for CastTargetList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for CastTargetList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.targets()).finish()
    }
}

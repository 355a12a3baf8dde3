//! Ownership Records
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   OwnershipRecord                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  id: u64                 - Unique within its registry    │
//! │  addr: ObjectAddr        - Address of the owned object   │
//! │  type_identity           - Type the record was made for  │
//! │  holders: AtomicUsize    - Live handles sharing it       │
//! │  deleter: Deleter        - Type-erased destroy action    │
//! └──────────────────────────────────────────────────────────┘
//! ```

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc;

use spin::Mutex;

use crate::types::{ObjectAddr, TypeIdentity};

/// A type-erased action that destroys one object.
///
/// Captured when a record is created so that destruction never needs the
/// object's static type.
pub struct Deleter {
    target: TypeIdentity,
    destroy: Box<dyn FnOnce() + Send>,
}

impl Deleter {
    /// Wrap an arbitrary destroy action for an object of type `target`.
    pub fn new(target: TypeIdentity, destroy: impl FnOnce() + Send + 'static) -> Self {
        Self {
            target,
            destroy: Box::new(destroy),
        }
    }

    /// Deleter that reclaims a `Box<T>` previously leaked at `addr`.
    ///
    /// # Safety
    /// `addr` must come from `Box::<T>::into_raw`, and nothing else may free it.
    pub unsafe fn boxed<T: Send + 'static>(addr: ObjectAddr) -> Self {
        Self::new(TypeIdentity::of::<T>(), move || {
            // SAFETY: guaranteed by the caller of `boxed`.
            drop(unsafe { Box::from_raw(addr.cast::<T>().as_ptr()) });
        })
    }

    /// Deleter for an object placed by `allocate_unique::<T>` at `addr`.
    ///
    /// # Safety
    /// `addr` must come from `allocate_unique::<T>`, and nothing else may free it.
    pub unsafe fn unique<T: Send + 'static>(addr: ObjectAddr) -> Self {
        Self::new(TypeIdentity::of::<T>(), move || {
            let ptr = addr.cast::<T>().as_ptr();
            // SAFETY: guaranteed by the caller of `unique`; the layout
            // matches the one used by `allocate_unique`.
            unsafe {
                ptr.drop_in_place();
                alloc::dealloc(ptr.cast(), unique_layout::<T>());
            }
        })
    }

    /// Identity of the type this deleter destroys.
    #[inline]
    pub fn target(&self) -> TypeIdentity {
        self.target
    }

    /// Destroy the object.
    pub(crate) fn run(self) {
        (self.destroy)()
    }
}

impl fmt::Debug for Deleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deleter({})", self.target)
    }
}

/// Layout of a `T` padded to at least one byte.
///
/// Zero-sized values still need an address no other live object shares.
fn unique_layout<T>() -> Layout {
    let layout = Layout::new::<T>();
    if layout.size() > 0 {
        return layout;
    }
    match Layout::from_size_align(1, layout.align()) {
        Ok(padded) => padded,
        Err(_) => unreachable!("alignment of a type is always a valid power of two"),
    }
}

/// Move `value` to a heap cell whose address is unique among live objects,
/// zero-sized `T` included.
///
/// Release the cell with `Deleter::unique::<T>`.
pub(crate) fn allocate_unique<T>(value: T) -> NonNull<T> {
    let layout = unique_layout::<T>();
    // SAFETY: `layout` has a non-zero size.
    let raw = unsafe { alloc::alloc(layout) }.cast::<T>();
    let Some(ptr) = NonNull::new(raw) else {
        alloc::handle_alloc_error(layout)
    };
    // SAFETY: freshly allocated, correctly sized and aligned for `T`.
    unsafe { ptr.as_ptr().write(value) };
    ptr
}

/// Bookkeeping for one live object address.
///
/// Records are only created and retired by `HandleRegistry`. The holder
/// count is only modified while the owning shard lock is held.
pub struct OwnershipRecord {
    id: u64,
    addr: ObjectAddr,
    type_identity: TypeIdentity,
    holders: AtomicUsize,
    deleter: Mutex<Option<Deleter>>,
}

impl OwnershipRecord {
    pub(crate) fn new(id: u64, addr: ObjectAddr, deleter: Deleter) -> Self {
        Self {
            id,
            addr,
            type_identity: deleter.target(),
            holders: AtomicUsize::new(0),
            deleter: Mutex::new(Some(deleter)),
        }
    }

    /// Serial number, unique within the registry that created the record.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address of the owned object.
    #[inline]
    pub fn addr(&self) -> ObjectAddr {
        self.addr
    }

    /// Type the record was created for.
    #[inline]
    pub fn type_identity(&self) -> TypeIdentity {
        self.type_identity
    }

    /// Number of live holders.
    #[inline]
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }

    /// Add a holder. Caller holds the shard lock.
    #[inline]
    pub(crate) fn retain(&self) -> usize {
        self.holders.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a holder, returning the remaining count. Caller holds the shard lock.
    #[inline]
    pub(crate) fn unretain(&self) -> usize {
        let prev = self.holders.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "ownership record holder underflow");
        prev - 1
    }

    /// Take the deleter out. Yields `Some` at most once.
    pub(crate) fn take_deleter(&self) -> Option<Deleter> {
        self.deleter.lock().take()
    }
}

impl fmt::Debug for OwnershipRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipRecord")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("type", &self.type_identity)
            .field("holders", &self.holders())
            .finish()
    }
}

//! Typed Handles
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   TypedHandle<T>                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  registry: Arc<HandleRegistry>  - Where the record lives │
//! │  record: Arc<OwnershipRecord>   - Shared with siblings   │
//! │  ptr: NonNull<T>                - The wrapped object     │
//! │  casts: Arc<CastTargetList<T>>  - Declared cast targets  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//! - Created from a value (one unique heap cell per value), or by adopting
//!   a raw `Box`-allocated pointer
//! - Each clone joins the same record; nothing is allocated
//! - Each drop releases one holder; the last one destroys the object

use core::any::{type_name, Any};
use core::ffi::c_void;
use core::fmt;
use core::mem::size_of;
use core::ptr::NonNull;
use std::sync::Arc;

use super::cast::CastTargetList;
use super::provider::CastProvider;
use crate::error::{HandleError, Result};
use crate::registry::{allocate_unique, Deleter, HandleRegistry, OwnershipRecord};
use crate::types::{ObjectAddr, TypeIdentity};

/// A reference-counted handle to one object of type `T`.
pub struct TypedHandle<T> {
    registry: Arc<HandleRegistry>,
    record: Arc<OwnershipRecord>,
    ptr: NonNull<T>,
    casts: Arc<CastTargetList<T>>,
}

// SAFETY: the handle shares `T` across threads the way `Arc<T>` does.
unsafe impl<T: Send + Sync> Send for TypedHandle<T> {}
unsafe impl<T: Send + Sync> Sync for TypedHandle<T> {}

impl<T: Send + 'static> TypedHandle<T> {
    /// Move `value` to the heap and wrap it.
    pub fn new(registry: &Arc<HandleRegistry>, value: T) -> Self {
        Self::with_casts(registry, value, CastTargetList::new())
    }

    /// Move `value` to the heap and wrap it with declared cast targets.
    ///
    /// Every value gets its own address, zero-sized ones included, so two
    /// independent values never share a record.
    pub fn with_casts(registry: &Arc<HandleRegistry>, value: T, casts: CastTargetList<T>) -> Self {
        let ptr = allocate_unique(value);
        let addr = ObjectAddr::from_non_null(ptr);
        // SAFETY: `ptr` is a fresh `allocate_unique` cell owned by no one else.
        let record = registry.acquire(addr, || unsafe { Deleter::unique::<T>(addr) });
        Self::assemble(registry, record, ptr, casts)
    }

    /// Wrap a copy of `value`.
    pub fn copy_from(registry: &Arc<HandleRegistry>, value: &T) -> Self
    where
        T: Clone,
    {
        Self::new(registry, value.clone())
    }

    /// Adopt an object already on the heap.
    ///
    /// If `ptr` is already registered the handle joins the existing record.
    /// A zero-sized `T` has no distinct heap address, so it is moved out of
    /// its box into a fresh cell and gets a record of its own.
    ///
    /// # Safety
    /// `ptr` must come from `Box::<T>::into_raw` and must not be freed by
    /// anything other than the registry.
    pub unsafe fn from_raw(registry: &Arc<HandleRegistry>, ptr: *mut T) -> Result<Self> {
        unsafe { Self::from_raw_with_casts(registry, ptr, CastTargetList::new()) }
    }

    /// Adopt an object already on the heap, with declared cast targets.
    ///
    /// # Safety
    /// Same as `from_raw`.
    pub unsafe fn from_raw_with_casts(
        registry: &Arc<HandleRegistry>,
        ptr: *mut T,
        casts: CastTargetList<T>,
    ) -> Result<Self> {
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| HandleError::invalid_argument("pointer must not be null"))?;

        if size_of::<T>() == 0 {
            // SAFETY: forwarded from the caller; the box is consumed here.
            let value = *unsafe { Box::from_raw(ptr.as_ptr()) };
            return Ok(Self::with_casts(registry, value, casts));
        }

        let addr = ObjectAddr::from_non_null(ptr);
        // SAFETY: forwarded from the caller.
        let record = registry.acquire(addr, || unsafe { Deleter::boxed::<T>(addr) });
        if !record.type_identity().is::<T>() {
            log::warn!(
                "{} adopted as {} but its record was created for {}",
                addr,
                type_name::<T>(),
                record.type_identity()
            );
        }

        Ok(Self::assemble(registry, record, ptr, casts))
    }

    fn assemble(
        registry: &Arc<HandleRegistry>,
        record: Arc<OwnershipRecord>,
        ptr: NonNull<T>,
        casts: CastTargetList<T>,
    ) -> Self {
        Self {
            registry: registry.clone(),
            record,
            ptr,
            casts: Arc::new(casts),
        }
    }
}

impl<T> TypedHandle<T> {
    /// Number of other live handles sharing this handle's record.
    ///
    /// A handle never counts itself: a lone handle reports 0.
    #[inline]
    pub fn count(&self) -> usize {
        self.record.holders().saturating_sub(1)
    }

    /// Typed pointer to the wrapped object, valid while this handle lives.
    #[inline]
    pub fn get_ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// The same address, type-erased.
    #[inline]
    pub fn get_opaque_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// Shared reference to the wrapped object.
    #[inline]
    pub fn get(&self) -> &T {
        // SAFETY: the object lives at least as long as any handle to it.
        unsafe { self.ptr.as_ref() }
    }

    /// Ownership record shared with sibling handles.
    #[inline]
    pub fn record(&self) -> &Arc<OwnershipRecord> {
        &self.record
    }

    /// Registry this handle belongs to.
    #[inline]
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Declared cast targets.
    #[inline]
    pub fn casts(&self) -> &CastTargetList<T> {
        &self.casts
    }
}

impl<T: 'static> TypedHandle<T> {
    /// Identity of `T`.
    #[inline]
    pub fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    /// Typed view of the wrapped object as a `U`, if reachable.
    pub fn dynamic_cast_to<U: 'static>(&self) -> Option<NonNull<U>> {
        if self.type_identity().is::<U>() {
            return Some(self.ptr.cast());
        }
        self.casts
            .project(self.ptr, TypeIdentity::of::<U>())
            .map(NonNull::cast)
    }

    /// Check if `dynamic_cast_to::<U>` would succeed.
    pub fn can_cast_to<U: 'static>(&self) -> bool {
        self.dynamic_cast_to::<U>().is_some()
    }

    /// A boxed sibling handle, for handing out as an opaque token.
    pub fn new_reference_handle(&self) -> Box<Self> {
        Box::new(self.clone())
    }
}

impl<T> Clone for TypedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            record: self.registry.share(&self.record),
            ptr: self.ptr,
            casts: self.casts.clone(),
        }
    }
}

impl<T> Drop for TypedHandle<T> {
    fn drop(&mut self) {
        self.registry.release(self.record.addr());
    }
}

impl<T> fmt::Debug for TypedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandle")
            .field("type", &type_name::<T>())
            .field("addr", &self.record.addr())
            .field("record", &self.record.id())
            .field("count", &self.count())
            .field("casts", &self.casts)
            .finish()
    }
}

impl<T: Send + Sync + 'static> CastProvider for TypedHandle<T> {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    fn opaque_ptr(&self) -> NonNull<()> {
        self.ptr.cast()
    }

    fn count(&self) -> usize {
        TypedHandle::count(self)
    }

    fn project_to(&self, target: TypeIdentity) -> Option<NonNull<()>> {
        self.casts.project(self.ptr, target)
    }

    fn declares_target(&self, target: TypeIdentity) -> bool {
        self.casts.contains(target)
    }

    fn handle_type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_provider(&self) -> Box<dyn CastProvider> {
        self.new_reference_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::addr_of_mut;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use proptest::prelude::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Record {
        value: i32,
    }

    /// Counts its own drops.
    struct Tracked {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[repr(C)]
    struct Base {
        id: u32,
    }

    #[repr(C)]
    struct Derived {
        base: Base,
        extra: u64,
    }

    struct Unrelated;

    fn derived_base(d: NonNull<Derived>) -> Option<NonNull<Base>> {
        NonNull::new(unsafe { addr_of_mut!((*d.as_ptr()).base) })
    }

    fn derived_extra(d: NonNull<Derived>) -> Option<NonNull<u64>> {
        NonNull::new(unsafe { addr_of_mut!((*d.as_ptr()).extra) })
    }

    fn tracked(drops: &Arc<AtomicUsize>) -> Tracked {
        Tracked {
            drops: drops.clone(),
        }
    }

    #[test]
    fn test_clone_and_release_counts() {
        let registry = HandleRegistry::with_defaults();
        let original = TypedHandle::new(&registry, Record { value: 42 });
        assert_eq!(original.count(), 0);
        assert_eq!(original.get().value, 42);

        let clone = original.clone();
        assert_eq!(original.count(), 1);
        assert_eq!(clone.count(), 1);
        assert_eq!(clone.get_ptr(), original.get_ptr());

        drop(clone);
        assert_eq!(original.count(), 0);
    }

    #[test]
    fn test_copy_from_allocates_new_object() {
        let registry = HandleRegistry::with_defaults();
        let value = Record { value: 9 };
        let a = TypedHandle::copy_from(&registry, &value);
        let b = TypedHandle::copy_from(&registry, &value);
        assert_ne!(a.get_ptr(), b.get_ptr());
        assert_eq!(a.get(), b.get());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_from_raw_null_rejected() {
        let registry = HandleRegistry::with_defaults();
        let err = unsafe { TypedHandle::<Record>::from_raw(&registry, core::ptr::null_mut()) }
            .unwrap_err();
        assert!(matches!(err, HandleError::InvalidArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_raw_joins_existing_record() {
        let registry = HandleRegistry::with_defaults();
        let drops = Arc::new(AtomicUsize::new(0));
        let raw = Box::into_raw(Box::new(tracked(&drops)));

        let first = unsafe { TypedHandle::from_raw(&registry, raw) }.unwrap();
        let second = unsafe { TypedHandle::from_raw(&registry, raw) }.unwrap();
        assert!(Arc::ptr_eq(first.record(), second.record()));
        assert_eq!(first.count(), 1);

        drop(first);
        drop(second);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_last_release_destroys_once() {
        let registry = HandleRegistry::with_defaults();
        let drops = Arc::new(AtomicUsize::new(0));

        let handle = TypedHandle::new(&registry, tracked(&drops));
        let siblings: Vec<_> = (0..5).map(|_| handle.clone()).collect();
        drop(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(siblings);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_new_value_after_release_gets_fresh_record() {
        let registry = HandleRegistry::with_defaults();
        let drops = Arc::new(AtomicUsize::new(0));

        let first = TypedHandle::new(&registry, tracked(&drops));
        let first_id = first.record().id();
        drop(first);
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let second = TypedHandle::new(&registry, tracked(&drops));
        assert_ne!(second.record().id(), first_id);
        assert_eq!(second.count(), 0);
    }

    static BEACON_DROPS: AtomicUsize = AtomicUsize::new(0);
    static SIGNAL_DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Beacon;

    impl Drop for Beacon {
        fn drop(&mut self) {
            BEACON_DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Signal;

    impl Drop for Signal {
        fn drop(&mut self) {
            SIGNAL_DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    static PULSE_DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Pulse;

    impl Drop for Pulse {
        fn drop(&mut self) {
            PULSE_DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_sized_values_get_distinct_records() {
        let registry = HandleRegistry::with_defaults();
        let beacon_drops = BEACON_DROPS.load(Ordering::SeqCst);
        let signal_drops = SIGNAL_DROPS.load(Ordering::SeqCst);

        let a = TypedHandle::new(&registry, Beacon);
        let b = TypedHandle::new(&registry, Beacon);
        let c = TypedHandle::new(&registry, Signal);

        assert_eq!(a.count(), 0);
        assert_eq!(b.count(), 0);
        assert_eq!(c.count(), 0);
        assert!(!Arc::ptr_eq(a.record(), b.record()));
        assert_ne!(a.get_ptr(), b.get_ptr());
        assert!(c.record().type_identity().is::<Signal>());
        assert_eq!(registry.len(), 3);

        drop(a);
        assert_eq!(BEACON_DROPS.load(Ordering::SeqCst), beacon_drops + 1);
        assert_eq!(b.count(), 0);

        drop(b);
        drop(c);
        assert_eq!(BEACON_DROPS.load(Ordering::SeqCst), beacon_drops + 2);
        assert_eq!(SIGNAL_DROPS.load(Ordering::SeqCst), signal_drops + 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_adopted_zero_sized_boxes_are_separate_objects() {
        let registry = HandleRegistry::with_defaults();
        let pulse_drops = PULSE_DROPS.load(Ordering::SeqCst);

        let a = unsafe { TypedHandle::from_raw(&registry, Box::into_raw(Box::new(Pulse))) }.unwrap();
        let b = unsafe { TypedHandle::from_raw(&registry, Box::into_raw(Box::new(Pulse))) }.unwrap();
        assert_eq!(a.count(), 0);
        assert_eq!(b.count(), 0);
        assert!(!Arc::ptr_eq(a.record(), b.record()));

        drop(a);
        drop(b);
        assert_eq!(PULSE_DROPS.load(Ordering::SeqCst), pulse_drops + 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cast_to_declared_target() {
        let registry = HandleRegistry::with_defaults();
        let casts = CastTargetList::<Derived>::new().with::<Base>(derived_base);
        let handle = TypedHandle::with_casts(
            &registry,
            Derived {
                base: Base { id: 3 },
                extra: 0,
            },
            casts,
        );

        let base = handle.dynamic_cast_to::<Base>().unwrap();
        assert_eq!(base.as_ptr() as usize, handle.get_ptr().as_ptr() as usize);
        assert_eq!(unsafe { base.as_ref() }.id, 3);
        assert!(handle.can_cast_to::<Derived>());
        assert!(!handle.can_cast_to::<Unrelated>());
        assert!(handle.dynamic_cast_to::<Unrelated>().is_none());
    }

    #[test]
    fn test_provider_view_matches_handle() {
        let registry = HandleRegistry::with_defaults();
        let casts = CastTargetList::<Derived>::new().with::<u64>(derived_extra);
        let handle = TypedHandle::with_casts(
            &registry,
            Derived {
                base: Base { id: 1 },
                extra: 77,
            },
            casts,
        );
        let provider: &dyn CastProvider = &handle;

        assert_eq!(provider.type_identity(), TypeIdentity::of::<Derived>());
        assert_eq!(provider.opaque_ptr().as_ptr(), handle.get_opaque_ptr().cast());
        assert!(provider.declares_target(TypeIdentity::of::<u64>()));
        assert_eq!(unsafe { *provider.dynamic_cast_to::<u64>().unwrap().as_ref() }, 77);
        assert!(provider.downcast_handle::<Derived>().is_some());
        assert!(provider.downcast_handle::<Base>().is_none());
        assert!(provider.handle_type_name().contains("TypedHandle"));

        let boxed = provider.clone_provider();
        assert_eq!(boxed.count(), 1);
        assert_eq!(handle.count(), 1);
    }

    #[test]
    fn test_handles_cross_threads() {
        let registry = HandleRegistry::new(crate::registry::RegistryConfig::new().with_shards(4));
        let drops = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..32)
            .map(|_| TypedHandle::new(&registry, tracked(&drops)))
            .collect();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        let clones: Vec<_> = handles.iter().map(Clone::clone).collect();
                        for (c, h) in clones.iter().zip(&handles) {
                            assert!(Arc::ptr_eq(c.record(), h.record()));
                            assert!(c.count() >= 1);
                        }
                    }
                });
            }
        });

        assert_eq!(registry.len(), 32);
        for h in &handles {
            assert_eq!(h.count(), 0);
        }
        drop(handles);
        assert_eq!(drops.load(Ordering::SeqCst), 32);
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn test_count_is_siblings_minus_one(clones in 0usize..40) {
            let registry = HandleRegistry::with_defaults();
            let handle = TypedHandle::new(&registry, Record { value: 1 });
            let siblings: Vec<_> = (0..clones).map(|_| handle.clone()).collect();

            prop_assert_eq!(handle.count(), clones);
            for s in &siblings {
                prop_assert_eq!(s.count(), clones);
            }
        }

        #[test]
        fn test_single_destruction(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let registry = HandleRegistry::with_defaults();
            let drops = Arc::new(AtomicUsize::new(0));
            let mut live = vec![TypedHandle::new(&registry, tracked(&drops))];

            // true clones the newest handle, false releases the oldest
            for clone in ops {
                if clone || live.len() == 1 {
                    let h = live[live.len() - 1].clone();
                    live.push(h);
                } else {
                    live.remove(0);
                }
                prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
                prop_assert_eq!(live[0].count(), live.len() - 1);
            }

            drop(live);
            prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
            prop_assert!(registry.is_empty());
        }
    }
}

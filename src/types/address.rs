//! Object Address Type
//!
//! A type-safe wrapper for the address of a wrapped object.
//!
//! # Properties
//! - An `ObjectAddr` is never null; null is rejected at construction
//! - Addresses compare and hash by value, so they can key the registry
//! - Converting back to a typed pointer is explicit

use core::fmt;
use core::num::NonZeroUsize;
use core::ptr::NonNull;

/// The address of an object managed by the registry.
///
/// This is a newtype over a non-zero `usize`, so a null address cannot be
/// expressed at all. The registry is total over every value of this type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectAddr(NonZeroUsize);

impl ObjectAddr {
    /// Create an address from a raw pointer.
    ///
    /// Returns None if the pointer is null.
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Option<Self> {
        NonZeroUsize::new(ptr as *const () as usize).map(Self)
    }

    /// Create an address from a non-null pointer.
    #[inline]
    pub fn from_non_null<T>(ptr: NonNull<T>) -> Self {
        // A NonNull pointer never has address zero.
        match NonZeroUsize::new(ptr.as_ptr() as *const () as usize) {
            Some(addr) => Self(addr),
            None => unreachable!("NonNull pointer with zero address"),
        }
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0.get()
    }

    /// Get the address as an untyped pointer.
    #[inline]
    pub fn as_opaque(self) -> NonNull<()> {
        // SAFETY: the wrapped value is non-zero.
        unsafe { NonNull::new_unchecked(self.0.get() as *mut ()) }
    }

    /// Reinterpret the address as a pointer to `T`.
    ///
    /// Producing the pointer is safe; dereferencing it is only sound if an
    /// object of type `T` actually lives here.
    #[inline]
    pub fn cast<T>(self) -> NonNull<T> {
        self.as_opaque().cast()
    }
}

impl<T> From<NonNull<T>> for ObjectAddr {
    fn from(ptr: NonNull<T>) -> Self {
        Self::from_non_null(ptr)
    }
}

impl fmt::Debug for ObjectAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectAddr({:#018x})", self.0.get())
    }
}

impl fmt::Display for ObjectAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0.get())
    }
}

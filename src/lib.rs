//! refhandle - Reference-Counted Opaque Handles
//!
//! Exposes natively typed objects through an opaque-pointer boundary while
//! keeping shared ownership correct and letting the receiving side recover
//! a typed pointer safely.
//!
//! # Components
//! - `TypeIdentity`: runtime identity of a wrapped object's concrete type
//! - `HandleRegistry`: address → ownership record table, one record per object
//! - `TypedHandle<T>`: reference-counted owner of one `T`
//! - `CastProvider`: type-erased capability every handle exposes
//! - `boundary`: checked conversions from opaque tokens to typed pointers
//!
//! # Guarantees
//! - At most one ownership record per live address
//! - A handle's `count()` is the number of its live siblings
//! - Each object is destroyed exactly once, when its last handle goes
//! - A cast succeeds only for the wrapped type or a declared cast target
//!
//! # Example
//! ```
//! use refhandle::{as_raw_pointer, CastProvider, HandleRegistry, TypedHandle};
//!
//! let registry = HandleRegistry::with_defaults();
//! let handle = TypedHandle::new(&registry, 42u32);
//! let copy = handle.clone();
//! assert_eq!(handle.count(), 1);
//!
//! let provider: &dyn CastProvider = &copy;
//! let ptr = as_raw_pointer::<u32>(Some(provider)).unwrap();
//! assert_eq!(ptr, handle.get_ptr());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod boundary;
pub mod error;
pub mod handle;
pub mod registry;
pub mod types;

pub use boundary::{as_raw_pointer, as_raw_pointers, checked_downcast};
pub use error::{HandleError, HandleStatus, Result};
pub use handle::{CastProvider, CastTargetList, TypedHandle};
pub use registry::{Deleter, HandleRegistry, OwnershipRecord, RegistryConfig};
pub use types::{ObjectAddr, TypeIdentity};

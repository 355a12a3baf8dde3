//! Typed Handles and Capability Casts
//!
//! A `TypedHandle<T>` is a reference-counted owner of one `T` registered in
//! a `HandleRegistry`. Every handle also implements `CastProvider`, the
//! type-erased capability the boundary layer works with.
//!
//! # Casting
//! A provider can be viewed as:
//! - its own wrapped type (exact identity match), or
//! - any type its author listed in the handle's `CastTargetList`
//!
//! Nothing else is reachable. There is no automatic upcasting.

pub mod cast;
pub mod provider;
pub mod typed;

pub use cast::CastTargetList;
pub use provider::CastProvider;
pub use typed::TypedHandle;

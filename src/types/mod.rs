//! Identity Types
//!
//! The two leaf values every other subsystem keys on.
//!
//! # Design
//! - `ObjectAddr`: the identity of a wrapped object (its address, never null)
//! - `TypeIdentity`: the identity of its concrete type

pub mod address;
pub mod identity;

pub use address::ObjectAddr;
pub use identity::TypeIdentity;

//! Handle Registry
//!
//! The ownership table behind every handle: one record per live object
//! address, holding the number of live handles and the action that
//! destroys the object when that number reaches zero.
//!
//! # Design
//! - Explicit registry objects (`Arc<HandleRegistry>`), no hidden global
//! - Table split into spin-locked shards; an address always maps to the
//!   same shard, so each address is serialized by exactly one lock
//! - Deleters are captured at record creation and run after the record is
//!   removed, outside every table lock
//!
//! # Invariants
//! - At most one record per live address
//! - A record's deleter runs exactly once, when its last holder releases

pub mod config;
pub mod record;
pub mod table;

pub use config::RegistryConfig;
pub use record::{Deleter, OwnershipRecord};
pub(crate) use record::allocate_unique;
pub use table::HandleRegistry;

//! Boundary Accessors
//!
//! What an outward-facing C-callable layer uses to turn opaque tokens back
//! into typed pointers.
//!
//! # Rules
//! - Every input is checked before use; a null token never reaches a handle
//! - Failures are returned immediately as `HandleError`, never swallowed
//! - Batch conversions are all-or-nothing
//!
//! # Surface
//! - `accessors`: `checked_downcast`, `as_raw_pointer`, `as_raw_pointers`
//! - `token`: create/clone/release/count/cast over `*mut HandleToken`

mod accessors;
mod token;

pub use accessors::{as_raw_pointer, as_raw_pointers, checked_downcast};
pub use token::{
    adopt_handle, cast_handle, cast_handle_ptr, checked_token_handle, clone_handle, create_handle,
    create_handle_with_casts, provider_from_token, ref_count, release_handle, HandleToken,
    OpaqueToken,
};

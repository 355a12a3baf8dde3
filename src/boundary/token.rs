//! Opaque Tokens
//!
//! The shape a handle takes when it crosses the C boundary: a thin pointer
//! to a heap cell holding one boxed `CastProvider`. Every token owns
//! exactly one handle, so one token is one holder of the object's record.
//!
//! # Ownership
//! - `create_*`, `adopt_handle`, `clone_handle` and a successful
//!   `cast_handle` return a new token
//! - `release_handle` must be called exactly once per token; the token is
//!   dangling afterwards

use core::any::type_name;
use core::ffi::c_void;
use core::ptr;
use std::sync::Arc;

use super::accessors::checked_downcast;
use crate::error::{HandleError, Result};
use crate::handle::{CastProvider, CastTargetList, TypedHandle};
use crate::registry::HandleRegistry;

/// Heap cell an opaque token points at.
pub struct HandleToken {
    provider: Box<dyn CastProvider>,
}

/// Untyped token handed across the boundary.
pub type OpaqueToken = *mut HandleToken;

impl HandleToken {
    fn into_raw(provider: Box<dyn CastProvider>) -> OpaqueToken {
        Box::into_raw(Box::new(Self { provider }))
    }

    /// The provider in this cell.
    pub fn provider(&self) -> &dyn CastProvider {
        self.provider.as_ref()
    }
}

/// Wrap `value` in a new handle and return its token.
pub fn create_handle<T: Send + Sync + 'static>(registry: &Arc<HandleRegistry>, value: T) -> OpaqueToken {
    create_handle_with_casts(registry, value, CastTargetList::new())
}

/// Wrap `value` with declared cast targets and return its token.
pub fn create_handle_with_casts<T: Send + Sync + 'static>(
    registry: &Arc<HandleRegistry>,
    value: T,
    casts: CastTargetList<T>,
) -> OpaqueToken {
    let handle = TypedHandle::with_casts(registry, value, casts);
    HandleToken::into_raw(Box::new(handle))
}

/// Adopt a heap object and return its token.
///
/// # Safety
/// Same contract as `TypedHandle::from_raw`.
pub unsafe fn adopt_handle<T: Send + Sync + 'static>(
    registry: &Arc<HandleRegistry>,
    raw: *mut T,
    casts: CastTargetList<T>,
) -> Result<OpaqueToken> {
    // SAFETY: forwarded from the caller.
    let handle = unsafe { TypedHandle::from_raw_with_casts(registry, raw, casts) }?;
    Ok(HandleToken::into_raw(Box::new(handle)))
}

/// Resolve a token to its provider.
///
/// # Safety
/// `token` must be null or a live token from this module.
pub unsafe fn provider_from_token<'a>(token: *const HandleToken) -> Option<&'a dyn CastProvider> {
    // SAFETY: forwarded from the caller.
    unsafe { token.as_ref() }.map(HandleToken::provider)
}

/// A new token sharing ownership with `token`. Never allocates a new object.
///
/// # Safety
/// `token` must be null or a live token from this module.
pub unsafe fn clone_handle(token: *const HandleToken) -> Result<OpaqueToken> {
    // SAFETY: forwarded from the caller.
    let provider = unsafe { provider_from_token(token) }.ok_or(HandleError::NullHandle)?;
    Ok(HandleToken::into_raw(provider.clone_provider()))
}

/// Release the handle behind `token`. May destroy the object.
///
/// A null token is ignored.
///
/// # Safety
/// `token` must be null or a live token from this module, and must not be
/// used again afterwards.
pub unsafe fn release_handle(token: OpaqueToken) {
    if token.is_null() {
        log::debug!("release_handle: null token ignored");
        return;
    }
    // SAFETY: forwarded from the caller; the cell was made by `into_raw`.
    drop(unsafe { Box::from_raw(token) });
}

/// Number of other tokens and handles sharing ownership with `token`.
///
/// # Safety
/// `token` must be null or a live token from this module.
pub unsafe fn ref_count(token: *const HandleToken) -> Result<usize> {
    // SAFETY: forwarded from the caller.
    let provider = unsafe { provider_from_token(token) }.ok_or(HandleError::NullHandle)?;
    Ok(provider.count())
}

/// A new token sharing ownership with `token`, if its object can be viewed
/// as a `T`; null otherwise.
///
/// The result is a full token: it counts towards `ref_count`, works with
/// every other function here, and must be released with `release_handle`.
///
/// # Safety
/// `token` must be null or a live token from this module.
pub unsafe fn cast_handle<T: 'static>(token: *const HandleToken) -> OpaqueToken {
    // SAFETY: forwarded from the caller.
    match unsafe { provider_from_token(token) } {
        Some(provider) if provider.can_cast_to::<T>() => HandleToken::into_raw(provider.clone_provider()),
        Some(provider) => {
            log::debug!("cast_handle: {} is not castable to {}", provider.type_identity(), type_name::<T>());
            ptr::null_mut()
        }
        None => ptr::null_mut(),
    }
}

/// Opaque pointer to the object behind `token` viewed as a `T`, or null if
/// `T` is neither its type nor a declared cast target.
///
/// The pointer owns nothing and is valid only while `token` is.
///
/// # Safety
/// `token` must be null or a live token from this module.
pub unsafe fn cast_handle_ptr<T: 'static>(token: *const HandleToken) -> *mut c_void {
    // SAFETY: forwarded from the caller.
    unsafe { provider_from_token(token) }
        .and_then(|p| p.dynamic_cast_to::<T>())
        .map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// The concrete handle behind `token`.
///
/// # Safety
/// `token` must be null or a live token from this module, and must outlive `'a`.
pub unsafe fn checked_token_handle<'a, T: 'static>(token: *const HandleToken) -> Result<&'a TypedHandle<T>> {
    // SAFETY: forwarded from the caller.
    checked_downcast::<T>(unsafe { provider_from_token(token) })
}

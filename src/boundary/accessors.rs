//! Provider-to-pointer conversions.

use core::ptr::NonNull;

use crate::error::{HandleError, Result};
use crate::handle::{CastProvider, TypedHandle};
use crate::types::TypeIdentity;

/// Recover the concrete `TypedHandle<T>` behind a provider.
///
/// # Errors
/// * `NullHandle` - `provider` is None
/// * `TypeMismatch` - the provider is not a `TypedHandle<T>`
pub fn checked_downcast<T: 'static>(provider: Option<&dyn CastProvider>) -> Result<&TypedHandle<T>> {
    let provider = provider.ok_or(HandleError::NullHandle)?;
    provider.downcast_handle::<T>().ok_or_else(|| {
        let expected = TypeIdentity::of::<T>().name();
        let actual = provider.type_identity().name();
        log::debug!("checked_downcast: wanted {}, provider wraps {}", expected, actual);
        HandleError::type_mismatch(expected, actual)
    })
}

/// Resolve a provider to a pointer to `T`.
///
/// An exact `TypedHandle<T>` is answered directly; anything else goes
/// through the provider's declared cast targets.
///
/// # Errors
/// * `InvalidArgument` - `provider` is None
/// * `TypeMismatch` - `T` is neither the wrapped type nor a reachable target
pub fn as_raw_pointer<T: 'static>(provider: Option<&dyn CastProvider>) -> Result<NonNull<T>> {
    let provider = provider
        .ok_or_else(|| HandleError::invalid_argument("pointer is null - not accepted by the API"))?;

    if let Some(handle) = provider.downcast_handle::<T>() {
        return Ok(handle.get_ptr());
    }

    provider.dynamic_cast_to::<T>().ok_or_else(|| {
        let expected = TypeIdentity::of::<T>().name();
        let actual = provider.type_identity().name();
        log::debug!("as_raw_pointer: cannot cast {} to {}", actual, expected);
        HandleError::type_mismatch(expected, actual)
    })
}

/// Resolve every provider to a pointer to `T`.
///
/// Stops at the first failure and reports its position; no partial output
/// is ever returned.
pub fn as_raw_pointers<T: 'static>(providers: &[Option<&dyn CastProvider>]) -> Result<Vec<NonNull<T>>> {
    providers
        .iter()
        .enumerate()
        .map(|(index, provider)| {
            as_raw_pointer::<T>(*provider).map_err(|e| HandleError::Element {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

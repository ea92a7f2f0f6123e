//! C ABI entry points called by natively compiled SolvraScript programs.
//!
//! Type arguments are registry indices; [`NULL_TYPE`] stands for a null
//! object (source side) or missing metadata (target side).

#![allow(unsafe_code)]

use std::ffi::{CStr, c_char, c_void};

use crate::descriptor::TypeId;
use crate::runtime;

/// Sentinel type index meaning "no type".
pub const NULL_TYPE: u32 = u32::MAX;

fn type_arg(raw: u32) -> Option<TypeId> {
    (raw != NULL_TYPE).then(|| TypeId::from_raw(raw))
}

/// Reports `message` and terminates the process.
///
/// # Safety
/// `message` must be `NULL` or point at a NUL-terminated string valid for the
/// duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn solvra_rtti_throw(message: *const c_char) -> ! {
    let text = if message.is_null() {
        String::new()
    } else {
        // SAFETY: caller guarantees a valid NUL-terminated string.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    };
    runtime::throw(&text)
}

/// Terminates the process with a null-reference fault when `pointer` is null.
#[unsafe(no_mangle)]
pub extern "C" fn solvra_rtti_throw_if_null(pointer: *const c_void) {
    if let Err(fault) = crate::guard::guard_ptr(pointer) {
        runtime::reporter().raise(&fault);
    }
}

/// Validates a cast against the installed registry; an illegal cast
/// terminates the process.
///
/// # Safety
/// `target_fingerprint` must be `NULL` or point at a NUL-terminated string
/// valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn solvra_rtti_throw_if_invalid_cast(
    source_type: u32,
    target_type: u32,
    target_fingerprint: *const c_char,
) {
    let fingerprint = if target_fingerprint.is_null() {
        String::new()
    } else {
        // SAFETY: caller guarantees a valid NUL-terminated string.
        unsafe { CStr::from_ptr(target_fingerprint) }
            .to_string_lossy()
            .into_owned()
    };
    runtime::throw_if_invalid_cast(type_arg(source_type), type_arg(target_type), &fingerprint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_maps_to_none() {
        assert_eq!(type_arg(NULL_TYPE), None);
        assert_eq!(type_arg(3), Some(TypeId::from_raw(3)));
    }

    #[test]
    fn non_null_pointer_returns() {
        let value = 5u8;
        solvra_rtti_throw_if_null(&value as *const u8 as *const c_void);
    }

    #[test]
    fn null_source_cast_returns() {
        // SAFETY: a null fingerprint pointer is accepted.
        unsafe {
            solvra_rtti_throw_if_invalid_cast(NULL_TYPE, NULL_TYPE, std::ptr::null());
        }
    }
}

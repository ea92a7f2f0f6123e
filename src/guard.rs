//! Null guard for dereference sites.

use crate::fault::Fault;

/// Returns the reference when present, otherwise a [`Fault::NullReference`].
pub fn guard<T: ?Sized>(reference: Option<&T>) -> Result<&T, Fault> {
    reference.ok_or(Fault::NullReference)
}

/// Raw-pointer form used at the C boundary.
pub fn guard_ptr<T>(pointer: *const T) -> Result<(), Fault> {
    if pointer.is_null() {
        Err(Fault::NullReference)
    } else {
        Ok(())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thin validation layer over [`crate::Kernel`], in the shape of the
//! teacher's `userlib::hl`: small, non-generic-feeling wrapper functions
//! that take a `&mut Kernel` and a handful of plain arguments, and return
//! `Result<T, HelioError>`. `Kernel`'s own methods already validate their
//! arguments, so most of these are direct pass-throughs; the module exists
//! as the one place a future FFI boundary would sit, not to re-check
//! anything `Kernel` already checks.

use helios_abi::HelioError;

/// Maps `Result<(), HelioError>` onto the "0 is success, nonzero is a
/// failure code" convention a C-callable surface over this kernel would
/// use. No `extern "C"` function actually uses this: it exists so layering
/// one is a matter of writing the `#[no_mangle]` shim, not inventing a
/// calling convention.
pub fn status_code(result: Result<(), HelioError>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => 1 + e as u32,
    }
}

/// Maps `Option<T>` onto the "null means absent" convention a C caller
/// would expect from a query that can legitimately find nothing (a handle
/// lookup by name, a queue peek on an empty queue). `sentinel` is whatever
/// the C side has agreed represents "none" for `T`.
pub fn option_or_sentinel<T>(value: Option<T>, sentinel: T) -> T {
    value.unwrap_or(sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_success_is_zero() {
        assert_eq!(status_code(Ok(())), 0);
    }

    #[test]
    fn status_code_failure_is_nonzero() {
        assert_ne!(status_code(Err(HelioError::QueueFull)), 0);
    }

    #[test]
    fn option_or_sentinel_substitutes_on_none() {
        assert_eq!(option_or_sentinel(None::<u32>, 0xffff_ffff), 0xffff_ffff);
        assert_eq!(option_or_sentinel(Some(3u32), 0), 3);
    }
}

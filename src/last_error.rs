//! Per-thread last-error slot used by the C surface.
//!
//! Rust callers get a [`Result`](crate::errors::Result) from every
//! operation; this channel only exists so that `zpk_*` functions can report
//! a message next to their integer status.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

pub fn clear() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub fn set(msg: &str) {
    // interior NULs would truncate the C view of the message
    let msg = if msg.is_empty() {
        CString::new("(empty error message)")
    } else {
        CString::new(msg.replace('\0', "\\0"))
    };
    let msg = msg.unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(msg));
}

pub fn get() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|s| s.to_string_lossy().into_owned())
    })
}

pub fn len() -> usize {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |s| s.as_bytes().len()))
}

/// Copy the message into `buf`, truncating if needed.
///
/// No NUL terminator is written. Returns the number of bytes copied.
pub fn copy_into(buf: &mut [u8]) -> usize {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(msg) => {
            let bytes = msg.as_bytes();
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            n
        }
        None => 0,
    })
}

/// Pointer to the NUL-terminated message, or null when no error is set.
///
/// Stays valid until the channel is next cleared or set on this thread.
pub fn as_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |s| s.as_ptr())
    })
}

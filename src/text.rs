//! Marshalling between Rust strings and the null-terminated UTF-8 buffers
//! the native layer expects.
//!
//! Encoded values own their buffers: the pointer handed to a native call is
//! valid for exactly as long as the [`NativeText`] / [`NativeTextArray`]
//! value lives, so the value must stay in scope until the call returns.

use crate::error::Error;
use libc::c_char;
use std::ffi::{CStr, CString};
use std::ptr;

/// One string encoded for the native boundary.
///
/// The empty string encodes to a single terminator byte. Interior null
/// bytes cannot be represented and fail with [`Error::Encoding`].
pub struct NativeText {
    buf: CString,
}

impl NativeText {
    pub fn new(text: &str) -> Result<Self, Error> {
        match CString::new(text) {
            Ok(buf) => Ok(Self { buf }),
            Err(e) => Err(Error::Encoding {
                reason: format!("interior null byte at offset {}", e.nul_position()),
            }),
        }
    }

    /// Null-terminated buffer, valid while `self` lives.
    pub fn as_ptr(&self) -> *const c_char {
        self.buf.as_ptr()
    }
}

/// An argv-style array of encoded strings.
///
/// Keeps every element buffer alive alongside the pointer table, so one
/// binding at the call site covers the whole array for the duration of the
/// native call.
pub struct NativeTextArray {
    // `ptrs` points into `bufs`; both live and die together.
    bufs: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl NativeTextArray {
    pub fn new<S: AsRef<str>>(texts: &[S]) -> Result<Self, Error> {
        let mut bufs = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            bufs.push(CString::new(text.as_ref()).map_err(|e| Error::Encoding {
                reason: format!(
                    "interior null byte at offset {} in element {i}",
                    e.nul_position()
                ),
            })?);
        }
        let ptrs = bufs.iter().map(|b| b.as_ptr()).collect();
        Ok(Self { bufs, ptrs })
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Pointer table, or NULL for an empty array.
    pub fn as_ptr(&self) -> *const *const c_char {
        if self.ptrs.is_empty() {
            ptr::null()
        } else {
            self.ptrs.as_ptr()
        }
    }
}

/// Decode a native string into owned Rust text.
///
/// # Safety
///
/// `ptr` must be NULL or point to a valid null-terminated string that
/// outlives this call.
pub unsafe fn decode(ptr: *const c_char) -> Result<String, Error> {
    if ptr.is_null() {
        return Err(Error::Encoding {
            reason: "null native string".to_owned(),
        });
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|_| Error::Encoding {
            reason: "native string is not valid UTF-8".to_owned(),
        })
}

/// Best-effort decode for native error messages, which must never
/// themselves fail to decode.
///
/// # Safety
///
/// Same contract as [`decode`].
pub(crate) unsafe fn decode_lossy(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for s in ["a.mp3", "file:///path with spaces/ü.flac", ":input-repeat=1"] {
            let encoded = NativeText::new(s).unwrap();
            assert_eq!(unsafe { decode(encoded.as_ptr()) }.unwrap(), s);
        }
    }

    #[test]
    fn empty_string_is_a_single_terminator() {
        let encoded = NativeText::new("").unwrap();
        assert_eq!(unsafe { *encoded.as_ptr() }, 0);
        assert_eq!(unsafe { decode(encoded.as_ptr()) }.unwrap(), "");
    }

    #[test]
    fn interior_null_is_an_encoding_error() {
        match NativeText::new("a\0b") {
            Err(Error::Encoding { reason }) => assert!(reason.contains("offset 1")),
            other => panic!("expected encoding error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn array_elements_stay_alive_together() {
        let array = NativeTextArray::new(&["--one", "--two"]).unwrap();
        assert_eq!(array.len(), 2);
        let table = array.as_ptr();
        assert_eq!(unsafe { decode(*table) }.unwrap(), "--one");
        assert_eq!(unsafe { decode(*table.add(1)) }.unwrap(), "--two");
    }

    #[test]
    fn empty_array_encodes_to_null_table() {
        let array = NativeTextArray::new::<&str>(&[]).unwrap();
        assert!(array.is_empty());
        assert!(array.as_ptr().is_null());
    }

    #[test]
    fn null_native_string_does_not_decode() {
        assert!(unsafe { decode(ptr::null()) }.is_err());
        assert!(unsafe { decode_lossy(ptr::null()) }.is_none());
    }
}

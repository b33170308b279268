//! Error taxonomy and the per-call native error channel.

use crate::native::{self, RawError};
use crate::text;
use log::trace;
use std::ptr;
use thiserror::Error;

/// Failures surfaced by this crate.
///
/// Every variant reaches the direct caller immediately; nothing is swallowed
/// or retried internally. `Native` means the native layer rejected an
/// otherwise well-formed call and is the only variant worth retrying; the
/// rest report misuse of an already-released or already-removed object, or
/// text that cannot cross the boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The native layer reported a failure through its error out-parameter.
    #[error("native operation failed (code {code}): {message}")]
    Native { code: i32, message: String },

    /// A handle was used after its resource was released.
    #[error("{kind} handle used after release")]
    HandleReleased { kind: &'static str },

    /// The session's handle was released; no further operations are valid.
    #[error("session is closed")]
    SessionClosed,

    /// The playlist item was already deleted or cleared.
    #[error("playlist item already removed")]
    ItemRemoved,

    /// Text cannot be represented as a native string.
    #[error("text cannot cross the native boundary: {reason}")]
    Encoding { reason: String },
}

/// Scoped error cell handed to exactly one native call.
///
/// One channel per call site, constructed clear and never shared between
/// concurrent calls. The native callee is the sole writer; [`raise`] is the
/// sole reader and consumes the state, so a half-handled channel can never
/// be observed twice.
///
/// [`raise`]: ErrorChannel::raise
pub(crate) struct ErrorChannel {
    raw: RawError,
}

impl ErrorChannel {
    pub(crate) fn new() -> Self {
        Self {
            raw: RawError {
                raised: 0,
                code: 0,
                message: ptr::null_mut(),
            },
        }
    }

    /// Pointer passed as the error out-parameter of one native call.
    pub(crate) fn as_mut_ptr(&mut self) -> *mut RawError {
        &mut self.raw
    }

    /// Convert a raised channel into an [`Error`], clearing it first.
    ///
    /// A clear channel is a no-op. Callers must invoke this immediately
    /// after the native call, before using its return value: the value is
    /// undefined until the channel is confirmed clear.
    pub(crate) fn raise(&mut self) -> Result<(), Error> {
        if self.raw.raised == 0 {
            return Ok(());
        }
        let code = self.raw.code;
        let message = unsafe { text::decode_lossy(self.raw.message) }
            .unwrap_or_else(|| String::from("unknown native error"));
        // Reset before the failure is delivered, freeing the native message.
        unsafe { native::error_clear(&mut self.raw) };
        trace!("native error {code}: {message}");
        Err(Error::Native { code, message })
    }
}

impl Drop for ErrorChannel {
    fn drop(&mut self) {
        // Frees the message of a raised channel that was never consumed
        // (early return or panic between the call and its raise check).
        unsafe { native::error_clear(&mut self.raw) };
    }
}

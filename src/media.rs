//! Media descriptor with a lifecycle independent of its session.

use crate::error::{Error, ErrorChannel};
use crate::handle::{MediaKind, NativeHandle};
use crate::native;
use crate::text;
use log::debug;

/// Reference to a native media descriptor.
///
/// Created by [`Session::create_media_ref`] and owned by the caller: closing
/// or dropping the originating session does not release it. The descriptor
/// is released on [`close`] or drop, whichever comes first.
///
/// [`Session::create_media_ref`]: crate::Session::create_media_ref
/// [`close`]: MediaRef::close
pub struct MediaRef {
    handle: NativeHandle<MediaKind>,
}

impl MediaRef {
    pub(crate) fn from_handle(handle: NativeHandle<MediaKind>) -> Self {
        Self { handle }
    }

    /// The locator this descriptor was created from.
    pub fn locator(&self) -> Result<String, Error> {
        let media = self.handle.value()?;
        let mut channel = ErrorChannel::new();
        let raw = unsafe { native::media_mrl(media.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()?;
        let locator = unsafe { text::decode(raw) };
        unsafe { native::string_free(raw) };
        locator
    }

    /// Release the native descriptor. Idempotent; afterwards every accessor
    /// fails with [`Error::HandleReleased`].
    pub fn close(&mut self) {
        if !self.handle.is_released() {
            self.handle.release();
            debug!("media descriptor released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

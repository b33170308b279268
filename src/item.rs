//! Local proxy for one native playlist slot.

use crate::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle to a playlist entry, valid until it is deleted or the playlist is
/// cleared.
///
/// Clones share the invalidation flag: the copy tracked by the session and
/// any copies held by the caller are invalidated together, so a native id
/// that may have been reused is never exposed through a stale proxy.
#[derive(Clone, Debug)]
pub struct PlaylistItem {
    id: i32,
    invalidated: Arc<AtomicBool>,
}

impl PlaylistItem {
    pub(crate) fn new(id: i32) -> Self {
        Self {
            id,
            invalidated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Native id of this entry, or [`Error::ItemRemoved`] once invalidated.
    pub fn id(&self) -> Result<i32, Error> {
        if self.invalidated.load(Ordering::Acquire) {
            return Err(Error::ItemRemoved);
        }
        Ok(self.id)
    }

    pub fn is_removed(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Called by the session once the native entry is gone; never exposed.
    pub(crate) fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }
}

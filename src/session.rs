//! Playlist session: the library instance and its flat playlist.

use crate::error::{Error, ErrorChannel};
use crate::handle::{NativeHandle, SessionKind};
use crate::item::PlaylistItem;
use crate::media::MediaRef;
use crate::native::{self, RawSession};
use crate::text::{NativeText, NativeTextArray};
use libc::c_int;
use log::debug;
use std::collections::HashMap;
use std::ptr::{self, NonNull};

/// Optional fields for [`Session::add`].
///
/// Replaces the overload family of the native API: omitted fields take the
/// native defaults explicitly rather than through call-site variants.
#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    /// User-visible name for the entry; derived from the locator when absent.
    pub name: Option<String>,
    /// Native playback options applied to this entry.
    pub options: Vec<String>,
}

/// A native library session owning a flat playlist.
///
/// Every operation blocks until the native call and its error check
/// complete, in the order issued; there is no internal reordering, retry,
/// or cancellation. Every operation that reaches the native layer takes
/// `&mut self` — the native playlist state is not synchronized — so
/// sharing a session across threads means putting it behind a lock; the
/// remaining accessors only read local state.
///
/// The session is `Open` from construction until [`close`] (or drop)
/// releases its handle; afterwards every operation fails with
/// [`Error::SessionClosed`] without issuing a native call.
///
/// [`close`]: Session::close
pub struct Session {
    handle: NativeHandle<SessionKind>,
    items: HashMap<i32, PlaylistItem>,
}

impl Session {
    /// Create a session from library command line arguments.
    pub fn new(args: &[&str]) -> Result<Self, Error> {
        let argv = NativeTextArray::new(args)?;
        let mut channel = ErrorChannel::new();
        let ptr =
            unsafe { native::session_new(argv.len() as c_int, argv.as_ptr(), channel.as_mut_ptr()) };
        let handle = NativeHandle::from_factory(ptr, &mut channel)?;
        debug!("session created ({} args)", args.len());
        Ok(Self {
            handle,
            items: HashMap::new(),
        })
    }

    /// Liveness guard run before every native call on this session.
    fn guard(&self) -> Result<NonNull<RawSession>, Error> {
        self.handle.value().map_err(|_| Error::SessionClosed)
    }

    /// Set the playlist loop flag.
    pub fn set_loop(&mut self, on: bool) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe {
            native::playlist_set_loop(session.as_ptr(), on as c_int, channel.as_mut_ptr())
        };
        channel.raise()
    }

    /// Start playing the current playlist entry.
    pub fn play(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe {
            native::playlist_play(session.as_ptr(), -1, 0, ptr::null(), channel.as_mut_ptr())
        };
        channel.raise()
    }

    /// Toggle pause: pauses when playing, resumes when paused.
    pub fn toggle_pause(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_pause(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()
    }

    /// Stop playing.
    pub fn stop(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_stop(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()
    }

    /// Switch to the next playlist entry and play it.
    pub fn next(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_next(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()
    }

    /// Switch to the previous playlist entry and play it.
    pub fn prev(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_prev(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()
    }

    /// Whether the playlist is running (as opposed to paused or stopped).
    pub fn is_playing(&mut self) -> Result<bool, Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        let playing =
            unsafe { native::playlist_is_playing(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()?;
        Ok(playing != 0)
    }

    /// Append an entry to the playlist.
    ///
    /// The returned item is tracked by the session until it is deleted or
    /// the playlist is cleared.
    pub fn add(&mut self, locator: &str, options: AddOptions) -> Result<PlaylistItem, Error> {
        let session = self.guard()?;
        let uri = NativeText::new(locator)?;
        let name = options.name.as_deref().map(NativeText::new).transpose()?;
        let optv = NativeTextArray::new(&options.options)?;
        let mut channel = ErrorChannel::new();
        let id = unsafe {
            native::playlist_add(
                session.as_ptr(),
                uri.as_ptr(),
                name.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
                optv.len() as c_int,
                optv.as_ptr(),
                channel.as_mut_ptr(),
            )
        };
        channel.raise()?;

        let item = PlaylistItem::new(id);
        self.items.insert(id, item.clone());
        debug!("added playlist item {id} ({locator})");
        Ok(item)
    }

    /// Remove an entry obtained from [`add`](Session::add).
    ///
    /// The item is invalidated and untracked only after the native call
    /// passes its error check, never optimistically.
    pub fn delete(&mut self, item: &PlaylistItem) -> Result<(), Error> {
        let id = item.id()?;
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_delete(session.as_ptr(), id, channel.as_mut_ptr()) };
        channel.raise()?;

        item.invalidate();
        self.items.remove(&id);
        debug!("deleted playlist item {id}");
        Ok(())
    }

    /// Remove every playlist entry.
    ///
    /// All-or-nothing with respect to local state: when the native call
    /// fails, no tracked item is invalidated.
    pub fn clear(&mut self) -> Result<(), Error> {
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        unsafe { native::playlist_clear(session.as_ptr(), channel.as_mut_ptr()) };
        channel.raise()?;

        for item in self.items.values() {
            item.invalidate();
        }
        self.items.clear();
        debug!("playlist cleared");
        Ok(())
    }

    /// Display name of a tracked entry: the name given at add time, or its
    /// locator.
    pub fn item_name(&mut self, item: &PlaylistItem) -> Result<String, Error> {
        let id = item.id()?;
        let session = self.guard()?;
        let mut channel = ErrorChannel::new();
        let raw =
            unsafe { native::playlist_item_name(session.as_ptr(), id, channel.as_mut_ptr()) };
        channel.raise()?;
        let name = unsafe { crate::text::decode(raw) };
        unsafe { native::string_free(raw) };
        name
    }

    /// Create a media descriptor for a locator.
    ///
    /// The returned [`MediaRef`] is owned by the caller and outlives the
    /// session.
    pub fn create_media_ref(&mut self, locator: &str) -> Result<MediaRef, Error> {
        let session = self.guard()?;
        let mrl = NativeText::new(locator)?;
        let mut channel = ErrorChannel::new();
        let ptr = unsafe {
            native::media_new(session.as_ptr(), mrl.as_ptr(), channel.as_mut_ptr())
        };
        let handle = NativeHandle::from_factory(ptr, &mut channel)?;
        debug!("media descriptor created ({locator})");
        Ok(MediaRef::from_handle(handle))
    }

    /// Number of tracked playlist items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Release the native session. Idempotent; every later operation fails
    /// with [`Error::SessionClosed`]. Dropping the session releases it too.
    pub fn close(&mut self) {
        if !self.handle.is_released() {
            self.handle.release();
            debug!("session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }
}

#[cfg(test)]
impl Session {
    /// Arm the bundled engine so the next native call on this session fails.
    fn fail_next_native_call(&mut self, code: i32, message: &str) {
        let session = self.guard().expect("session open");
        unsafe { native::session_fail_next(session.as_ptr(), code, message) };
    }
}

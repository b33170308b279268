//! The native calling convention and the bundled playlist engine.
//!
//! Every fallible native call has the shape
//! `fn(resource, ...args..., *mut RawError) -> value`: the callee writes the
//! error out-parameter only on failure, and the return value is unspecified
//! whenever `raised != 0`. Strings cross inbound as null-terminated UTF-8
//! buffers; outbound strings are callee-allocated and must be returned with
//! [`string_free`] (or [`error_clear`] for error messages).
//!
//! The engine behind these entry points is compiled in-process. It stands in
//! for the system library build and is only ever reached through the C
//! calling convention above; nothing in the safe layer touches its state
//! directly.

use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::ptr;

/// Native library rejected an argument (null pointer, bad encoding, bad count).
pub(crate) const ERR_BAD_ARGUMENT: c_int = 1;
/// Media resource locator is empty or unusable.
pub(crate) const ERR_BAD_LOCATOR: c_int = 2;
/// No playlist entry with the requested id.
pub(crate) const ERR_NO_SUCH_ITEM: c_int = 3;
/// Operation needs at least one playlist entry.
pub(crate) const ERR_PLAYLIST_EMPTY: c_int = 4;
/// Reached the edge of the playlist with looping disabled.
pub(crate) const ERR_END_REACHED: c_int = 5;

/// Out-parameter error cell, one per native call.
///
/// The callee is the sole writer; `message` is callee-allocated and owned by
/// the cell until [`error_clear`] frees it.
#[repr(C)]
pub(crate) struct RawError {
    pub raised: c_int,
    pub code: c_int,
    pub message: *mut c_char,
}

/// Opaque session resource. Created by [`session_new`], destroyed by
/// [`session_release`]; callers never see the fields.
pub(crate) struct RawSession {
    entries: Vec<Entry>,
    next_id: c_int,
    cursor: usize,
    playing: bool,
    looped: bool,
    fail_next: Option<(c_int, String)>,
}

struct Entry {
    id: c_int,
    locator: String,
    name: Option<String>,
    // Stored verbatim; the bundled engine does not interpret playback options.
    #[allow(dead_code)]
    options: Vec<String>,
}

/// Opaque media descriptor resource.
pub(crate) struct RawMedia {
    locator: String,
}

/// Write a failure into the out-parameter, replacing any earlier one.
///
/// # Safety
///
/// `error` must be a valid pointer or NULL.
unsafe fn raise(error: *mut RawError, code: c_int, message: &str) {
    let Some(e) = (unsafe { error.as_mut() }) else {
        return;
    };
    unsafe { error_clear(e) };
    e.raised = 1;
    e.code = code;
    e.message = CString::new(message)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());
}

/// Reset an error cell to the "no error" state, freeing the message.
///
/// # Safety
///
/// `error` must be a valid pointer or NULL, with `message` either NULL or
/// allocated by this library.
pub(crate) unsafe extern "C" fn error_clear(error: *mut RawError) {
    let Some(e) = (unsafe { error.as_mut() }) else {
        return;
    };
    if !e.message.is_null() {
        drop(unsafe { CString::from_raw(e.message) });
        e.message = ptr::null_mut();
    }
    e.raised = 0;
    e.code = 0;
}

/// Free a string returned by a native call. Safe to call with NULL.
///
/// # Safety
///
/// `s` must be NULL or a pointer returned by this library, not yet freed.
pub(crate) unsafe extern "C" fn string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Dereference the session argument, raising on NULL.
unsafe fn session_arg<'a>(
    session: *mut RawSession,
    error: *mut RawError,
) -> Option<&'a mut RawSession> {
    let s = unsafe { session.as_mut() };
    if s.is_none() {
        unsafe { raise(error, ERR_BAD_ARGUMENT, "null session pointer") };
    }
    s
}

/// Decode a required string argument, raising on NULL or bad encoding.
unsafe fn text_arg<'a>(
    ptr: *const c_char,
    what: &str,
    error: *mut RawError,
) -> Option<&'a str> {
    if ptr.is_null() {
        unsafe { raise(error, ERR_BAD_ARGUMENT, &format!("null {what} pointer")) };
        return None;
    }
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            unsafe { raise(error, ERR_BAD_ARGUMENT, &format!("{what} is not valid UTF-8")) };
            None
        }
    }
}

/// Decode an argv-style string array argument.
unsafe fn text_array_arg(
    count: c_int,
    values: *const *const c_char,
    what: &str,
    error: *mut RawError,
) -> Option<Vec<String>> {
    if count < 0 {
        unsafe { raise(error, ERR_BAD_ARGUMENT, &format!("negative {what} count")) };
        return None;
    }
    if count > 0 && values.is_null() {
        unsafe { raise(error, ERR_BAD_ARGUMENT, &format!("null {what} array")) };
        return None;
    }
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let item = unsafe { *values.add(i) };
        out.push(unsafe { text_arg(item, what, error) }?.to_owned());
    }
    Some(out)
}

/// Consume a pending injected fault, if tests armed one on this session.
unsafe fn take_fault(session: &mut RawSession, error: *mut RawError) -> bool {
    match session.fail_next.take() {
        Some((code, message)) => {
            unsafe { raise(error, code, &message) };
            true
        }
        None => false,
    }
}

/// Arm the session so that its next operation raises `code`/`message`.
///
/// # Safety
///
/// `session` must be a valid session pointer.
#[cfg(test)]
pub(crate) unsafe fn session_fail_next(session: *mut RawSession, code: c_int, message: &str) {
    if let Some(s) = unsafe { session.as_mut() } {
        s.fail_next = Some((code, message.to_owned()));
    }
}

/// Create a session from VLC-style command line arguments.
///
/// # Returns
///
/// Session pointer on success, NULL on failure (error raised).
///
/// # Safety
///
/// `argv` must point to `argc` valid null-terminated strings (or be NULL when
/// `argc` is 0); `error` must be a valid pointer or NULL.
pub(crate) unsafe extern "C" fn session_new(
    argc: c_int,
    argv: *const *const c_char,
    error: *mut RawError,
) -> *mut RawSession {
    // Arguments are validated but otherwise unused by the bundled engine.
    if unsafe { text_array_arg(argc, argv, "argument", error) }.is_none() {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(RawSession {
        entries: Vec::new(),
        next_id: 0,
        cursor: 0,
        playing: false,
        looped: false,
        fail_next: None,
    }))
}

/// Destroy a session. Safe to call with NULL, must be called at most once
/// per pointer (the wrapper's handle guarantees this, the engine does not).
///
/// # Safety
///
/// `session` must be NULL or a live pointer from [`session_new`].
pub(crate) unsafe extern "C" fn session_release(session: *mut RawSession) {
    if !session.is_null() {
        drop(unsafe { Box::from_raw(session) });
    }
}

/// Set the playlist loop flag.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_set_loop(
    session: *mut RawSession,
    on: c_int,
    error: *mut RawError,
) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    s.looped = on != 0;
}

/// Start playing. `id` selects an entry, or -1 for the current one; `optv`
/// carries per-play options.
///
/// # Safety
///
/// `session` must be a live session pointer; `optv` must hold `optc` valid
/// strings or be NULL when `optc` is 0; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_play(
    session: *mut RawSession,
    id: c_int,
    optc: c_int,
    optv: *const *const c_char,
    error: *mut RawError,
) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    if unsafe { text_array_arg(optc, optv, "option", error) }.is_none() {
        return;
    }
    if s.entries.is_empty() {
        unsafe { raise(error, ERR_PLAYLIST_EMPTY, "playlist is empty") };
        return;
    }
    if id >= 0 {
        match s.entries.iter().position(|e| e.id == id) {
            Some(idx) => s.cursor = idx,
            None => {
                unsafe {
                    raise(error, ERR_NO_SUCH_ITEM, &format!("no playlist item with id {id}"))
                };
                return;
            }
        }
    }
    s.playing = true;
}

/// Toggle pause: pauses when playing, resumes when paused.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_pause(session: *mut RawSession, error: *mut RawError) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    s.playing = !s.playing;
}

/// Whether the playlist is currently playing.
///
/// # Returns
///
/// Non-zero when playing; unspecified when an error was raised.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_is_playing(
    session: *mut RawSession,
    error: *mut RawError,
) -> c_int {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return 0;
    };
    if unsafe { take_fault(s, error) } {
        return 0;
    }
    s.playing as c_int
}

/// Stop playing.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_stop(session: *mut RawSession, error: *mut RawError) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    s.playing = false;
}

/// Advance to the next entry and play it, wrapping at the end.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_next(session: *mut RawSession, error: *mut RawError) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    if s.entries.is_empty() {
        unsafe { raise(error, ERR_PLAYLIST_EMPTY, "playlist is empty") };
        return;
    }
    if s.cursor + 1 == s.entries.len() {
        if !s.looped {
            s.playing = false;
            unsafe { raise(error, ERR_END_REACHED, "end of playlist reached") };
            return;
        }
        s.cursor = 0;
    } else {
        s.cursor += 1;
    }
    s.playing = true;
}

/// Step back to the previous entry and play it, wrapping at the start.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_prev(session: *mut RawSession, error: *mut RawError) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    if s.entries.is_empty() {
        unsafe { raise(error, ERR_PLAYLIST_EMPTY, "playlist is empty") };
        return;
    }
    if s.cursor == 0 {
        if !s.looped {
            s.playing = false;
            unsafe { raise(error, ERR_END_REACHED, "start of playlist reached") };
            return;
        }
        s.cursor = s.entries.len() - 1;
    } else {
        s.cursor -= 1;
    }
    s.playing = true;
}

/// Remove every playlist entry and stop playing.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_clear(session: *mut RawSession, error: *mut RawError) {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return;
    };
    if unsafe { take_fault(s, error) } {
        return;
    }
    s.entries.clear();
    s.cursor = 0;
    s.playing = false;
}

/// Append an entry with an optional display name and per-item options.
///
/// # Returns
///
/// The id of the new entry; unspecified when an error was raised.
///
/// # Safety
///
/// `session` must be a live session pointer; `uri` must be a valid string;
/// `name` may be NULL; `optv` must hold `optc` valid strings or be NULL when
/// `optc` is 0; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_add(
    session: *mut RawSession,
    uri: *const c_char,
    name: *const c_char,
    optc: c_int,
    optv: *const *const c_char,
    error: *mut RawError,
) -> c_int {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return 0;
    };
    if unsafe { take_fault(s, error) } {
        return 0;
    }
    let Some(locator) = (unsafe { text_arg(uri, "locator", error) }) else {
        return 0;
    };
    if locator.is_empty() {
        unsafe { raise(error, ERR_BAD_LOCATOR, "cannot open an empty locator") };
        return 0;
    }
    let name = if name.is_null() {
        None
    } else {
        match unsafe { text_arg(name, "name", error) } {
            Some(n) => Some(n.to_owned()),
            None => return 0,
        }
    };
    let Some(options) = (unsafe { text_array_arg(optc, optv, "option", error) }) else {
        return 0;
    };
    let id = s.next_id;
    s.next_id += 1;
    s.entries.push(Entry {
        id,
        locator: locator.to_owned(),
        name,
        options,
    });
    id
}

/// Remove the entry with the given id.
///
/// # Returns
///
/// 1 on success, 0 on failure.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_delete(
    session: *mut RawSession,
    id: c_int,
    error: *mut RawError,
) -> c_int {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return 0;
    };
    if unsafe { take_fault(s, error) } {
        return 0;
    }
    let Some(idx) = s.entries.iter().position(|e| e.id == id) else {
        unsafe { raise(error, ERR_NO_SUCH_ITEM, &format!("no playlist item with id {id}")) };
        return 0;
    };
    s.entries.remove(idx);
    if s.cursor >= s.entries.len() {
        s.cursor = 0;
    }
    1
}

/// Display name of an entry: the name given at add time, or its locator.
///
/// # Returns
///
/// Callee-allocated string, free with [`string_free`]; NULL on failure.
///
/// # Safety
///
/// `session` must be a live session pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn playlist_item_name(
    session: *mut RawSession,
    id: c_int,
    error: *mut RawError,
) -> *mut c_char {
    let Some(s) = (unsafe { session_arg(session, error) }) else {
        return ptr::null_mut();
    };
    if unsafe { take_fault(s, error) } {
        return ptr::null_mut();
    }
    let Some(entry) = s.entries.iter().find(|e| e.id == id) else {
        unsafe { raise(error, ERR_NO_SUCH_ITEM, &format!("no playlist item with id {id}")) };
        return ptr::null_mut();
    };
    let name = entry.name.as_deref().unwrap_or(&entry.locator);
    CString::new(name)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Create a media descriptor for a locator, using the session's state.
///
/// # Returns
///
/// Media pointer on success, NULL on failure (error raised).
///
/// # Safety
///
/// `session` must be a live session pointer; `mrl` must be a valid string;
/// `error` valid or NULL.
pub(crate) unsafe extern "C" fn media_new(
    session: *mut RawSession,
    mrl: *const c_char,
    error: *mut RawError,
) -> *mut RawMedia {
    if unsafe { session_arg(session, error) }.is_none() {
        return ptr::null_mut();
    }
    let Some(locator) = (unsafe { text_arg(mrl, "locator", error) }) else {
        return ptr::null_mut();
    };
    if locator.is_empty() {
        unsafe { raise(error, ERR_BAD_LOCATOR, "cannot open an empty locator") };
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(RawMedia {
        locator: locator.to_owned(),
    }))
}

/// Destroy a media descriptor. Safe to call with NULL, at most once.
///
/// # Safety
///
/// `media` must be NULL or a live pointer from [`media_new`].
pub(crate) unsafe extern "C" fn media_release(media: *mut RawMedia) {
    if !media.is_null() {
        drop(unsafe { Box::from_raw(media) });
    }
}

/// Return the locator a media descriptor was created from.
///
/// # Returns
///
/// Callee-allocated string, free with [`string_free`]; NULL on failure.
///
/// # Safety
///
/// `media` must be a live media pointer; `error` valid or NULL.
pub(crate) unsafe extern "C" fn media_mrl(
    media: *mut RawMedia,
    error: *mut RawError,
) -> *mut c_char {
    let Some(m) = (unsafe { media.as_ref() }) else {
        unsafe { raise(error, ERR_BAD_ARGUMENT, "null media pointer") };
        return ptr::null_mut();
    };
    CString::new(m.locator.clone())
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_error() -> RawError {
        RawError {
            raised: 0,
            code: 0,
            message: ptr::null_mut(),
        }
    }

    #[test]
    fn session_roundtrip_through_c_convention() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };
        assert!(!session.is_null());
        assert_eq!(error.raised, 0);

        let uri = CString::new("file:///music/a.mp3").unwrap();
        let id = unsafe {
            playlist_add(session, uri.as_ptr(), ptr::null(), 0, ptr::null(), &mut error)
        };
        assert_eq!(error.raised, 0);
        assert_eq!(id, 0);

        let deleted = unsafe { playlist_delete(session, id, &mut error) };
        assert_eq!(error.raised, 0);
        assert_eq!(deleted, 1);

        unsafe { session_release(session) };
    }

    #[test]
    fn add_rejects_empty_locator() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };
        let uri = CString::new("").unwrap();

        unsafe { playlist_add(session, uri.as_ptr(), ptr::null(), 0, ptr::null(), &mut error) };
        assert_eq!(error.raised, 1);
        assert_eq!(error.code, ERR_BAD_LOCATOR);
        assert!(!error.message.is_null());

        unsafe { error_clear(&mut error) };
        assert_eq!(error.raised, 0);
        assert!(error.message.is_null());
        unsafe { session_release(session) };
    }

    #[test]
    fn delete_unknown_id_raises() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };

        unsafe { playlist_delete(session, 42, &mut error) };
        assert_eq!(error.raised, 1);
        assert_eq!(error.code, ERR_NO_SUCH_ITEM);

        unsafe { error_clear(&mut error) };
        unsafe { session_release(session) };
    }

    #[test]
    fn next_on_empty_playlist_raises() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };

        unsafe { playlist_next(session, &mut error) };
        assert_eq!(error.raised, 1);
        assert_eq!(error.code, ERR_PLAYLIST_EMPTY);

        unsafe { error_clear(&mut error) };
        unsafe { session_release(session) };
    }

    #[test]
    fn next_honours_loop_flag() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };
        let a = CString::new("a.mp3").unwrap();
        let b = CString::new("b.mp3").unwrap();
        unsafe { playlist_add(session, a.as_ptr(), ptr::null(), 0, ptr::null(), &mut error) };
        unsafe { playlist_add(session, b.as_ptr(), ptr::null(), 0, ptr::null(), &mut error) };

        unsafe { playlist_next(session, &mut error) };
        assert_eq!(error.raised, 0);

        // At the last entry with looping off, next refuses to wrap.
        unsafe { playlist_next(session, &mut error) };
        assert_eq!(error.code, ERR_END_REACHED);
        unsafe { error_clear(&mut error) };

        unsafe { playlist_set_loop(session, 1, &mut error) };
        unsafe { playlist_next(session, &mut error) };
        assert_eq!(error.raised, 0);
        assert_eq!(unsafe { playlist_is_playing(session, &mut error) }, 1);

        unsafe { session_release(session) };
    }

    #[test]
    fn item_name_falls_back_to_locator() {
        let mut error = clear_error();
        let session = unsafe { session_new(0, ptr::null(), &mut error) };
        let uri = CString::new("file:///music/a.mp3").unwrap();
        let name = CString::new("Track A").unwrap();

        let named = unsafe {
            playlist_add(session, uri.as_ptr(), name.as_ptr(), 0, ptr::null(), &mut error)
        };
        let unnamed = unsafe {
            playlist_add(session, uri.as_ptr(), ptr::null(), 0, ptr::null(), &mut error)
        };
        assert_eq!(error.raised, 0);

        let s = unsafe { playlist_item_name(session, named, &mut error) };
        assert_eq!(unsafe { CStr::from_ptr(s) }.to_str().unwrap(), "Track A");
        unsafe { string_free(s) };

        let s = unsafe { playlist_item_name(session, unnamed, &mut error) };
        assert_eq!(
            unsafe { CStr::from_ptr(s) }.to_str().unwrap(),
            "file:///music/a.mp3"
        );
        unsafe { string_free(s) };

        unsafe { session_release(session) };
    }

    #[test]
    fn raise_replaces_earlier_unconsumed_error() {
        let mut error = clear_error();
        unsafe { raise(&mut error, ERR_BAD_LOCATOR, "first") };
        let first = error.message;
        unsafe { raise(&mut error, ERR_NO_SUCH_ITEM, "second") };
        assert_eq!(error.code, ERR_NO_SUCH_ITEM);
        assert_ne!(error.message, first);
        unsafe { error_clear(&mut error) };
    }

    #[test]
    fn null_session_pointer_is_reported_not_dereferenced() {
        let mut error = clear_error();
        unsafe { playlist_pause(ptr::null_mut(), &mut error) };
        assert_eq!(error.raised, 1);
        assert_eq!(error.code, ERR_BAD_ARGUMENT);
        unsafe { error_clear(&mut error) };
    }
}

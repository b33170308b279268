//! Safe Rust bindings for the flat playlist API of a LibVLC-style native
//! media library.
//!
//! The native layer is reference-counted, exception-free C: every fallible
//! call reports failure through an error out-parameter, resources are opaque
//! pointers paired with a release function, and strings are null-terminated
//! UTF-8 buffers. Three mechanisms make that safe to drive from Rust, and
//! everything else in the crate is bookkeeping layered on top:
//!
//! - handles (`handle`): a native pointer is released exactly once, even
//!   under racing disposals, and can never be read after release;
//! - error channels (`error`): one scoped out-parameter per call, inspected
//!   and consumed immediately after it, surfacing as [`Error`];
//! - text marshalling (`text`): encoded buffers stay alive for the full
//!   native call, and interior null bytes are rejected up front.
//!
//! # Thread Safety
//!
//! Handle release is safe from any thread. Every [`Session`] operation
//! that reaches the native layer takes `&mut self`, so sharing a session
//! across threads means putting it behind a lock. All calls block until
//! the native call and its error check complete.
//!
//! # Native layer
//!
//! The engine behind the calling convention is bundled in-process (see
//! `native`); linking an external build of the library replaces that module
//! without touching the safe layer.

mod error;
mod handle;
mod item;
mod media;
mod native;
mod session;
mod text;

pub use error::Error;
pub use item::PlaylistItem;
pub use media::MediaRef;
pub use session::{AddOptions, Session};
pub use text::{NativeText, NativeTextArray, decode};

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!version().is_empty());
    }

    #[test]
    fn full_session_lifecycle() {
        let mut session = Session::new(&["--no-video"]).expect("create session");

        let first = session
            .add(
                "file:///music/one.mp3",
                AddOptions {
                    name: Some("One".to_owned()),
                    options: vec![],
                },
            )
            .unwrap();
        let second = session
            .add("file:///music/two.mp3", AddOptions::default())
            .unwrap();
        assert_eq!(session.len(), 2);
        assert_ne!(first.id().unwrap(), second.id().unwrap());

        session.set_loop(true).unwrap();
        session.play().unwrap();
        assert!(session.is_playing().unwrap());
        session.next().unwrap();
        session.prev().unwrap();
        session.stop().unwrap();
        assert!(!session.is_playing().unwrap());

        session.delete(&first).unwrap();
        assert!(matches!(first.id(), Err(Error::ItemRemoved)));
        assert_eq!(session.len(), 1);

        let mut media = session.create_media_ref("file:///music/two.mp3").unwrap();

        session.clear().unwrap();
        assert!(session.is_empty());
        assert!(second.is_removed());

        session.close();
        assert!(matches!(session.play(), Err(Error::SessionClosed)));

        // The media descriptor lives on after the session is closed.
        assert_eq!(media.locator().unwrap(), "file:///music/two.mp3");
        media.close();
    }

    #[test]
    fn native_failures_carry_code_and_message() {
        let mut session = Session::new(&[]).unwrap();
        match session.add("", AddOptions::default()) {
            Err(Error::Native { code, message }) => {
                assert!(code > 0);
                assert!(message.contains("locator"));
            }
            other => panic!("expected native error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn errors_format_for_display() {
        let err = Error::Native {
            code: 2,
            message: "cannot open an empty locator".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "native operation failed (code 2): cannot open an empty locator"
        );
        assert_eq!(Error::SessionClosed.to_string(), "session is closed");
        assert_eq!(
            Error::ItemRemoved.to_string(),
            "playlist item already removed"
        );
    }

    #[test]
    fn dropping_a_session_releases_it_without_explicit_close() {
        // Drop alone must run the release path; the handle's idempotence is
        // what keeps close-then-drop at a single native free.
        let mut session = Session::new(&[]).unwrap();
        session.add("a.mp3", AddOptions::default()).unwrap();
        drop(session);
    }
}

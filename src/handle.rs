//! Owning wrappers for opaque native resource pointers.
//!
//! A [`NativeHandle`] holds either the live pointer produced by a factory
//! call or null once released, and nothing else. The release transition is
//! an atomic swap, so explicit release, concurrent releases from several
//! threads, and the `Drop` backstop all collapse into exactly one native
//! free. The raw pointer never leaves this module except through the
//! liveness-checked [`value`] accessor.
//!
//! [`value`]: NativeHandle::value

use crate::error::{Error, ErrorChannel};
use crate::native::{self, RawMedia, RawSession};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// A native resource kind: the opaque pointee type plus its release call.
///
/// Implementations are the only place a release function is named, and
/// [`NativeHandle::from_factory`] is the only way a pointer gets wrapped.
pub(crate) trait HandleKind {
    type Raw;
    const NAME: &'static str;

    /// # Safety
    ///
    /// `ptr` must come from this kind's factory call and must not have been
    /// released before.
    unsafe fn release(ptr: *mut Self::Raw);
}

pub(crate) struct SessionKind;

impl HandleKind for SessionKind {
    type Raw = RawSession;
    const NAME: &'static str = "session";

    unsafe fn release(ptr: *mut RawSession) {
        unsafe { native::session_release(ptr) }
    }
}

pub(crate) struct MediaKind;

impl HandleKind for MediaKind {
    type Raw = RawMedia;
    const NAME: &'static str = "media";

    unsafe fn release(ptr: *mut RawMedia) {
        unsafe { native::media_release(ptr) }
    }
}

/// Exclusive owner of one native resource pointer.
pub(crate) struct NativeHandle<K: HandleKind> {
    ptr: AtomicPtr<K::Raw>,
    _kind: PhantomData<K>,
}

// The pointer itself may be read from any thread; the release transition is
// a single atomic swap. Thread rules for the pointee are the native layer's
// own contract.
unsafe impl<K: HandleKind> Send for NativeHandle<K> {}
unsafe impl<K: HandleKind> Sync for NativeHandle<K> {}

impl<K: HandleKind> NativeHandle<K> {
    /// Wrap a factory result, honouring the out-parameter contract: when the
    /// channel is raised the returned pointer is unspecified and must be
    /// neither used nor released.
    pub(crate) fn from_factory(
        ptr: *mut K::Raw,
        channel: &mut ErrorChannel,
    ) -> Result<Self, Error> {
        channel.raise()?;
        match NonNull::new(ptr) {
            Some(p) => Ok(Self {
                ptr: AtomicPtr::new(p.as_ptr()),
                _kind: PhantomData,
            }),
            // The factory contract is a valid pointer or a raised channel,
            // never neither.
            None => Err(Error::Native {
                code: 0,
                message: format!("{} factory returned null without raising an error", K::NAME),
            }),
        }
    }

    /// The underlying resource pointer, failing fast once released.
    pub(crate) fn value(&self) -> Result<NonNull<K::Raw>, Error> {
        NonNull::new(self.ptr.load(Ordering::Acquire)).ok_or(Error::HandleReleased { kind: K::NAME })
    }

    /// Release the underlying resource.
    ///
    /// Idempotent: the swap hands the live pointer to exactly one caller, so
    /// repeated or racing releases and the `Drop` backstop still produce a
    /// single native free.
    pub(crate) fn release(&self) {
        let ptr = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if !ptr.is_null() {
            unsafe { K::release(ptr) };
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }
}

impl<K: HandleKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    /// Test kind whose "release" increments the pointed-at counter instead
    /// of freeing, so each test owns its own free count.
    struct ProbeKind;

    impl HandleKind for ProbeKind {
        type Raw = AtomicUsize;
        const NAME: &'static str = "probe";

        unsafe fn release(ptr: *mut AtomicUsize) {
            unsafe { &*ptr }.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn probe_handle(frees: &AtomicUsize) -> NativeHandle<ProbeKind> {
        let mut channel = ErrorChannel::new();
        NativeHandle::from_factory(frees as *const _ as *mut AtomicUsize, &mut channel)
            .expect("clear channel and non-null pointer")
    }

    #[test]
    fn repeated_release_frees_once() {
        let frees = AtomicUsize::new(0);
        let handle = probe_handle(&frees);
        handle.release();
        handle.release();
        handle.release();
        assert_eq!(frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_after_explicit_release_frees_once() {
        let frees = AtomicUsize::new(0);
        {
            let handle = probe_handle(&frees);
            handle.release();
        }
        assert_eq!(frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_alone_frees_once() {
        let frees = AtomicUsize::new(0);
        drop(probe_handle(&frees));
        assert_eq!(frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn racing_releases_free_once() {
        let frees = AtomicUsize::new(0);
        let handle = probe_handle(&frees);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| handle.release());
            }
        });
        assert_eq!(frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn value_after_release_fails_fast() {
        let frees = AtomicUsize::new(0);
        let handle = probe_handle(&frees);
        assert!(handle.value().is_ok());
        assert!(!handle.is_released());

        handle.release();
        assert!(handle.is_released());
        match handle.value() {
            Err(Error::HandleReleased { kind }) => assert_eq!(kind, "probe"),
            other => panic!("expected HandleReleased, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn raised_factory_channel_means_no_handle() {
        let mut channel = ErrorChannel::new();
        // Negative argc makes the session factory raise and return null.
        let ptr = unsafe { native::session_new(-1, ptr::null(), channel.as_mut_ptr()) };
        match NativeHandle::<SessionKind>::from_factory(ptr, &mut channel) {
            Err(Error::Native { code, .. }) => assert_eq!(code, native::ERR_BAD_ARGUMENT),
            other => panic!("expected native error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn null_pointer_with_clear_channel_is_a_contract_violation() {
        let mut channel = ErrorChannel::new();
        match NativeHandle::<ProbeKind>::from_factory(ptr::null_mut(), &mut channel) {
            Err(Error::Native { message, .. }) => {
                assert!(message.contains("without raising"));
            }
            other => panic!("expected native error, got {:?}", other.map(|_| ())),
        }
    }
}

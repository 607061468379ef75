//! Panic-site stack capture.
//!
//! `catch_unwind` only returns after the panicking frames are gone, so the
//! stack has to be taken inside the panic hook. The hook installed here
//! records it in a thread-local and then defers to the previously installed
//! hook; the catcher reads it back on the same thread with
//! [`take_panic_backtrace`].

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Install the recording hook, chained in front of the current one.
///
/// Idempotent.
pub fn install_panic_hook() {
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            record_panic_backtrace();
            previous(info);
        }));
    });
}

#[inline(never)]
fn record_panic_backtrace() {
    let backtrace = Backtrace::force_capture();
    let _ = PANIC_BACKTRACE.try_with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = Some(backtrace);
        }
    });
}

/// The stack recorded by the most recent panic on this thread, if not yet taken.
pub fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

//! Panic capture for sanitized invocations.
//!
//! A panic hook is installed once per process and chained to whatever hook was
//! in place before. It only acts while the panicking thread is inside
//! [`guarded`]; every other panic is forwarded to the previous hook unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// What the hook saw when a guarded closure panicked.
#[derive(Debug, Clone)]
pub(crate) struct CapturedPanic {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static WANT_BACKTRACE: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }

            let backtrace = if WANT_BACKTRACE.with(Cell::get) {
                Some(Backtrace::force_capture().to_string())
            } else {
                None
            };
            let captured = CapturedPanic {
                message: payload_message(info.payload()),
                location: info.location().map(|l| l.to_string()),
                backtrace,
            };
            CAPTURED.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

/// Restores the thread's guard state even if the guarded closure unwinds.
struct Scope {
    want_backtrace: bool,
}

impl Scope {
    fn enter(want_backtrace: bool) -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        let previous = WANT_BACKTRACE.with(|w| w.replace(want_backtrace));
        Self {
            want_backtrace: previous,
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
        WANT_BACKTRACE.with(|w| w.set(self.want_backtrace));
    }
}

/// Run `f`, turning a panic into a [`CapturedPanic`].
pub(crate) fn guarded<R>(capture_backtrace: bool, f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
    install_hook();
    // Drop anything left by a panic that never reached a guard.
    CAPTURED.with(|slot| slot.borrow_mut().take());

    let outcome = {
        let _scope = Scope::enter(capture_backtrace);
        panic::catch_unwind(AssertUnwindSafe(f))
    };

    outcome.map_err(|payload| {
        CAPTURED
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| CapturedPanic {
                message: payload_message(&*payload),
                location: None,
                backtrace: None,
            })
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

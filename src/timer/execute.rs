//! 回调执行边界
//! Callback execution boundary
//!
//! 每个回调都在 `catch_unwind` 中执行。panic 会连同 panic 发生处的堆栈一起
//! 被记录，然后交给可选的 `PanicHandler`；调度循环继续处理下一个条目。
//!
//! Every callback runs inside `catch_unwind`. A panic is logged together with
//! the backtrace taken where it was raised, handed to the optional
//! `PanicHandler`, and the drain loop moves on.

use crate::timer::entry::{Callback, TaskKey};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use tracing::warn;

/// 回调 panic 的描述
/// Description of a callback panic
#[derive(Debug)]
pub struct CallbackPanic {
    pub key: TaskKey,
    pub message: String,
    pub backtrace: Backtrace,
}

/// Hook invoked with every callback panic.
pub type PanicHandler = Arc<dyn Fn(&CallbackPanic) + Send + Sync>;

thread_local! {
    /// Set while a callback runs on this thread.
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
    /// Backtrace captured by the panic hook, before unwinding starts.
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Wraps the process panic hook so panics raised inside a callback record a
/// backtrace of the faulting frames. The previous hook still runs.
fn install_backtrace_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            // try_with: the hook may fire while thread-locals are being torn down
            if IN_CALLBACK.try_with(Cell::get).unwrap_or(false) {
                let backtrace = Backtrace::force_capture();
                let _ = PANIC_BACKTRACE.try_with(|slot| *slot.borrow_mut() = Some(backtrace));
            }
            previous(info);
        }));
    });
}

/// Runs `callback` and returns the panic report if it panicked.
pub(crate) fn run_callback(key: &str, callback: &mut Callback) -> Option<CallbackPanic> {
    install_backtrace_hook();

    let outer = IN_CALLBACK.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(|| callback()));
    IN_CALLBACK.with(|flag| flag.set(outer));

    let captured = PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take());
    let payload = result.err()?;

    // 钩子被其他代码替换时退回到展开后的堆栈
    // Falls back to the post-unwind stack if the hook was replaced
    let backtrace = captured.unwrap_or_else(Backtrace::force_capture);
    let report = CallbackPanic {
        key: key.to_string(),
        message: panic_message(payload.as_ref()),
        backtrace,
    };
    warn!(
        task_key = %report.key,
        message = %report.message,
        backtrace = %report.backtrace,
        "Timer callback panicked"
    );
    Some(report)
}

/// Hands `panic` to `handler`. A panicking handler is logged and swallowed.
pub(crate) fn report_panic(handler: &PanicHandler, panic: &CallbackPanic) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(panic)));
    if let Err(payload) = result {
        warn!(
            task_key = %panic.key,
            message = %panic_message(payload.as_ref()),
            "Timer panic handler panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

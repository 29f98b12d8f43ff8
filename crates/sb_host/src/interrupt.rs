//! Cooperative interrupt handling around protected calls.
//!
//! While a [`ProtectedScope`] is live, SIGINT triggers the protected
//! context's cancellation token and the next execution checkpoint raises
//! `interrupted!`, unwinding to the protected-call boundary. The handler
//! restores the default disposition before triggering, so a second SIGINT
//! arriving before any checkpoint performs default process termination.
//!
//! Scopes live on worker threads as well as the root thread and may end in
//! any order, so the bridge keeps a stack of every live scope's token and
//! mirrors the most recent one into the slot the handler reads. The stack
//! owns a clone of each token; the mirrored pointer always targets a live
//! flag.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use sb_script::{CancelToken, Chunk, Context, ScriptError, Value};

/// Mirror of the top of [`BRIDGE`]'s stack; the only word the signal
/// handler touches.
static PROTECTED_FLAG: AtomicPtr<AtomicBool> = AtomicPtr::new(std::ptr::null_mut());

static BRIDGE: Mutex<Bridge> = Mutex::new(Bridge {
    stack: Vec::new(),
    prev_handler: libc::SIG_DFL,
});

struct Bridge {
    stack: Vec<CancelToken>,
    // disposition found when the outermost scope entered
    prev_handler: libc::sighandler_t,
}

fn mirror_top(bridge: &Bridge) {
    let flag = bridge
        .stack
        .last()
        .map(|t| t.as_flag_ptr() as *mut AtomicBool)
        .unwrap_or(std::ptr::null_mut());
    PROTECTED_FLAG.store(flag, Ordering::Release);
}

extern "C" fn on_interrupt(_sig: libc::c_int) {
    // re-arm first: another SIGINT before the checkpoint fires terminates
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
    let flag = PROTECTED_FLAG.load(Ordering::Acquire);
    if !flag.is_null() {
        // atomic store through the pointer: async-signal-safe
        unsafe { (*flag).store(true, Ordering::Release) };
    }
}

/// RAII scope marking its context as the current interrupt target.
pub struct ProtectedScope {
    token: CancelToken,
}

impl ProtectedScope {
    pub fn enter(token: CancelToken) -> Self {
        let mut bridge = BRIDGE.lock().unwrap_or_else(|p| p.into_inner());
        let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // install on every entry; a delivery resets the disposition
        let installed = unsafe { libc::signal(libc::SIGINT, handler) };
        if bridge.stack.is_empty() {
            bridge.prev_handler = installed;
        }
        bridge.stack.push(token.clone());
        mirror_top(&bridge);
        Self { token }
    }
}

impl Drop for ProtectedScope {
    fn drop(&mut self) {
        let mut bridge = BRIDGE.lock().unwrap_or_else(|p| p.into_inner());
        // scopes on other threads end in arbitrary order; remove this
        // scope's entry wherever it sits, not just at the top
        let flag = self.token.as_flag_ptr();
        if let Some(pos) = bridge.stack.iter().rposition(|t| t.as_flag_ptr() == flag) {
            bridge.stack.remove(pos);
        }
        mirror_top(&bridge);
        if bridge.stack.is_empty() {
            unsafe {
                libc::signal(libc::SIGINT, bridge.prev_handler);
            }
        }
        // a trigger that never reached a checkpoint must not poison the
        // context's next run
        self.token.clear();
    }
}

/// Call a function value with interrupt delivery registered for the scope
/// of the call.
pub fn protected_call(
    ctx: &mut Context,
    callee: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let _scope = ProtectedScope::enter(ctx.cancel_token());
    ctx.call(callee, args)
}

/// Run a chunk under a protected scope.
pub fn protected_run(ctx: &mut Context, chunk: &Chunk) -> Result<Value, ScriptError> {
    let _scope = ProtectedScope::enter(ctx.cancel_token());
    ctx.run(chunk)
}

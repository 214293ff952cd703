// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The signal trampoline and the process-scoped state it reads.
//!
//! Note that this file makes use of the following async-signal safe
//! functions in a signal handler.
//! <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
//! - write
//!
//! Mutexes inside a signal handler are not allowed, so the handler-visible
//! state lives behind an `AtomicPtr`: written exactly once at
//! installation (`Box::into_raw`), read-many thereafter, never freed.
//! Signal handling is a process-wide resource, so this state is
//! process-wide too, and intentionally leaks for the remaining lifetime of
//! the process.

use crate::collector::fault_relay::FaultRelay;
use crate::shared::error::MonitorError;
use std::ptr;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicPtr};

static CONTEXT: AtomicPtr<MonitorContext> = AtomicPtr::new(ptr::null_mut());
static ENABLED: AtomicBool = AtomicBool::new(true);

/// Everything the trampoline and the reporter share: the relay, or `None`
/// when its creation failed and the monitor runs muted.
#[derive(Debug)]
pub(crate) struct MonitorContext {
    relay: Option<FaultRelay>,
}

impl MonitorContext {
    pub(crate) fn new(relay: Option<FaultRelay>) -> Self {
        Self { relay }
    }

    pub(crate) fn relay(&self) -> Option<&FaultRelay> {
        self.relay.as_ref()
    }
}

/// Publishes the context for the trampoline and the reporter thread.
///
/// PRECONDITIONS:
///     None.
/// SAFETY:
///     Monitor functions are not guaranteed to be reentrant.
///     No other monitor functions should be called concurrently.
/// ATOMICITY:
///     This function uses a compare-exchange on an atomic pointer: the
///     first caller wins, later callers get `AlreadyInitialized`. The
///     published allocation is never freed, since a handler may read it at
///     any point for the rest of the process lifetime.
pub(crate) fn set_context(
    context: MonitorContext,
) -> Result<&'static MonitorContext, MonitorError> {
    let box_ptr = Box::into_raw(Box::new(context));
    if CONTEXT
        .compare_exchange(ptr::null_mut(), box_ptr, SeqCst, SeqCst)
        .is_err()
    {
        // SAFETY: this pointer came from Box::into_raw above and was never
        // shared.
        drop(unsafe { Box::from_raw(box_ptr) });
        return Err(MonitorError::AlreadyInitialized);
    }
    // SAFETY: just stored, never freed.
    Ok(unsafe { &*box_ptr })
}

/// Mutes the monitor without touching signal dispositions: the trampoline
/// becomes a no-op until [`enable`] is called. Handlers registered after
/// ours keep working as expected.
///
/// # Atomicity
///   This function is atomic and idempotent. Calling it multiple times is
///   allowed.
pub fn disable() {
    ENABLED.store(false, SeqCst);
}

/// Unmutes the monitor, if it had been previously [`disable`]d. If the
/// monitor has not been initialized, this function has no effect.
///
/// # Atomicity
///   This function is atomic and idempotent. Calling it multiple times is
///   allowed.
pub fn enable() {
    ENABLED.store(true, SeqCst);
}

/// The single trampoline installed for every monitored signal.
///
/// SIGNAL SAFETY:
///     Runs in signal context with all catchable signals blocked, on the
///     alternate stack when one was configured. Its only actions are two
///     atomic loads and one `write` syscall via the relay. If the monitor
///     was never initialized, or the relay could not be created, it does
///     nothing: the fault still reaches the OS's default handling, but no
///     diagnostic is produced. This degraded mode must never crash the
///     handler itself.
pub(crate) extern "C" fn handle_fault_signal(
    signum: libc::c_int,
    _sig_info: *mut libc::siginfo_t,
    _ucontext: *mut libc::c_void,
) {
    if !ENABLED.load(SeqCst) {
        return;
    }
    let context = CONTEXT.load(SeqCst);
    if context.is_null() {
        return;
    }
    // SAFETY: the pointer originates from Box::into_raw in set_context and
    // is never freed afterwards.
    if let Some(relay) = unsafe { (*context).relay() } {
        relay.notify(signum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trampoline_tolerates_missing_or_muted_context() {
        // Whether or not another test has published a (relay-less) context
        // by now, the trampoline must simply return.
        handle_fault_signal(libc::SIGSEGV, ptr::null_mut(), ptr::null_mut());
    }

    #[test]
    fn test_enable_disable_toggle() {
        assert!(ENABLED.load(SeqCst));
        disable();
        assert!(!ENABLED.load(SeqCst));
        disable();
        assert!(!ENABLED.load(SeqCst));
        enable();
        assert!(ENABLED.load(SeqCst));
    }

    #[test]
    fn test_context_is_write_once() {
        let first = set_context(MonitorContext::new(None)).unwrap();
        assert!(first.relay().is_none());
        let second = set_context(MonitorContext::new(None));
        assert!(matches!(second, Err(MonitorError::AlreadyInitialized)));
    }
}
